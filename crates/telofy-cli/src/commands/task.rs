//! Task management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::{NewTask, TaskStatus, TaskTransition};

use super::{instant_or_now, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Plan a task under an objective
    Create {
        /// Objective ID
        objective_id: String,
        /// Task title
        title: String,
        /// RFC 3339 start of the time box (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Length of the time box in minutes
        #[arg(long, default_value = "30")]
        minutes: u32,
        #[arg(long)]
        description: Option<String>,
        /// Why this task moves the objective forward
        #[arg(long)]
        why: Option<String>,
        /// Pillar ID to attach to
        #[arg(long)]
        pillar_id: Option<String>,
        /// Ritual this task is an occurrence of
        #[arg(long)]
        ritual_id: Option<String>,
    },
    /// List an objective's tasks by schedule
    List {
        /// Objective ID
        objective_id: String,
        /// pending, in_progress, completed or skipped
        #[arg(long)]
        status: Option<String>,
    },
    /// Start a pending task
    Start {
        /// Task ID
        id: String,
    },
    /// Complete a task
    Complete {
        /// Task ID
        id: String,
    },
    /// Skip a task
    Skip {
        /// Task ID
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

pub fn run(action: TaskAction) -> CmdResult {
    let db = open_db()?;
    let now = Utc::now();

    match action {
        TaskAction::Create {
            objective_id,
            title,
            at,
            minutes,
            description,
            why,
            pillar_id,
            ritual_id,
        } => {
            let mut input = NewTask::new(objective_id, title, instant_or_now(at.as_deref())?);
            input.duration_minutes = minutes;
            input.description = description;
            input.why_it_matters = why;
            input.pillar_id = pillar_id;
            input.ritual_id = ritual_id;
            print_json(&db.create_task(&input, now)?)?;
        }
        TaskAction::List {
            objective_id,
            status,
        } => {
            let status = status.as_deref().map(str::parse::<TaskStatus>).transpose()?;
            print_json(&db.list_tasks(&objective_id, status)?)?;
        }
        TaskAction::Start { id } => {
            print_json(&db.transition_task(&id, TaskTransition::Start, now)?)?;
        }
        TaskAction::Complete { id } => {
            print_json(&db.transition_task(&id, TaskTransition::Complete, now)?)?;
        }
        TaskAction::Skip { id, reason } => {
            print_json(&db.transition_task(&id, TaskTransition::Skip { reason }, now)?)?;
        }
    }
    Ok(())
}
