//! Objective management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::{NewObjective, ObjectiveStatus};

use super::{instant_or_now, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum ObjectiveAction {
    /// Create an objective
    Create {
        /// Owning user ID
        user_id: String,
        /// Objective name
        name: String,
        /// Free-form category, e.g. "career"
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        description: Option<String>,
        /// What success looks like
        #[arg(long)]
        target_outcome: Option<String>,
        /// RFC 3339 start (default: now)
        #[arg(long)]
        start: Option<String>,
        /// RFC 3339 end
        #[arg(long)]
        end: Option<String>,
        /// Minutes per day committed to this objective
        #[arg(long)]
        daily_minutes: Option<u32>,
        #[arg(long)]
        priority: Option<i32>,
    },
    /// List a user's objectives
    List {
        /// User ID
        user_id: String,
    },
    /// Show an objective with its pillars
    Show {
        /// Objective ID
        id: String,
    },
    /// Set status: paused, completed, or on_track to resume tracking
    SetStatus {
        /// Objective ID
        id: String,
        status: String,
    },
    /// Delete an objective and everything under it
    Delete {
        /// Objective ID
        id: String,
    },
}

pub fn run(action: ObjectiveAction) -> CmdResult {
    let db = open_db()?;

    match action {
        ObjectiveAction::Create {
            user_id,
            name,
            category,
            description,
            target_outcome,
            start,
            end,
            daily_minutes,
            priority,
        } => {
            let mut input = NewObjective::new(user_id, name, category);
            input.description = description;
            input.target_outcome = target_outcome;
            input.start_date = start.as_deref().map(|s| instant_or_now(Some(s))).transpose()?;
            input.end_date = end.as_deref().map(|s| instant_or_now(Some(s))).transpose()?;
            input.daily_commitment_minutes = daily_minutes;
            input.priority = priority;
            let objective = db.create_objective(&input, Utc::now())?;
            print_json(&objective)?;
        }
        ObjectiveAction::List { user_id } => {
            print_json(&db.list_objectives(&user_id)?)?;
        }
        ObjectiveAction::Show { id } => {
            let objective = db.get_objective(&id)?;
            let pillars = db.list_pillars(&id)?;
            print_json(&serde_json::json!({
                "objective": objective,
                "pillars": pillars,
            }))?;
        }
        ObjectiveAction::SetStatus { id, status } => {
            let status: ObjectiveStatus = status.parse()?;
            print_json(&db.set_objective_status(&id, status, Utc::now())?)?;
        }
        ObjectiveAction::Delete { id } => {
            db.delete_objective(&id)?;
            println!("Objective deleted: {id}");
        }
    }
    Ok(())
}
