//! Ritual commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::{Frequency, NewRitual};

use super::{instant_or_now, open_db, parse_days, print_json, CmdResult};

#[derive(Subcommand)]
pub enum RitualAction {
    /// Add a recurring ritual to an objective
    Add {
        /// Objective ID
        objective_id: String,
        /// Ritual name
        name: String,
        /// daily, weekly or monthly
        #[arg(long, default_value = "daily")]
        frequency: String,
        /// Comma-separated weekdays, 0 = Sunday .. 6 = Saturday
        #[arg(long)]
        days: Option<String>,
        /// Completions required per period
        #[arg(long, default_value = "1")]
        times: u32,
        #[arg(long)]
        minutes: Option<u32>,
        #[arg(long)]
        description: Option<String>,
        /// Pillar ID to attach to
        #[arg(long)]
        pillar_id: Option<String>,
    },
    /// List an objective's rituals
    List {
        /// Objective ID
        objective_id: String,
    },
    /// Record a completion and refresh streaks
    Complete {
        /// Ritual ID
        id: String,
        /// RFC 3339 completion time (default: now)
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// List a ritual's completions, oldest first
    Completions {
        /// Ritual ID
        id: String,
    },
    /// Rebuild streaks from the completion log
    Refresh {
        /// Ritual ID
        id: String,
    },
}

pub fn run(action: RitualAction) -> CmdResult {
    let db = open_db()?;
    let now = Utc::now();

    match action {
        RitualAction::Add {
            objective_id,
            name,
            frequency,
            days,
            times,
            minutes,
            description,
            pillar_id,
        } => {
            let mut input = NewRitual::new(objective_id, name, frequency.parse::<Frequency>()?);
            input.days_of_week = days.as_deref().map(parse_days).transpose()?;
            input.times_per_period = times;
            input.estimated_minutes = minutes;
            input.description = description;
            input.pillar_id = pillar_id;
            print_json(&db.add_ritual(&input, now)?)?;
        }
        RitualAction::List { objective_id } => {
            print_json(&db.list_rituals(&objective_id)?)?;
        }
        RitualAction::Complete { id, at, note } => {
            let completed_at = instant_or_now(at.as_deref())?;
            let recorded = db.complete_ritual(&id, completed_at, note.as_deref(), now)?;
            print_json(&recorded)?;
        }
        RitualAction::Completions { id } => {
            print_json(&db.list_ritual_completions(&id)?)?;
        }
        RitualAction::Refresh { id } => {
            print_json(&db.refresh_ritual_streak(&id, now)?)?;
        }
    }
    Ok(())
}
