//! Deviation sweep and review commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::{DeviationDetector, DeviationFilter};

use super::{instant_or_now, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum DeviationAction {
    /// Scan every active objective for deviations
    Sweep {
        /// RFC 3339 instant to evaluate at (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Do not attach suggestions to new deviations
        #[arg(long)]
        no_suggestions: bool,
    },
    /// List deviations
    List {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        objective_id: Option<String>,
        /// Only unresolved deviations
        #[arg(long)]
        open: bool,
    },
    /// Mark a deviation resolved
    Resolve {
        /// Deviation ID
        id: String,
    },
}

pub fn run(action: DeviationAction) -> CmdResult {
    let db = open_db()?;

    match action {
        DeviationAction::Sweep { at, no_suggestions } => {
            let now = instant_or_now(at.as_deref())?;
            let mut detector = DeviationDetector::new(db.config().detector.clone());
            if no_suggestions {
                detector = detector.without_suggester();
            }
            print_json(&detector.sweep(&db, now)?)?;
        }
        DeviationAction::List {
            user_id,
            objective_id,
            open,
        } => {
            let filter = DeviationFilter {
                user_id,
                objective_id,
                unresolved_only: open,
            };
            print_json(&db.list_deviations(&filter)?)?;
        }
        DeviationAction::Resolve { id } => {
            print_json(&db.resolve_deviation(&id, Utc::now())?)?;
        }
    }
    Ok(())
}
