//! Waitlist commands for CLI.

use chrono::Utc;
use clap::Subcommand;

use super::{open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum WaitlistAction {
    /// Add an email to the waitlist
    Join {
        email: String,
    },
    /// List waitlist entries, oldest first
    List,
}

pub fn run(action: WaitlistAction) -> CmdResult {
    let db = open_db()?;

    match action {
        WaitlistAction::Join { email } => {
            let outcome = db.join_waitlist(&email, Utc::now())?;
            print_json(&outcome)?;
        }
        WaitlistAction::List => {
            print_json(&db.list_waitlist()?)?;
        }
    }
    Ok(())
}
