//! User account commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::NewUser;

use super::{open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    Create {
        /// Display name
        name: String,
        /// Email address (unique, case-insensitive)
        email: String,
        /// IANA timezone (default: accounts.default_timezone)
        #[arg(long)]
        timezone: Option<String>,
    },
    /// Show a user by ID or email
    Show {
        /// User ID, or an email when it contains '@'
        key: String,
    },
    /// Change a user's timezone
    SetTimezone {
        /// User ID
        id: String,
        /// IANA timezone, e.g. "Europe/Berlin"
        timezone: String,
    },
    /// Delete a user and everything they own
    Delete {
        /// User ID
        id: String,
    },
}

pub fn run(action: UserAction) -> CmdResult {
    let db = open_db()?;

    match action {
        UserAction::Create {
            name,
            email,
            timezone,
        } => {
            let mut input = NewUser::new(name, email);
            input.timezone = timezone;
            let user = db.create_user(&input, Utc::now())?;
            print_json(&user)?;
        }
        UserAction::Show { key } => {
            let user = if key.contains('@') {
                db.find_user_by_email(&key)?
                    .ok_or(format!("User not found: {key}"))?
            } else {
                db.get_user(&key)?
            };
            print_json(&user)?;
        }
        UserAction::SetTimezone { id, timezone } => {
            let user = db.set_user_timezone(&id, &timezone, Utc::now())?;
            print_json(&user)?;
        }
        UserAction::Delete { id } => {
            db.delete_user(&id)?;
            println!("User deleted: {id}");
        }
    }
    Ok(())
}
