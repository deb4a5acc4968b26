//! Session commands for CLI.

use chrono::Utc;
use clap::Subcommand;

use super::{open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Issue a session token for a user
    Create {
        /// User ID
        user_id: String,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        user_agent: Option<String>,
    },
    /// Resolve a token to its user
    Whoami {
        token: String,
    },
    /// Revoke a session token
    Revoke {
        token: String,
    },
}

pub fn run(action: SessionAction) -> CmdResult {
    let db = open_db()?;

    match action {
        SessionAction::Create {
            user_id,
            ip,
            user_agent,
        } => {
            let issued =
                db.create_session(&user_id, ip.as_deref(), user_agent.as_deref(), Utc::now())?;
            print_json(&serde_json::json!({
                "token": issued.token,
                "session": issued.session,
            }))?;
        }
        SessionAction::Whoami { token } => match db.current_user(&token, Utc::now())? {
            Some(user) => print_json(&user)?,
            None => return Err("session expired or unknown".into()),
        },
        SessionAction::Revoke { token } => {
            if db.revoke_session(&token)? {
                println!("Session revoked");
            } else {
                println!("No such session");
            }
        }
    }
    Ok(())
}
