//! Users, server-side sessions and the waitlist.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::db::{conflict_on_constraint, get_ts, ts, GoalDb};
use crate::error::{CoreError, Result};
use crate::model::account::{normalize_email, parse_timezone};
use crate::model::{new_id, require_non_empty, NewUser, Session, User, WaitlistEntry, WaitlistOutcome};

const USER_COLUMNS: &str = "id, name, email, email_verified, image, timezone, onboarding_completed,
     notification_enabled, notification_advance_minutes, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, expires_at, ip_address, user_agent, created_at, updated_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        email_verified: row.get(3)?,
        image: row.get(4)?,
        timezone: row.get(5)?,
        onboarding_completed: row.get(6)?,
        notification_enabled: row.get(7)?,
        notification_advance_minutes: row.get(8)?,
        created_at: get_ts(row, 9)?,
        updated_at: get_ts(row, 10)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        user_id: row.get(1)?,
        expires_at: get_ts(row, 2)?,
        ip_address: row.get(3)?,
        user_agent: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

pub(super) fn find_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()?)
}

pub(super) fn load_user(conn: &Connection, id: &str) -> Result<User> {
    find_user(conn, id)?.ok_or_else(|| CoreError::not_found("user", id))
}

/// Timezone of the user owning `objective_id`.
pub(crate) fn objective_owner_tz(conn: &Connection, objective_id: &str, fallback: Tz) -> Result<Tz> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM objectives WHERE id = ?1",
            params![objective_id],
            |row| row.get(0),
        )
        .optional()?;
    let user_id = user_id.ok_or_else(|| CoreError::not_found("objective", objective_id))?;
    Ok(load_user(conn, &user_id)?.tz_or(fallback))
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn new_token() -> Result<String> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| CoreError::Entropy(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// A freshly opened session and its bearer token. The token is not stored and
/// cannot be recovered later.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

impl GoalDb {
    // === Users ===

    pub fn create_user(&self, input: &NewUser, now: DateTime<Utc>) -> Result<User> {
        require_non_empty("name", &input.name)?;
        let email = normalize_email(&input.email)?;
        let timezone = match input.timezone.as_deref() {
            Some(name) => parse_timezone(name)?.name().to_string(),
            None => self.config.accounts.default_timezone.clone(),
        };
        let user = User {
            id: new_id(),
            name: input.name.trim().to_string(),
            email,
            email_verified: false,
            image: None,
            timezone,
            onboarding_completed: false,
            notification_enabled: true,
            notification_advance_minutes: 5,
            created_at: now,
            updated_at: now,
        };

        self.write_tx("create_user", |tx| {
            tx.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.email_verified,
                    user.image,
                    user.timezone,
                    user.onboarding_completed,
                    user.notification_enabled,
                    user.notification_advance_minutes,
                    ts(&user.created_at),
                    ts(&user.updated_at),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(e, &format!("email {} is already registered", user.email))
            })?;
            Ok(())
        })?;
        tracing::debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        load_user(&self.conn, id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?)
    }

    pub fn set_user_timezone(&self, id: &str, timezone: &str, now: DateTime<Utc>) -> Result<User> {
        let tz = parse_timezone(timezone)?;
        self.write_tx("set_user_timezone", |tx| {
            let changed = tx.execute(
                "UPDATE users SET timezone = ?1, updated_at = ?2 WHERE id = ?3",
                params![tz.name(), ts(&now), id],
            )?;
            if changed == 0 {
                return Err(CoreError::not_found("user", id));
            }
            load_user(tx, id)
        })
    }

    /// Delete a user and everything they own.
    pub fn delete_user(&self, id: &str) -> Result<()> {
        self.write_tx("delete_user", |tx| {
            if tx.execute("DELETE FROM users WHERE id = ?1", params![id])? == 0 {
                return Err(CoreError::not_found("user", id));
            }
            Ok(())
        })
    }

    // === Sessions ===

    pub fn create_session(
        &self,
        user_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession> {
        let token = new_token()?;
        let token_hash = hash_token(&token);
        let ttl = Duration::days(i64::from(self.config.accounts.session_ttl_days));
        let session = Session {
            id: new_id(),
            user_id: user_id.to_string(),
            expires_at: now + ttl,
            ip_address: ip_address.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        self.write_tx("create_session", |tx| {
            load_user(tx, user_id)?;
            tx.execute(
                "INSERT INTO sessions (id, user_id, token_hash, expires_at, ip_address, user_agent,
                                       created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session.id,
                    session.user_id,
                    token_hash,
                    ts(&session.expires_at),
                    session.ip_address,
                    session.user_agent,
                    ts(&session.created_at),
                    ts(&session.updated_at),
                ],
            )?;
            Ok(())
        })?;
        Ok(IssuedSession { token, session })
    }

    /// Resolve a bearer token to its user.
    ///
    /// Expired sessions are removed and yield `None`. A session last touched more
    /// than `accounts.session_refresh_hours` ago has its expiry slid forward.
    pub fn current_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let token_hash = hash_token(token);
        let ttl = Duration::days(i64::from(self.config.accounts.session_ttl_days));
        let refresh_after = Duration::hours(i64::from(self.config.accounts.session_refresh_hours));

        self.write_tx("current_user", |tx| {
            let session = tx
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = ?1"),
                    params![token_hash],
                    row_to_session,
                )
                .optional()?;
            let Some(session) = session else {
                return Ok(None);
            };

            if session.is_expired(now) {
                tx.execute("DELETE FROM sessions WHERE id = ?1", params![session.id])?;
                tracing::debug!(session_id = %session.id, "expired session removed");
                return Ok(None);
            }

            if now - session.updated_at >= refresh_after {
                tx.execute(
                    "UPDATE sessions SET expires_at = ?1, updated_at = ?2 WHERE id = ?3",
                    params![ts(&(now + ttl)), ts(&now), session.id],
                )?;
            }
            find_user(tx, &session.user_id)
        })
    }

    /// Returns whether a session was removed.
    pub fn revoke_session(&self, token: &str) -> Result<bool> {
        let token_hash = hash_token(token);
        self.write_tx("revoke_session", |tx| {
            let removed =
                tx.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
            Ok(removed > 0)
        })
    }

    /// Look up a session by token without touching it.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = ?1"),
                params![hash_token(token)],
                row_to_session,
            )
            .optional()?)
    }

    // === Waitlist ===

    pub fn join_waitlist(&self, email: &str, now: DateTime<Utc>) -> Result<WaitlistOutcome> {
        let email = normalize_email(email)?;
        let entry = WaitlistEntry {
            id: new_id(),
            email,
            created_at: now,
        };
        let inserted = self.write_tx("join_waitlist", |tx| {
            Ok(tx.execute(
                "INSERT OR IGNORE INTO waitlist (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![entry.id, entry.email, ts(&entry.created_at)],
            )?)
        })?;
        if inserted == 0 {
            tracing::debug!(email = %entry.email, "already on waitlist");
            return Ok(WaitlistOutcome::AlreadyListed);
        }
        Ok(WaitlistOutcome::Joined { entry })
    }

    pub fn list_waitlist(&self) -> Result<Vec<WaitlistEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, email, created_at FROM waitlist ORDER BY created_at, email")?;
        let rows = stmt.query_map([], |row| {
            Ok(WaitlistEntry {
                id: row.get(0)?,
                email: row.get(1)?,
                created_at: get_ts(row, 2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn create_user_normalises_email_and_defaults_timezone() {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "  Ada@Example.com"), t0())
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.timezone, "America/Los_Angeles");
        assert!(user.notification_enabled);
        assert_eq!(user.notification_advance_minutes, 5);

        let found = db.find_user_by_email("ADA@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let db = GoalDb::open_memory().unwrap();
        db.create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let err = db
            .create_user(&NewUser::new("Other Ada", "ADA@example.com"), t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)), "{err}");
    }

    #[test]
    fn invalid_timezone_is_rejected_before_write() {
        let db = GoalDb::open_memory().unwrap();
        let mut input = NewUser::new("Ada", "ada@example.com");
        input.timezone = Some("Mars/Olympus".into());
        assert!(matches!(
            db.create_user(&input, t0()),
            Err(CoreError::Validation(_))
        ));
        assert!(db.find_user_by_email("ada@example.com").unwrap().is_none());
    }

    #[test]
    fn set_timezone_and_delete() {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let updated = db.set_user_timezone(&user.id, "Europe/Berlin", t0()).unwrap();
        assert_eq!(updated.timezone, "Europe/Berlin");

        db.delete_user(&user.id).unwrap();
        assert!(matches!(
            db.get_user(&user.id),
            Err(CoreError::NotFound { entity: "user", .. })
        ));
        assert!(db.delete_user(&user.id).is_err());
    }

    #[test]
    fn session_lifecycle() {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let issued = db
            .create_session(&user.id, Some("127.0.0.1"), None, t0())
            .unwrap();
        assert_eq!(issued.token.len(), 64);
        assert_eq!(issued.session.expires_at, t0() + Duration::days(30));

        let current = db.current_user(&issued.token, t0()).unwrap().unwrap();
        assert_eq!(current.id, user.id);
        assert!(db.current_user("not-a-token", t0()).unwrap().is_none());

        assert!(db.revoke_session(&issued.token).unwrap());
        assert!(db.current_user(&issued.token, t0()).unwrap().is_none());
        assert!(!db.revoke_session(&issued.token).unwrap());
    }

    #[test]
    fn session_expiry_slides_after_refresh_age() {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let issued = db.create_session(&user.id, None, None, t0()).unwrap();

        // Within a day: untouched.
        db.current_user(&issued.token, t0() + Duration::hours(2)).unwrap();
        let session = db.get_session(&issued.token).unwrap().unwrap();
        assert_eq!(session.expires_at, t0() + Duration::days(30));

        // After a day: slid forward.
        let later = t0() + Duration::days(2);
        db.current_user(&issued.token, later).unwrap().unwrap();
        let session = db.get_session(&issued.token).unwrap().unwrap();
        assert_eq!(session.expires_at, later + Duration::days(30));
    }

    #[test]
    fn expired_session_yields_no_user() {
        let db = GoalDb::open_memory().unwrap();
        let user = db
            .create_user(&NewUser::new("Ada", "ada@example.com"), t0())
            .unwrap();
        let issued = db.create_session(&user.id, None, None, t0()).unwrap();
        let after_expiry = t0() + Duration::days(31);
        assert!(db.current_user(&issued.token, after_expiry).unwrap().is_none());
        assert!(db.get_session(&issued.token).unwrap().is_none());
    }

    #[test]
    fn session_for_missing_user_is_not_found() {
        let db = GoalDb::open_memory().unwrap();
        assert!(matches!(
            db.create_session("ghost", None, None, t0()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn waitlist_deduplicates_emails() {
        let db = GoalDb::open_memory().unwrap();
        let first = db.join_waitlist("Ada@Example.com", t0()).unwrap();
        assert!(matches!(first, WaitlistOutcome::Joined { .. }));
        let second = db.join_waitlist("ada@example.com ", t0()).unwrap();
        assert!(matches!(second, WaitlistOutcome::AlreadyListed));
        assert!(db.join_waitlist("not-an-email", t0()).is_err());

        let entries = db.list_waitlist().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].email, "ada@example.com");
    }
}
