//! Users, sessions and the waitlist.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Root of ownership for every other entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub image: Option<String>,
    /// IANA timezone name; periods for streaks are calendar units in this zone.
    pub timezone: String,
    pub onboarding_completed: bool,
    pub notification_enabled: bool,
    pub notification_advance_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Parsed timezone, or `fallback` when the stored name is not a known zone.
    pub fn tz_or(&self, fallback: Tz) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(
                    user_id = %self.id,
                    timezone = %self.timezone,
                    "unknown stored timezone, using fallback"
                );
                fallback
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub timezone: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timezone: None,
        }
    }
}

/// Validate an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    name.parse::<Tz>()
        .map_err(|_| ValidationError::invalid("timezone", format!("unknown timezone '{name}'")))
}

/// Trim and lowercase an email address, rejecting obviously malformed ones.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ValidationError::invalid(
            "email",
            format!("'{}' is not a valid email address", raw.trim()),
        ))
    }
}

/// Server-side session. The bearer token itself is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a waitlist submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WaitlistOutcome {
    Joined { entry: WaitlistEntry },
    AlreadyListed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalised() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for bad in ["", "ada", "@example.com", "ada@", "ada@example", "a b@x.io", "a@b@c.io", "ada@.io"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn timezone_parsing() {
        assert_eq!(parse_timezone("Europe/Berlin").unwrap(), chrono_tz::Europe::Berlin);
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn unknown_stored_timezone_falls_back() {
        let now = Utc::now();
        let user = User {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            email_verified: false,
            image: None,
            timezone: "Nowhere/Land".into(),
            onboarding_completed: false,
            notification_enabled: true,
            notification_advance_minutes: 5,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(user.tz_or(chrono_tz::UTC), chrono_tz::UTC);
    }
}
