use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;

/// Closed role set. Checked verbatim; there is no hierarchy between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "guide" => Some(Role::Guide),
            "lead-guide" => Some(Role::LeadGuide),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub lock_version: i64,
}

impl User {
    /// Columns exposed to list queries; credentials and bookkeeping stay out.
    pub const COLUMNS: &'static [&'static str] =
        &["id", "name", "email", "photo", "role", "created_at"];

    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }

    /// True when the password changed strictly after the token was issued.
    /// Comparison is in whole seconds, matching the token's `iat` grain.
    pub fn changed_password_after(&self, token_iat: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => changed_at.timestamp() > token_iat,
            None => false,
        }
    }
}

/// Insertable user; the password arrives already hashed.
#[derive(Debug)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    pub password_hash: String,
}

/// Admin partial update. Password never travels this path.
#[derive(Debug, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut messages = vec![];
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                messages.push("a name is required for a user".to_string());
            }
        }
        if let Some(email) = &self.email {
            if !email_looks_valid(email) {
                messages.push("please provide a valid email".to_string());
            }
        }
        if let Some(role) = &self.role {
            if Role::parse(role).is_none() {
                messages.push(format!(
                    "role must be one of: user, guide, lead-guide, admin (got {})",
                    role
                ));
            }
        }
        if messages.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(messages))
        }
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Signup-time field rules; password equality with its confirmation is
/// checked here, before any hashing happens.
pub fn validate_signup(
    name: &str,
    email: &str,
    password: &str,
    password_confirm: &str,
) -> Result<(), ApiError> {
    let mut messages = vec![];
    if name.trim().is_empty() {
        messages.push("a name is required for a new user".to_string());
    }
    if !email_looks_valid(email) {
        messages.push("please provide a valid email".to_string());
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        messages.push("a password must have at least 8 characters".to_string());
    }
    if password != password_confirm {
        messages.push("two passwords entered are not the same".to_string());
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationFailed(messages))
    }
}

pub fn validate_new_password(password: &str, password_confirm: &str) -> Result<(), ApiError> {
    let mut messages = vec![];
    if password.len() < MIN_PASSWORD_LENGTH {
        messages.push("a password must have at least 8 characters".to_string());
    }
    if password != password_confirm {
        messages.push("two passwords entered are not the same".to_string());
    }
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationFailed(messages))
    }
}

fn email_looks_valid(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [Role::User, Role::Guide, Role::LeadGuide, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superadmin"), None);
    }

    #[test]
    fn mismatched_confirmation_fails_validation() {
        let err = validate_signup("Alice", "alice@example.com", "password123", "password124")
            .unwrap_err();
        match err {
            ApiError::ValidationFailed(messages) => {
                assert!(messages.iter().any(|m| m.contains("not the same")));
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn short_password_and_bad_email_collect_messages() {
        let err = validate_signup("Alice", "not-an-email", "short", "short").unwrap_err();
        match err {
            ApiError::ValidationFailed(messages) => assert_eq!(messages.len(), 2),
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(email_looks_valid("a@b.io"));
        assert!(!email_looks_valid("a@b"));
        assert!(!email_looks_valid("@b.io"));
        assert!(!email_looks_valid("a@b@c.io"));
    }

    #[test]
    fn password_change_is_compared_in_seconds() {
        let mut user = sample_user();
        let iat = 1_700_000_000;
        user.password_changed_at = Some(DateTime::from_timestamp(iat + 1, 0).unwrap());
        assert!(user.changed_password_after(iat));
        // Same second is not "after": sub-second drift must not log users out.
        user.password_changed_at = Some(DateTime::from_timestamp(iat, 500_000_000).unwrap());
        assert!(!user.changed_password_after(iat));
        user.password_changed_at = None;
        assert!(!user.changed_password_after(iat));
    }

    #[test]
    fn patch_rejects_unknown_role() {
        let patch = UserPatch {
            name: None,
            email: None,
            photo: None,
            role: Some("owner".to_string()),
            active: None,
        };
        assert!(patch.validate().is_err());
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            photo: "default.jpg".to_string(),
            role: "user".to_string(),
            password: "$2b$12$hash".to_string(),
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
            lock_version: 0,
        }
    }
}
