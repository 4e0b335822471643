use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::{
    auth::{claims::PasswordEpoch, jwt::TokenError, password::HashError},
    storage::StoreError,
};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("username must be between 3 and 50 characters")]
    InvalidUsername,
    #[error("invalid email")]
    InvalidEmail,
    #[error("username already exists")]
    DuplicateUsername,
    #[error("email already exists")]
    DuplicateEmail,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is not active")]
    AccountInactive,
    #[error("current password is incorrect")]
    IncorrectPassword,
    #[error("password was changed by another request")]
    PasswordChangeConflict,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A registered account. Storage rows convert into this; it carries no
/// persistence concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_changed_at: OffsetDateTime,
    pub first_name: String,
    pub last_name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
}

/// Fields needed to insert a user; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_changed_at: OffsetDateTime,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn password_epoch(&self) -> PasswordEpoch {
        PasswordEpoch::from(self.password_changed_at)
    }

    pub fn record_login(&mut self, now: OffsetDateTime) {
        self.last_login = Some(truncate_to_micros(now));
    }

    /// Replaces the hash and moves `password_changed_at` strictly forward,
    /// even if the clock has not advanced since the previous change.
    pub fn change_password(&mut self, new_hash: String, now: OffsetDateTime) {
        let floor = self.password_changed_at + Duration::microseconds(1);
        let now = truncate_to_micros(now);
        self.password_hash = new_hash;
        self.password_changed_at = now.max(floor);
        self.updated_at = now;
    }
}

/// Drops sub-microsecond precision, which `timestamptz` cannot store.
pub fn truncate_to_micros(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond() % 1_000))
}

/// The one place password policy is enforced.
pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::PasswordTooShort);
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), UserError> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(UserError::InvalidUsername);
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles");
    }
    EMAIL_RE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user() -> User {
        let t = datetime!(2024-10-20 14:00:00 UTC);
        User {
            id: 1,
            username: "johndoe".into(),
            email: "john@example.com".into(),
            password_hash: "h0".into(),
            password_changed_at: t,
            first_name: "John".into(),
            last_name: "Doe".into(),
            created_at: t,
            updated_at: t,
            last_login: None,
            is_active: true,
        }
    }

    #[test]
    fn password_length_rule() {
        assert!(matches!(
            validate_password("1234567"),
            Err(UserError::PasswordTooShort)
        ));
        assert!(validate_password("12345678").is_ok());
        // counted in characters, not bytes
        assert!(validate_password("ééééééé").is_err());
    }

    #[test]
    fn username_and_email_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert!(is_valid_email("john@example.com"));
        assert!(!is_valid_email("john@example"));
        assert!(!is_valid_email("john doe@example.com"));
    }

    #[test]
    fn change_password_moves_epoch_forward() {
        let mut u = user();
        let before = u.password_epoch();
        u.change_password("h1".into(), datetime!(2024-10-21 09:30:00.5 UTC));
        assert_eq!(u.password_hash, "h1");
        assert_eq!(u.password_changed_at, datetime!(2024-10-21 09:30:00.5 UTC));
        assert!(u.password_epoch() > before);
    }

    #[test]
    fn change_password_is_strictly_monotonic_under_clock_skew() {
        let mut u = user();
        let before = u.password_changed_at;
        // clock reports a time earlier than the previous change
        u.change_password("h1".into(), datetime!(2024-10-19 00:00:00 UTC));
        assert!(u.password_changed_at > before);
        let second = u.password_changed_at;
        u.change_password("h2".into(), second);
        assert!(u.password_changed_at > second);
    }

    #[test]
    fn truncation_drops_nanoseconds() {
        let t = datetime!(2024-10-20 14:00:00.123456789 UTC);
        assert_eq!(truncate_to_micros(t), datetime!(2024-10-20 14:00:00.123456 UTC));
    }

    #[test]
    fn login_and_names() {
        let mut u = user();
        assert_eq!(u.full_name(), "John Doe");
        u.record_login(datetime!(2024-10-20 16:00:00 UTC));
        assert_eq!(u.last_login, Some(datetime!(2024-10-20 16:00:00 UTC)));
        u.first_name.clear();
        assert_eq!(u.full_name(), "Doe");
    }
}
