use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Password epoch: the user's `password_changed_at`, in microseconds since
/// the Unix epoch. Microseconds match the precision of `timestamptz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordEpoch(pub i64);

impl From<OffsetDateTime> for PasswordEpoch {
    fn from(t: OffsetDateTime) -> Self {
        Self((t.unix_timestamp_nanos() / 1_000) as i64)
    }
}

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(rename = "pwd_changed_at")]
    pub password_epoch: PasswordEpoch,
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
    pub iss: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn epoch_truncates_to_microseconds() {
        let a = datetime!(2024-10-20 15:00:00.123456789 UTC);
        let b = datetime!(2024-10-20 15:00:00.123456 UTC);
        assert_eq!(PasswordEpoch::from(a), PasswordEpoch::from(b));
        assert!(PasswordEpoch::from(b) < PasswordEpoch::from(datetime!(2024-10-20 15:00:00.123457 UTC)));
    }

    #[test]
    fn claims_use_wire_names() {
        let claims = Claims {
            user_id: 7,
            password_epoch: PasswordEpoch(42),
            iat: 1,
            exp: 2,
            iss: "blog-api".into(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["pwd_changed_at"], 42);
        assert_eq!(json["user_id"], 7);
    }
}
