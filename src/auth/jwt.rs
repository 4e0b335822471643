use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::{Claims, PasswordEpoch},
    config::JwtConfig,
};

/// Tokens are valid for 24 hours from issuance.
pub const TOKEN_TTL: Duration = Duration::hours(24);

/// The only algorithm accepted on either side.
const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no secret key set")]
    NoSecretKey,
    #[error("malformed token")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

/// Holds the HMAC key and issuer. Mints and checks bearer tokens without any
/// server-side session state.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    has_secret: bool,
    issuer: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self::new(&cfg.secret, &cfg.issuer)
    }
}

impl JwtKeys {
    pub fn new(secret: &str, issuer: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            has_secret: !secret.is_empty(),
            issuer: issuer.to_string(),
        }
    }

    pub fn issue(&self, user_id: i64, epoch: PasswordEpoch) -> Result<String, TokenError> {
        self.issue_at(user_id, epoch, OffsetDateTime::now_utc())
    }

    fn issue_at(
        &self,
        user_id: i64,
        epoch: PasswordEpoch,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        if !self.has_secret {
            return Err(TokenError::NoSecretKey);
        }
        let exp = now + TOKEN_TTL;
        let claims = Claims {
            user_id,
            password_epoch: epoch,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, algorithm, issuer and expiry. The password epoch is
    /// returned as-is; comparing it with the stored value is the gate's job.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        if !self.has_secret {
            return Err(TokenError::NoSecretKey);
        }
        let mut validation = Validation::new(ALGORITHM);
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        JwtKeys::new("dev-secret", "test-issuer")
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let keys = make_keys();
        let epoch = PasswordEpoch::from(OffsetDateTime::now_utc());
        let token = keys.issue(42, epoch).expect("issue");
        let claims = keys.validate(&token).expect("validate");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.password_epoch, epoch);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys();
        let issued = OffsetDateTime::now_utc() - Duration::hours(25);
        let token = keys.issue_at(1, PasswordEpoch(0), issued).unwrap();
        assert!(matches!(keys.validate(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn token_near_end_of_lifetime_is_still_valid() {
        let keys = make_keys();
        let issued = OffsetDateTime::now_utc() - Duration::hours(23);
        let token = keys.issue_at(1, PasswordEpoch(0), issued).unwrap();
        assert!(keys.validate(&token).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys();
        assert!(matches!(keys.validate("not-a-token"), Err(TokenError::Malformed)));
        assert!(matches!(keys.validate(""), Err(TokenError::Malformed)));
    }

    #[test]
    fn wrong_secret_fails_signature() {
        let token = make_keys().issue(1, PasswordEpoch(0)).unwrap();
        let other = JwtKeys::new("other-secret", "test-issuer");
        assert!(matches!(
            other.validate(&token),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn tampered_payload_fails() {
        let keys = make_keys();
        let token = keys.issue(1, PasswordEpoch(0)).unwrap();
        let forged = keys.issue(2, PasswordEpoch(0)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);
        assert!(matches!(
            keys.validate(&spliced),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            user_id: 1,
            password_epoch: PasswordEpoch(0),
            iat: now.unix_timestamp() as usize,
            exp: (now + TOKEN_TTL).unix_timestamp() as usize,
            iss: "test-issuer".into(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert!(matches!(keys.validate(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let token = JwtKeys::new("dev-secret", "someone-else")
            .issue(1, PasswordEpoch(0))
            .unwrap();
        assert!(matches!(
            make_keys().validate(&token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn empty_secret_cannot_issue() {
        let keys = JwtKeys::new("", "test-issuer");
        assert!(matches!(
            keys.issue(1, PasswordEpoch(0)),
            Err(TokenError::NoSecretKey)
        ));
    }
}
