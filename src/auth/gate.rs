//! Per-request authentication pipeline.
//!
//! A token that verifies on its own is not enough: the user it names must
//! still exist, and its password epoch must not predate the user's current
//! `password_changed_at`. That epoch comparison is what invalidates old
//! tokens after a password change, with no revocation list.

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    auth::{
        claims::PasswordEpoch,
        jwt::{JwtKeys, TokenError},
    },
    storage::StoreError,
    users::repo::UserRepository,
};

const BEARER_SCHEME: &str = "bearer ";

/// Identity attached to a request that passed the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub password_epoch: PasswordEpoch,
}

#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("missing credential")]
    MissingCredential,
    #[error("invalid or expired token")]
    InvalidToken,
    /// The server has no key to verify with. Says nothing about the token.
    #[error("token signing key not configured")]
    SigningKeyMissing,
    #[error("account missing")]
    AccountMissing,
    #[error("stale token: password changed since issuance")]
    StaleToken,
    /// The store could not be asked. Not an authentication verdict.
    #[error("credential check unavailable")]
    Unavailable(#[source] StoreError),
}

/// Strips a case-insensitive `Bearer ` scheme; anything else is passed
/// through and left to token validation.
fn extract_token(header: &str) -> &str {
    let header = header.trim();
    match header.get(..BEARER_SCHEME.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_SCHEME) => {
            header[BEARER_SCHEME.len()..].trim_start()
        }
        _ => header,
    }
}

pub async fn authenticate(
    keys: &JwtKeys,
    users: &dyn UserRepository,
    header: Option<&str>,
) -> Result<AuthContext, GateRejection> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => {
            debug!("missing Authorization header");
            return Err(GateRejection::MissingCredential);
        }
    };

    let claims = keys
        .validate(extract_token(header))
        .map_err(|e| match e {
            TokenError::NoSecretKey => {
                error!("token validation attempted without a signing key");
                GateRejection::SigningKeyMissing
            }
            e => {
                warn!(error = %e, "token validation failed");
                GateRejection::InvalidToken
            }
        })?;

    let user = match users.find_by_id(claims.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) | Err(StoreError::NotFound) => {
            warn!(user_id = claims.user_id, "token for missing account");
            return Err(GateRejection::AccountMissing);
        }
        Err(e) => {
            error!(error = %e, user_id = claims.user_id, "user lookup failed");
            return Err(GateRejection::Unavailable(e));
        }
    };

    let current = user.password_epoch();
    if claims.password_epoch < current {
        warn!(
            user_id = user.id,
            token_epoch = claims.password_epoch.0,
            current_epoch = current.0,
            "token predates password change"
        );
        return Err(GateRejection::StaleToken);
    }

    debug!(user_id = user.id, "request authenticated");
    Ok(AuthContext {
        user_id: user.id,
        password_epoch: claims.password_epoch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::memory::MemoryUserRepository,
        users::model::{truncate_to_micros, NewUser},
    };
    use time::{Duration, OffsetDateTime};

    fn keys() -> JwtKeys {
        JwtKeys::new("gate-secret", "blog-api")
    }

    async fn seeded() -> (MemoryUserRepository, crate::users::model::User) {
        let repo = MemoryUserRepository::default();
        let user = repo
            .create(NewUser {
                username: "johndoe".into(),
                email: "john@example.com".into(),
                password_hash: "irrelevant".into(),
                password_changed_at: truncate_to_micros(OffsetDateTime::now_utc()),
                first_name: String::new(),
                last_name: String::new(),
            })
            .await
            .unwrap();
        (repo, user)
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_token("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(extract_token("bearer abc"), "abc");
        assert_eq!(extract_token("BEARER   abc"), "abc");
        assert_eq!(extract_token("abc"), "abc");
        assert_eq!(extract_token("Basic abc"), "Basic abc");
        assert_eq!(extract_token("Bear"), "Bear");
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let (repo, _) = seeded().await;
        assert!(matches!(
            authenticate(&keys(), &repo, None).await,
            Err(GateRejection::MissingCredential)
        ));
        assert!(matches!(
            authenticate(&keys(), &repo, Some("  ")).await,
            Err(GateRejection::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let (repo, user) = seeded().await;
        assert!(matches!(
            authenticate(&keys(), &repo, Some("Bearer nope")).await,
            Err(GateRejection::InvalidToken)
        ));
        let foreign = JwtKeys::new("other-secret", "blog-api")
            .issue(user.id, user.password_epoch())
            .unwrap();
        let header = format!("Bearer {foreign}");
        assert!(matches!(
            authenticate(&keys(), &repo, Some(&header)).await,
            Err(GateRejection::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn valid_token_attaches_identity() {
        let (repo, user) = seeded().await;
        let token = keys().issue(user.id, user.password_epoch()).unwrap();
        let header = format!("Bearer {token}");
        let ctx = authenticate(&keys(), &repo, Some(&header)).await.unwrap();
        assert_eq!(ctx.user_id, user.id);
        assert_eq!(ctx.password_epoch, user.password_epoch());
    }

    #[tokio::test]
    async fn unknown_account_is_rejected() {
        let (repo, user) = seeded().await;
        let token = keys().issue(user.id + 100, user.password_epoch()).unwrap();
        let header = format!("Bearer {token}");
        assert!(matches!(
            authenticate(&keys(), &repo, Some(&header)).await,
            Err(GateRejection::AccountMissing)
        ));
    }

    #[tokio::test]
    async fn password_change_invalidates_earlier_tokens() {
        let (repo, mut user) = seeded().await;
        let token = keys().issue(user.id, user.password_epoch()).unwrap();
        let header = format!("Bearer {token}");
        assert!(authenticate(&keys(), &repo, Some(&header)).await.is_ok());

        let previous = user.password_changed_at;
        user.change_password("new-hash".into(), OffsetDateTime::now_utc());
        repo.update_password(user.id, &user.password_hash, user.password_changed_at, previous)
            .await
            .unwrap();

        // the token itself is still well-formed and unexpired
        assert!(keys().validate(&token).is_ok());
        assert!(matches!(
            authenticate(&keys(), &repo, Some(&header)).await,
            Err(GateRejection::StaleToken)
        ));

        let fresh = keys().issue(user.id, user.password_epoch()).unwrap();
        let header = format!("Bearer {fresh}");
        assert!(authenticate(&keys(), &repo, Some(&header)).await.is_ok());
    }

    #[tokio::test]
    async fn newer_epoch_than_stored_is_accepted() {
        let (repo, user) = seeded().await;
        let later = PasswordEpoch::from(user.password_changed_at + Duration::seconds(5));
        let token = keys().issue(user.id, later).unwrap();
        let header = format!("Bearer {token}");
        assert!(authenticate(&keys(), &repo, Some(&header)).await.is_ok());
    }

    #[tokio::test]
    async fn store_outage_is_not_reported_as_bad_credential() {
        let (repo, user) = seeded().await;
        let token = keys().issue(user.id, user.password_epoch()).unwrap();
        let header = format!("Bearer {token}");
        repo.set_failing(true);
        assert!(matches!(
            authenticate(&keys(), &repo, Some(&header)).await,
            Err(GateRejection::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn missing_signing_key_is_a_server_fault() {
        let (repo, user) = seeded().await;
        let token = keys().issue(user.id, user.password_epoch()).unwrap();
        let header = format!("Bearer {token}");
        assert!(matches!(
            authenticate(&JwtKeys::new("", "blog-api"), &repo, Some(&header)).await,
            Err(GateRejection::SigningKeyMissing)
        ));
    }
}
