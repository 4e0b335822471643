use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

/// Lowest accepted Argon2 time cost (iterations).
pub const MIN_COST: u32 = 1;
/// Highest accepted Argon2 time cost.
pub const MAX_COST: u32 = 16;
pub const DEFAULT_COST: u32 = 2;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid hash cost {0}")]
    InvalidCost(u32),
    #[error("hashing password failed: {0}")]
    HashingFailed(String),
    #[error("stored password hash is malformed")]
    MalformedHash,
}

fn hasher(cost: u32) -> Result<Argon2<'static>, HashError> {
    if !(MIN_COST..=MAX_COST).contains(&cost) {
        return Err(HashError::InvalidCost(cost));
    }
    let params = Params::new(Params::DEFAULT_M_COST, cost, Params::DEFAULT_P_COST, None)
        .map_err(|e| HashError::HashingFailed(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `plain` with Argon2id and a fresh random salt, returning a PHC string.
pub fn hash_password(plain: &str, cost: u32) -> Result<String, HashError> {
    let argon2 = hasher(cost)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            HashError::HashingFailed(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against a stored PHC hash. The digest comparison is constant-time.
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, HashError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        HashError::MalformedHash
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Time cost recorded in a stored hash.
#[cfg(test)]
pub fn hash_cost(hash: &str) -> Result<u32, HashError> {
    let parsed = PasswordHash::new(hash).map_err(|_| HashError::MalformedHash)?;
    let params = Params::try_from(&parsed).map_err(|_| HashError::MalformedHash)?;
    Ok(params.t_cost())
}

#[cfg(test)]
pub fn is_password_hash(value: &str) -> bool {
    PasswordHash::new(value)
        .map(|h| h.algorithm.as_str().starts_with("argon2"))
        .unwrap_or(false)
}

pub async fn hash_password_blocking(plain: String, cost: u32) -> Result<String, HashError> {
    tokio::task::spawn_blocking(move || hash_password(&plain, cost))
        .await
        .map_err(|e| HashError::HashingFailed(e.to_string()))?
}

pub async fn verify_password_blocking(plain: String, hash: String) -> Result<bool, HashError> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(|e| HashError::HashingFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password, MIN_COST).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password, MIN_COST).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
        assert!(!verify_password("correct-horse-battery-stapl", &hash).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, HashError::MalformedHash));
    }

    #[test]
    fn rejects_cost_out_of_range() {
        assert!(matches!(
            hash_password("password123", 0),
            Err(HashError::InvalidCost(0))
        ));
        assert!(matches!(
            hash_password("password123", MAX_COST + 1),
            Err(HashError::InvalidCost(_))
        ));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("password123", MIN_COST).unwrap();
        let b = hash_password("password123", MIN_COST).unwrap();
        assert_ne!(a, b);
        assert!(verify_password("password123", &a).unwrap());
        assert!(verify_password("password123", &b).unwrap());
    }

    #[test]
    fn reports_cost_and_format() {
        let hash = hash_password("password123", 3).unwrap();
        assert_eq!(hash_cost(&hash).unwrap(), 3);
        assert!(is_password_hash(&hash));
        assert!(!is_password_hash("password123"));
        assert!(!is_password_hash(""));
    }

    #[tokio::test]
    async fn blocking_wrappers_roundtrip() {
        let hash = hash_password_blocking("hunter2hunter2".into(), MIN_COST)
            .await
            .unwrap();
        assert!(verify_password_blocking("hunter2hunter2".into(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("nope".into(), hash).await.unwrap());
    }
}
