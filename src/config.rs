use anyhow::Context;
use serde::Deserialize;

use crate::auth::password::{DEFAULT_COST, MAX_COST, MIN_COST};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub hash_cost: u32,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "blog-api".into()),
        };
        let hash_cost = var("PASSWORD_HASH_COST")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_COST);
        anyhow::ensure!(
            (MIN_COST..=MAX_COST).contains(&hash_cost),
            "PASSWORD_HASH_COST must be between {MIN_COST} and {MAX_COST}, got {hash_cost}"
        );
        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("APP_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        Ok(Self {
            database_url,
            jwt,
            hash_cost,
            host,
            port,
        })
    }
}
