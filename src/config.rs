use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Issuer stamped into every session token.
pub const TOKEN_ISSUER: &str = "chirpy";

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_days: u64,
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Dev,
    Prod,
}

impl Platform {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" => Platform::Dev,
            _ => Platform::Prod,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub platform: Platform,
    pub polka_key: Option<String>,
    pub fileserver_root: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("DB_URL"))
            .context("DATABASE_URL must be set")?;
        anyhow::ensure!(!database_url.trim().is_empty(), "DATABASE_URL must not be empty");

        let secret = std::env::var("TOKEN_SECRET").context("TOKEN_SECRET must be set")?;
        anyhow::ensure!(!secret.is_empty(), "TOKEN_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: TOKEN_ISSUER.into(),
            access_ttl_seconds: env_number("ACCESS_TOKEN_TTL_SECONDS", 60 * 60),
            refresh_ttl_days: env_number("REFRESH_TOKEN_TTL_DAYS", 60),
            leeway_seconds: env_number("JWT_LEEWAY_SECONDS", 0),
        };

        Ok(Self {
            database_url,
            jwt,
            platform: std::env::var("PLATFORM")
                .map(|v| Platform::parse(&v))
                .unwrap_or(Platform::Prod),
            polka_key: std::env::var("POLKA_KEY").ok().filter(|k| !k.is_empty()),
            fileserver_root: std::env::var("FILESERVER_ROOT")
                .unwrap_or_else(|_| ".".into())
                .into(),
        })
    }
}

fn env_number(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
