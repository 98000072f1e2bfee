use std::env;

use anyhow::{Context, Result};

/// Runtime configuration for the control plane, assembled once at startup
/// from the environment. Required variables fail fast with `.context(...)`,
/// everything else has a sane default clamped to a sensible floor.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub nextauth_secret: String,
    pub app_env: AppEnv,
    pub host: String,
    pub port: u16,
    pub worker_poll_ms: u64,
    pub realtime_poll_ms: u64,
    pub rate_limit_reads_per_min: u32,
    pub rate_limit_writes_per_min: u32,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_jwks_url: Option<String>,
    pub jwt_dev_public_key_pem: Option<String>,
    pub jwt_leeway_seconds: Option<u32>,
    pub jwks_refresh_seconds: u64,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        matches!(self, AppEnv::Production)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let nextauth_secret =
            env::var("NEXTAUTH_SECRET").context("NEXTAUTH_SECRET must be set")?;
        if nextauth_secret.len() < 32 {
            anyhow::bail!("NEXTAUTH_SECRET must be at least 32 bytes");
        }

        let app_env = match env::var("APP_ENV").unwrap_or_else(|_| "development".into()).as_str() {
            "production" => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let worker_poll_ms = env::var("WORKER_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5_000)
            .max(100);

        let realtime_poll_ms = env::var("REALTIME_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2_000)
            .max(250);

        let rate_limit_reads_per_min = env::var("RATE_LIMIT_READS_PER_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(100);

        let rate_limit_writes_per_min = env::var("RATE_LIMIT_WRITES_PER_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(30);

        let jwt_issuer = env::var("JWT_ISSUER").ok();
        let jwt_audience = env::var("JWT_AUDIENCE").ok();
        let jwt_jwks_url = env::var("JWT_JWKS_URL").ok();
        let jwt_dev_public_key_pem = env::var("JWT_DEV_PUBLIC_KEY_PEM").ok();
        let jwt_leeway_seconds = env::var("JWT_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok());
        let jwks_refresh_seconds = env::var("JWKS_REFRESH_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300)
            .max(60);

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Ok(Self {
            database_url,
            nextauth_secret,
            app_env,
            host,
            port,
            worker_poll_ms,
            realtime_poll_ms,
            rate_limit_reads_per_min,
            rate_limit_writes_per_min,
            jwt_issuer,
            jwt_audience,
            jwt_jwks_url,
            jwt_dev_public_key_pem,
            jwt_leeway_seconds,
            jwks_refresh_seconds,
            allowed_origins,
        })
    }
}
