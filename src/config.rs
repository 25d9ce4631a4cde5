// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Stars a refill cycle tops users up to. Never takes stars away.
pub const REFILL_TARGET: i64 = 6;

/// Default interval between refill cycles (4 hours).
pub const REFILL_INTERVAL_SECS: u64 = 4 * 60 * 60;

/// Minimum score percent that counts as passing a quiz.
pub const PASS_MARK_PERCENT: i64 = 50;

/// Digits in an email verification code.
pub const CODE_LENGTH: usize = 6;

/// Verification codes expire this many minutes after issue.
pub const CODE_EXPIRE_MINUTES: i64 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// JWT lifetime in seconds (3 days by default).
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Shared secret for promoting a user to admin.
    pub admin_key: Option<String>,
    pub admin_email: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub refill_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://quizer.db".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3 * 24 * 60 * 60);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let refill_interval_secs = env::var("REFILL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(REFILL_INTERVAL_SECS);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_key: env::var("ADMIN_KEY").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            smtp_server: env::var("SMTP_SERVER").ok(),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").ok(),
            refill_interval_secs,
        }
    }
}
