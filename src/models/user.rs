// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique email, used as the login identifier.
    pub email: String,

    /// Unique display name.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    /// 'pending' until the email verification code is confirmed, then 'active'.
    pub account_status: String,

    /// Outstanding verification code, if any.
    #[serde(skip)]
    pub code_verify: Option<String>,

    /// Unix timestamp after which the code is no longer accepted.
    #[serde(skip)]
    pub code_expires_at: Option<i64>,

    /// Spendable star balance. Never negative.
    pub stars: i64,

    /// Spendable gem balance. Never negative.
    pub gems: i64,

    pub last_star_refill: i64,

    pub created_at: i64,
}

/// DTO for registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for confirming an emailed verification code.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 16))]
    pub code: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for promoting a user to admin with the shared admin key.
#[derive(Debug, Deserialize, Validate)]
pub struct PromoteRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub admin_key: String,
}
