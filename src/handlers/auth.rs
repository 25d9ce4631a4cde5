// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{CODE_EXPIRE_MINUTES, Config},
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, User, VerifyRequest},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
        mailer::{Mailer, generate_code},
    },
};

/// Stores a fresh verification code on the pending account and mails it.
async fn issue_verification_code(
    pool: &SqlitePool,
    mailer: &Mailer,
    email: &str,
    username: &str,
) -> Result<(), AppError> {
    let code = generate_code();
    let expires_at = (Utc::now() + Duration::minutes(CODE_EXPIRE_MINUTES)).timestamp();

    sqlx::query(
        "UPDATE users SET code_verify = ?, code_expires_at = ? WHERE email = ? AND account_status = 'pending'",
    )
    .bind(&code)
    .bind(expires_at)
    .bind(email)
    .execute(pool)
    .await?;

    mailer.send_verification_code(email, username, &code).await
}

/// Registers a new user as pending and emails a verification code.
///
/// If a pending account already exists for the email, a fresh code is sent
/// instead of failing, so an interrupted signup can simply be retried.
pub async fn register(
    State(pool): State<SqlitePool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let pending = sqlx::query_scalar::<_, String>(
        "SELECT username FROM users WHERE email = ? AND account_status = 'pending'",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await?;

    if let Some(username) = pending {
        issue_verification_code(&pool, &mailer, &payload.email, &username).await?;
        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "username": username,
                "email": payload.email,
            })),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;

    sqlx::query(
        r#"
        INSERT INTO users (email, username, password, account_status, created_at)
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(&payload.email)
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(Utc::now().timestamp())
    .execute(&pool)
    .await
    .map_err(|e| {
        // SQLite unique violation
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict("Email or username already exists".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    issue_verification_code(&pool, &mailer, &payload.email, &payload.username).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "ok",
            "username": payload.username,
            "email": payload.email,
        })),
    ))
}

/// Confirms an emailed verification code and activates the account.
/// Returns a JWT on success, exactly like login.
pub async fn verify(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let row = sqlx::query_as::<_, (i64, String, Option<String>, Option<i64>)>(
        r#"
        SELECT id, username, code_verify, code_expires_at
        FROM users
        WHERE email = ? AND account_status = 'pending'
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await?;

    let (user_id, username, code_verify, code_expires_at) =
        row.ok_or(AppError::BadRequest("Please register first".to_string()))?;

    if code_verify.as_deref() != Some(payload.code.as_str()) {
        return Err(AppError::BadRequest(
            "Incorrect verification code".to_string(),
        ));
    }

    if code_expires_at.is_none_or(|expires| Utc::now().timestamp() >= expires) {
        return Err(AppError::BadRequest(
            "Verification code expired".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET account_status = 'active', code_verify = NULL, code_expires_at = NULL
        WHERE email = ? AND account_status = 'pending'
        "#,
    )
    .bind(&payload.email)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "Failed to activate account".to_string(),
        ));
    }

    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    let token = sign_jwt(
        user_id,
        &username,
        &role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "username": username,
        "email": payload.email,
    })))
}

/// Authenticates an active user and returns a JWT token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = ? AND account_status = 'active'",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError(
        "Invalid credentials, try again".to_string(),
    ))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::AuthError(
            "Invalid credentials, try again".to_string(),
        ));
    }

    let token = sign_jwt(
        user.id,
        &user.username,
        &user.role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "username": user.username,
        "email": user.email,
    })))
}
