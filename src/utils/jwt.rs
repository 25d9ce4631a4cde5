// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// Token claims. `sub` carries the user id as a string; `username` and
/// `role` travel in the token so handlers and the admin gate never need a
/// user lookup per request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> i64 {
        self.sub.parse::<i64>().unwrap_or(0)
    }
}

pub fn sign_jwt(
    id: i64,
    username: &str,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: id.to_string(),
        username: username.to_owned(),
        role: role.to_owned(),
        exp: Utc::now().timestamp() as usize + expiration_seconds as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))
}

/// Requires a valid `Authorization: Bearer <token>` header and injects the
/// decoded `Claims` into request extensions for downstream handlers.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_jwt(token, &config.jwt_secret).map_err(|_| StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Layered after `auth_middleware`; rejects non-admin tokens with 403.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if claims.role != "admin" {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let token = sign_jwt(42, "sara", "user", "unit-test-secret", 600).unwrap();
        let claims = verify_jwt(&token, "unit-test-secret").unwrap();
        assert_eq!(claims.user_id(), 42);
        assert_eq!(claims.username, "sara");
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(7, "omar", "admin", "secret-a", 600).unwrap();
        assert!(verify_jwt(&token, "secret-b").is_err());
    }
}
