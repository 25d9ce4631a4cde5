// src/engine/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Domain errors for quiz play, balances and purchases.
/// Each variant carries exactly the fields its wire payload exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    UserNotFound,

    /// Question does not exist or does not belong to the addressed quiz.
    QuestionNotFound,

    /// The question already holds a live answer. Carries the correct option
    /// so clients can reveal it without re-scoring.
    AlreadyAnswered { correct_option_id: Option<i64> },

    /// Wrong answer with zero stars: the deduction cannot be paid, so the
    /// submission is refused and nothing is recorded.
    NotReady { current_stars: i64 },

    /// The attempt summary is terminal; returns the stored result.
    AlreadyCompleted { score_percent: i64, gems_awarded: i64 },

    /// Finalization with no live answers.
    NoAnswers,

    /// Reset refused because the stored attempt passed.
    UserPassed,

    InvalidPackage,

    InsufficientGems { current_stars: i64, current_gems: i64 },

    /// Lock contention or pool timeout. The transaction was rolled back;
    /// the caller may retry.
    StorageTransient(String),

    Storage(String),
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for QuizError {}

impl From<sqlx::Error> for QuizError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => QuizError::StorageTransient(err.to_string()),
            sqlx::Error::Database(db) => {
                let msg = db.message();
                if msg.contains("database is locked") || msg.contains("database is busy") {
                    QuizError::StorageTransient(msg.to_string())
                } else {
                    QuizError::Storage(msg.to_string())
                }
            }
            _ => QuizError::Storage(err.to_string()),
        }
    }
}

/// Maps each variant to its wire body. Error kinds and payload field names
/// are part of the client contract.
impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            QuizError::UserNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "ok": false, "error": "user_not_found" }),
            ),
            QuizError::QuestionNotFound => (
                StatusCode::NOT_FOUND,
                json!({ "ok": false, "error": "question_not_found" }),
            ),
            QuizError::AlreadyAnswered { correct_option_id } => (
                StatusCode::CONFLICT,
                json!({
                    "ok": false,
                    "error": "already_answered",
                    "correct_option_id": correct_option_id,
                }),
            ),
            QuizError::NotReady { current_stars } => (
                StatusCode::CONFLICT,
                json!({
                    "ok": false,
                    "error": "not_ready",
                    "current_stars": current_stars,
                }),
            ),
            QuizError::AlreadyCompleted {
                score_percent,
                gems_awarded,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "ok": false,
                    "error": "already_completed",
                    "score_percent": score_percent,
                    "gems_awarded": gems_awarded,
                    "passed": true,
                }),
            ),
            QuizError::NoAnswers => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": "no_answers" }),
            ),
            QuizError::UserPassed => (
                StatusCode::CONFLICT,
                json!({ "ok": false, "error": "user_passed" }),
            ),
            QuizError::InvalidPackage => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": "invalid_package" }),
            ),
            QuizError::InsufficientGems {
                current_stars,
                current_gems,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "ok": false,
                    "error": "not_enough_gems",
                    "stars": current_stars,
                    "gems": current_gems,
                }),
            ),
            QuizError::StorageTransient(msg) => {
                tracing::warn!("Transient storage error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "ok": false, "error": "db_busy" }),
                )
            }
            QuizError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "ok": false, "error": "db_error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
