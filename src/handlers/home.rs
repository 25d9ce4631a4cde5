// src/handlers/home.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::quiz::{HomePayload, HomeQuiz, HomeSubject},
    utils::jwt::Claims,
};

/// Builds the landing-screen payload: balances plus every subject with its
/// quizzes and the user's completion state for each.
pub async fn home_data(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let (username, stars, gems) = sqlx::query_as::<_, (String, i64, i64)>(
        "SELECT username, stars, gems FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let subjects = sqlx::query_as::<_, (i64, String)>("SELECT id, title FROM subjects ORDER BY id")
        .fetch_all(&pool)
        .await?;

    let quiz_rows = sqlx::query_as::<_, (i64, i64, String, i64, i64)>(
        r#"
        SELECT q.id, q.subject_id, q.title,
               COALESCE(uq.completed, 0), COALESCE(uq.score_percent, 0)
        FROM quizzes q
        LEFT JOIN user_quizzes uq ON uq.quiz_id = q.id AND uq.user_id = ?
        ORDER BY q.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let subjects = subjects
        .into_iter()
        .map(|(subject_id, title)| HomeSubject {
            id: subject_id,
            title,
            quizzes: quiz_rows
                .iter()
                .filter(|(_, sid, ..)| *sid == subject_id)
                .map(|(id, _, title, completed, score_percent)| HomeQuiz {
                    id: *id,
                    title: title.clone(),
                    completed: *completed == 1,
                    score_percent: *score_percent,
                })
                .collect(),
        })
        .collect();

    Ok(Json(HomePayload {
        username,
        gems,
        stars,
        subjects,
    }))
}
