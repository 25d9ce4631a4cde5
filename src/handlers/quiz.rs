// src/handlers/quiz.rs

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    engine::{self, QuizError},
    error::AppError,
    models::quiz::{QuizPayload, QuizQuestionPayload, SubmitAnswerRequest},
    utils::jwt::Claims,
};

/// Returns the full state of one quiz for the caller: every question with
/// its options, the caller's recorded answers, and the attempt summary.
///
/// The correct option is only revealed for questions the caller already
/// answered, so the payload never leaks an answer key ahead of time.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let subject = sqlx::query_scalar::<_, String>(
        r#"
        SELECT s.title
        FROM quizzes q
        JOIN subjects s ON s.id = q.subject_id
        WHERE q.id = ?
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let (current_stars, current_gems) =
        sqlx::query_as::<_, (i64, i64)>("SELECT stars, gems FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&pool)
            .await?
            .unwrap_or((0, 0));

    let summary = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT completed, score, score_percent FROM user_quizzes WHERE user_id = ? AND quiz_id = ?",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(&pool)
    .await?;

    // The summary only counts once the attempt is finalized.
    let (completed, score, score_percent) = match summary {
        Some((1, score, percent)) => (true, score, percent),
        _ => (false, 0, 0),
    };

    let question_rows = sqlx::query_as::<_, (i64, String, String, Option<i64>, i64)>(
        r#"
        SELECT id, question_text, question_type, correct_option_id, stars_reward
        FROM questions
        WHERE quiz_id = ?
        ORDER BY id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let option_rows = sqlx::query_as::<_, (i64, i64, String)>(
        r#"
        SELECT o.id, o.question_id, o.option_text
        FROM question_options o
        JOIN questions q ON q.id = o.question_id
        WHERE q.quiz_id = ?
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let answer_rows = sqlx::query_as::<_, (i64, Option<i64>, Option<bool>)>(
        r#"
        SELECT question_id, selected_option_id, is_correct
        FROM user_answers
        WHERE user_id = ? AND quiz_id = ?
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let mut options_by_question: BTreeMap<i64, BTreeMap<i64, String>> = BTreeMap::new();
    for (option_id, question_id, text) in option_rows {
        options_by_question
            .entry(question_id)
            .or_default()
            .insert(option_id, text);
    }

    let answers_by_question: BTreeMap<i64, (Option<i64>, Option<bool>)> = answer_rows
        .into_iter()
        .map(|(question_id, selected, correct)| (question_id, (selected, correct)))
        .collect();

    let questions = question_rows
        .into_iter()
        .map(|(id, text, question_type, correct_option_id, stars)| {
            let (selected_option_id, is_correct) =
                answers_by_question.get(&id).copied().unwrap_or((None, None));
            // Rows nulled by a reset count as unanswered.
            let user_answered = selected_option_id.is_some();

            let payload = QuizQuestionPayload {
                question_type,
                text,
                answers: options_by_question.remove(&id).unwrap_or_default(),
                stars,
                user_answered,
                selected_option_id,
                is_correct,
                correct_option_id: if user_answered { correct_option_id } else { None },
            };
            (id, payload)
        })
        .collect();

    Ok(Json(QuizPayload {
        subject,
        completed,
        score,
        score_percent,
        current_stars,
        current_gems,
        questions,
    }))
}

/// Records one answer and settles the star movement in the same transaction.
pub async fn submit_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizError> {
    let outcome = engine::answer::submit_answer(
        &pool,
        claims.user_id(),
        quiz_id,
        payload.question_id,
        payload.selected_option_id,
    )
    .await?;

    Ok(Json(json!({
        "ok": true,
        "is_correct": outcome.is_correct,
        "correct_option_id": outcome.correct_option_id,
        "selected_option_id": outcome.selected_option_id,
        "stars_delta": outcome.stars_delta,
        "current_stars": outcome.current_stars,
    })))
}

/// Finalizes the attempt: scores the live answers and awards gems on a pass.
pub async fn finish_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, QuizError> {
    let outcome = engine::finalize::finish_quiz(&pool, claims.user_id(), quiz_id).await?;

    Ok(Json(json!({
        "ok": true,
        "score": outcome.score,
        "score_percent": outcome.score_percent,
        "passed": outcome.passed,
        "gems_awarded": outcome.gems_awarded,
    })))
}

/// Clears a failed attempt so the quiz can be retaken.
pub async fn reset_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, QuizError> {
    engine::finalize::reset_quiz(&pool, claims.user_id(), quiz_id).await?;

    Ok(Json(json!({
        "ok": true,
        "message": "Answers reset successfully",
    })))
}
