// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        question::{CreateQuestionRequest, Question, QuestionOption, UpdateQuestionRequest},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
        subject::{Subject, SubjectRequest},
        user::PromoteRequest,
    },
    utils::html::clean_html,
};

/// Promotes an active user to admin when the shared admin key matches.
///
/// Deliberately open to any authenticated caller so the first admin can be
/// bootstrapped; the key itself is the gate.
pub async fn promote(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<PromoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let admin_key = config
        .admin_key
        .as_deref()
        .ok_or(AppError::Forbidden("Admin promotion disabled".to_string()))?;

    if payload.admin_key != admin_key {
        return Err(AppError::Forbidden("Invalid admin key".to_string()));
    }

    let result = sqlx::query(
        "UPDATE users SET role = 'admin' WHERE email = ? AND account_status = 'active'",
    )
    .bind(&payload.email)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No active user with that email".to_string()));
    }

    Ok(Json(json!({
        "ok": true,
        "message": format!("'{}' is an admin now", payload.email),
    })))
}

/// Lists all subjects.
pub async fn list_subjects(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>("SELECT id, title FROM subjects ORDER BY id")
        .fetch_all(&pool)
        .await?;

    Ok(Json(subjects))
}

/// Creates a new subject.
pub async fn create_subject(
    State(pool): State<SqlitePool>,
    Json(payload): Json<SubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let title = clean_html(&payload.title);

    let id = sqlx::query_scalar::<_, i64>("INSERT INTO subjects (title) VALUES (?) RETURNING id")
        .bind(&title)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create subject: {:?}", e);
            AppError::from(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "id": id, "title": title })),
    ))
}

/// Renames a subject.
pub async fn update_subject(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<SubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let title = clean_html(&payload.title);

    let result = sqlx::query("UPDATE subjects SET title = ? WHERE id = ?")
        .bind(&title)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    Ok(Json(json!({ "ok": true, "id": id, "title": title })))
}

/// Deletes a subject. Quizzes and questions underneath go with it.
pub async fn delete_subject(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM subjects WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    Ok(Json(json!({ "ok": true, "deleted": id })))
}

/// Lists the quizzes under a subject.
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT id, subject_id, title, gems_reward FROM quizzes WHERE subject_id = ? ORDER BY id",
    )
    .bind(subject_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(quizzes))
}

/// Creates a quiz under a subject.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let subject = sqlx::query_scalar::<_, i64>("SELECT id FROM subjects WHERE id = ?")
        .bind(payload.subject_id)
        .fetch_optional(&pool)
        .await?;

    if subject.is_none() {
        return Err(AppError::NotFound("Subject not found".to_string()));
    }

    let title = clean_html(&payload.title);
    let gems_reward = payload.gems_reward.unwrap_or(0);

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes (subject_id, title, gems_reward) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(payload.subject_id)
    .bind(&title)
    .bind(gems_reward)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "id": id,
            "subject_id": payload.subject_id,
            "title": title,
            "gems_reward": gems_reward,
        })),
    ))
}

/// Updates a quiz. Fields are applied sequentially if present.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    if let Some(title) = payload.title {
        sqlx::query("UPDATE quizzes SET title = ? WHERE id = ?")
            .bind(clean_html(&title))
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(gems_reward) = payload.gems_reward {
        if gems_reward < 0 {
            return Err(AppError::BadRequest("gems_reward must be >= 0".to_string()));
        }
        sqlx::query("UPDATE quizzes SET gems_reward = ? WHERE id = ?")
            .bind(gems_reward)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(Json(json!({ "ok": true, "id": id })))
}

/// Deletes a quiz and everything recorded against it.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(Json(json!({ "ok": true, "deleted": id })))
}

/// Lists the questions of a quiz, answer key included. Admin only, so the
/// key is safe to return here.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_text, question_type, correct_option_id, stars_reward
        FROM questions
        WHERE quiz_id = ?
        ORDER BY id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

/// Returns one question with its options, answer key included.
pub async fn get_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, question_text, question_type, correct_option_id, stars_reward
        FROM questions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT id, question_id, option_text FROM question_options WHERE question_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "question": question,
        "options": options,
    })))
}

/// Creates a question with its options in one transaction.
///
/// The request addresses the correct option by index into `options`; the
/// index is resolved to the inserted row id before the commit, so a
/// question is never visible without its answer key.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.correct_option_index >= payload.options.len() {
        return Err(AppError::BadRequest(
            "correct_option_index out of range".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE id = ?")
        .bind(payload.quiz_id)
        .fetch_optional(&mut *tx)
        .await?;

    if quiz.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let question_type = payload.question_type.as_deref().unwrap_or("single");
    let stars_reward = payload.stars_reward.unwrap_or(1);

    let question_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO questions (quiz_id, question_text, question_type, stars_reward)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(payload.quiz_id)
    .bind(clean_html(&payload.question_text))
    .bind(question_type)
    .bind(stars_reward)
    .fetch_one(&mut *tx)
    .await?;

    let mut correct_option_id = None;
    for (index, option_text) in payload.options.iter().enumerate() {
        let option_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO question_options (question_id, option_text) VALUES (?, ?) RETURNING id",
        )
        .bind(question_id)
        .bind(clean_html(option_text))
        .fetch_one(&mut *tx)
        .await?;

        if index == payload.correct_option_index {
            correct_option_id = Some(option_id);
        }
    }

    sqlx::query("UPDATE questions SET correct_option_id = ? WHERE id = ?")
        .bind(correct_option_id)
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "ok": true,
            "id": question_id,
            "quiz_id": payload.quiz_id,
            "correct_option_id": correct_option_id,
        })),
    ))
}

/// Updates a question. Replacing the options replaces all of them, and
/// recorded answers against the old options are nulled in the same
/// transaction so stale option ids cannot linger.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let quiz_id = sqlx::query_scalar::<_, i64>("SELECT quiz_id FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if let Some(text) = payload.question_text {
        sqlx::query("UPDATE questions SET question_text = ? WHERE id = ?")
            .bind(clean_html(&text))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(question_type) = payload.question_type {
        sqlx::query("UPDATE questions SET question_type = ? WHERE id = ?")
            .bind(question_type)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(stars_reward) = payload.stars_reward {
        if stars_reward < 0 {
            return Err(AppError::BadRequest("stars_reward must be >= 0".to_string()));
        }
        sqlx::query("UPDATE questions SET stars_reward = ? WHERE id = ?")
            .bind(stars_reward)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(options) = payload.options {
        if options.len() < 2 {
            return Err(AppError::BadRequest(
                "A question needs at least two options".to_string(),
            ));
        }
        let correct_index = payload
            .correct_option_index
            .ok_or(AppError::BadRequest(
                "correct_option_index is required when replacing options".to_string(),
            ))?;
        if correct_index >= options.len() {
            return Err(AppError::BadRequest(
                "correct_option_index out of range".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE user_answers
            SET selected_option_id = NULL, is_correct = NULL, answered_at = NULL
            WHERE question_id = ? AND quiz_id = ?
            "#,
        )
        .bind(id)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM question_options WHERE question_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let mut correct_option_id = None;
        for (index, option_text) in options.iter().enumerate() {
            let option_id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO question_options (question_id, option_text) VALUES (?, ?) RETURNING id",
            )
            .bind(id)
            .bind(clean_html(option_text))
            .fetch_one(&mut *tx)
            .await?;

            if index == correct_index {
                correct_option_id = Some(option_id);
            }
        }

        sqlx::query("UPDATE questions SET correct_option_id = ? WHERE id = ?")
            .bind(correct_option_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    } else if let Some(correct_index) = payload.correct_option_index {
        let option_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM question_options WHERE question_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let correct_option_id = option_ids
            .get(correct_index)
            .copied()
            .ok_or(AppError::BadRequest(
                "correct_option_index out of range".to_string(),
            ))?;

        sqlx::query("UPDATE questions SET correct_option_id = ? WHERE id = ?")
            .bind(correct_option_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Json(json!({ "ok": true, "id": id })))
}

/// Deletes a question and its options.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(json!({ "ok": true, "deleted": id })))
}
