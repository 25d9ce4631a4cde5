// src/engine/finalize.rs

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::PASS_MARK_PERCENT;

use super::{error::QuizError, ledger};

/// Result of a finalized attempt, passed or failed.
#[derive(Debug, Serialize)]
pub struct FinishOutcome {
    pub score: i64,
    pub score_percent: i64,
    pub passed: bool,
    pub gems_awarded: i64,
}

#[derive(Debug, Serialize)]
pub struct ResetOutcome {
    pub cleared_answers: u64,
}

/// Integer-floor percentage with the product's bump rule: a finalized
/// attempt never reports 0%, it reports 1%.
pub fn score_percent(earned: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let percent = earned * 100 / total;
    if percent == 0 { 1 } else { percent }
}

/// Finalizes an attempt: aggregates the live answers, stores the summary
/// and awards gems on a pass.
///
/// A completed summary is terminal. The summary write is an upsert guarded
/// by `completed = 0`, so of two racing finalizations only one can flip the
/// row to completed; the loser rolls back without touching gems and reports
/// the stored result.
pub async fn finish_quiz(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> Result<FinishOutcome, QuizError> {
    let mut tx = pool.begin().await?;

    let summary = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT completed, score_percent, gems_awarded FROM user_quizzes WHERE user_id = ? AND quiz_id = ?",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some((completed, stored_percent, stored_gems)) = summary {
        if completed == 1 {
            return Err(QuizError::AlreadyCompleted {
                score_percent: stored_percent,
                gems_awarded: stored_gems,
            });
        }
    }

    // Only live answers count; rows nulled by a reset carry no weight.
    let answers = sqlx::query_as::<_, (bool, i64)>(
        r#"
        SELECT ua.is_correct, q.stars_reward
        FROM user_answers ua
        JOIN questions q ON q.id = ua.question_id
        WHERE ua.user_id = ? AND ua.quiz_id = ?
          AND ua.selected_option_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_all(&mut *tx)
    .await?;

    if answers.is_empty() {
        return Err(QuizError::NoAnswers);
    }

    let total_weight: i64 = answers.iter().map(|(_, weight)| weight).sum();
    let earned_weight: i64 = answers
        .iter()
        .filter(|(correct, _)| *correct)
        .map(|(_, weight)| weight)
        .sum();

    let percent = score_percent(earned_weight, total_weight);
    let passed = percent >= PASS_MARK_PERCENT;

    let gems_awarded = if passed {
        sqlx::query_scalar::<_, i64>("SELECT gems_reward FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0)
    } else {
        0
    };

    let completed_at = if passed {
        Some(Utc::now().timestamp())
    } else {
        None
    };

    let result = sqlx::query(
        r#"
        INSERT INTO user_quizzes
            (user_id, quiz_id, completed, score, score_percent, gems_awarded, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, quiz_id) DO UPDATE SET
            completed = excluded.completed,
            score = excluded.score,
            score_percent = excluded.score_percent,
            gems_awarded = excluded.gems_awarded,
            completed_at = excluded.completed_at
        WHERE user_quizzes.completed = 0
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .bind(passed)
    .bind(earned_weight)
    .bind(percent)
    .bind(gems_awarded)
    .bind(completed_at)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // Lost the race against a finalization that already completed.
        tx.rollback().await?;
        let stored = sqlx::query_as::<_, (i64, i64)>(
            "SELECT score_percent, gems_awarded FROM user_quizzes WHERE user_id = ? AND quiz_id = ?",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .unwrap_or((0, 0));
        return Err(QuizError::AlreadyCompleted {
            score_percent: stored.0,
            gems_awarded: stored.1,
        });
    }

    if passed && gems_awarded > 0 {
        ledger::adjust_gems(&mut tx, user_id, gems_awarded).await?;
    }

    tx.commit().await?;

    Ok(FinishOutcome {
        score: earned_weight,
        score_percent: percent,
        passed,
        gems_awarded,
    })
}

/// Clears a failed attempt so the quiz can be retaken. Answer rows are
/// nulled, not deleted, and the summary is zeroed in the same transaction.
/// Refused once the stored attempt passed.
pub async fn reset_quiz(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> Result<ResetOutcome, QuizError> {
    let mut tx = pool.begin().await?;

    let stored_percent = sqlx::query_scalar::<_, i64>(
        "SELECT score_percent FROM user_quizzes WHERE user_id = ? AND quiz_id = ?",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(percent) = stored_percent {
        if percent >= PASS_MARK_PERCENT {
            return Err(QuizError::UserPassed);
        }
    }

    let cleared = sqlx::query(
        r#"
        UPDATE user_answers
        SET selected_option_id = NULL,
            is_correct = NULL,
            answered_at = NULL
        WHERE user_id = ? AND quiz_id = ?
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query(
        r#"
        UPDATE user_quizzes
        SET completed = 0,
            score = 0,
            score_percent = 0,
            gems_awarded = 0,
            completed_at = NULL
        WHERE user_id = ? AND quiz_id = ?
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ResetOutcome {
        cleared_answers: cleared,
    })
}
