// src/engine/answer.rs

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use super::{error::QuizError, ledger};

/// Result of a successfully recorded answer.
#[derive(Debug, Serialize)]
pub struct SubmissionOutcome {
    pub is_correct: bool,
    pub correct_option_id: i64,
    pub selected_option_id: i64,
    pub stars_delta: i64,
    pub current_stars: i64,
}

/// Star movement for one answer. `None` means the user cannot pay for a
/// wrong answer, in which case nothing may be recorded.
pub fn stars_delta(is_correct: bool, stars_reward: i64, current_stars: i64) -> Option<i64> {
    if is_correct {
        Some(stars_reward)
    } else if current_stars <= 0 {
        None
    } else {
        Some(-1)
    }
}

/// True when the user holds a live answer for this question.
/// Rows nulled out by a reset do not count.
pub async fn has_answered(
    conn: &mut SqliteConnection,
    user_id: i64,
    quiz_id: i64,
    question_id: i64,
) -> Result<bool, QuizError> {
    let row = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT 1 FROM user_answers
        WHERE user_id = ? AND quiz_id = ? AND question_id = ?
          AND selected_option_id IS NOT NULL
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .bind(question_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.is_some())
}

/// Submits one answer: duplicate check, correctness, star movement and the
/// answer record, all in a single transaction.
///
/// Duplicates cannot slip through between the check and the write: the
/// record is an upsert over UNIQUE(user_id, quiz_id, question_id) that only
/// fills rows whose selected_option_id is still NULL, so of two racing
/// submissions exactly one touches a row. The loser is rolled back, stars
/// untouched.
pub async fn submit_answer(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
    question_id: i64,
    selected_option_id: i64,
) -> Result<SubmissionOutcome, QuizError> {
    let mut tx = pool.begin().await?;

    let current_stars = ledger::stars_of(&mut tx, user_id).await?;

    if has_answered(&mut tx, user_id, quiz_id, question_id).await? {
        let correct_option_id =
            sqlx::query_scalar::<_, Option<i64>>("SELECT correct_option_id FROM questions WHERE id = ?")
                .bind(question_id)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();
        return Err(QuizError::AlreadyAnswered { correct_option_id });
    }

    // The question must belong to the addressed quiz.
    let question = sqlx::query_as::<_, (Option<i64>, i64)>(
        "SELECT correct_option_id, stars_reward FROM questions WHERE id = ? AND quiz_id = ?",
    )
    .bind(question_id)
    .bind(quiz_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(QuizError::QuestionNotFound)?;

    let (correct_option_id, stars_reward) = question;
    let correct_option_id = correct_option_id.ok_or(QuizError::QuestionNotFound)?;

    let is_correct = selected_option_id == correct_option_id;

    let delta = stars_delta(is_correct, stars_reward, current_stars)
        .ok_or(QuizError::NotReady { current_stars })?;

    let current_stars = ledger::adjust_stars(&mut tx, user_id, delta).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO user_answers
            (user_id, quiz_id, question_id, selected_option_id, is_correct, answered_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, quiz_id, question_id) DO UPDATE SET
            selected_option_id = excluded.selected_option_id,
            is_correct = excluded.is_correct,
            answered_at = excluded.answered_at
        WHERE user_answers.selected_option_id IS NULL
        "#,
    )
    .bind(user_id)
    .bind(quiz_id)
    .bind(question_id)
    .bind(selected_option_id)
    .bind(is_correct)
    .bind(Utc::now().timestamp())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // A concurrent submission already filled the row.
        tx.rollback().await?;
        return Err(QuizError::AlreadyAnswered {
            correct_option_id: Some(correct_option_id),
        });
    }

    tx.commit().await?;

    Ok(SubmissionOutcome {
        is_correct,
        correct_option_id,
        selected_option_id,
        stars_delta: delta,
        current_stars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_answer_pays_the_reward() {
        assert_eq!(stars_delta(true, 3, 0), Some(3));
        assert_eq!(stars_delta(true, 1, 10), Some(1));
    }

    #[test]
    fn wrong_answer_costs_one_star() {
        assert_eq!(stars_delta(false, 3, 5), Some(-1));
        assert_eq!(stars_delta(false, 1, 1), Some(-1));
    }

    #[test]
    fn wrong_answer_at_zero_stars_is_refused() {
        assert_eq!(stars_delta(false, 3, 0), None);
    }

    #[test]
    fn correct_answer_at_zero_stars_still_pays() {
        assert_eq!(stars_delta(true, 2, 0), Some(2));
    }
}
