// src/engine/ledger.rs

use sqlx::{SqliteConnection, SqlitePool};

use super::error::QuizError;

/// A user's spendable currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub stars: i64,
    pub gems: i64,
}

/// All balance mutations go through this module. Functions take a plain
/// connection so they join whatever transaction the caller already holds.

pub async fn stars_of(conn: &mut SqliteConnection, user_id: i64) -> Result<i64, QuizError> {
    sqlx::query_scalar::<_, i64>("SELECT stars FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(QuizError::UserNotFound)
}

pub async fn balance_of(conn: &mut SqliteConnection, user_id: i64) -> Result<Balance, QuizError> {
    let row = sqlx::query_as::<_, (i64, i64)>("SELECT stars, gems FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(QuizError::UserNotFound)?;

    Ok(Balance {
        stars: row.0,
        gems: row.1,
    })
}

/// Applies a star delta and returns the new balance. The clamp lives in the
/// UPDATE itself so the floor holds under any interleaving.
pub async fn adjust_stars(
    conn: &mut SqliteConnection,
    user_id: i64,
    delta: i64,
) -> Result<i64, QuizError> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE users SET stars = MAX(0, stars + ?) WHERE id = ? RETURNING stars",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(QuizError::UserNotFound)
}

/// Applies a gem delta and returns the new balance. Same clamp as stars.
pub async fn adjust_gems(
    conn: &mut SqliteConnection,
    user_id: i64,
    delta: i64,
) -> Result<i64, QuizError> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE users SET gems = MAX(0, gems + ?) WHERE id = ? RETURNING gems",
    )
    .bind(delta)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(QuizError::UserNotFound)
}

/// Tops every user below `target` up to exactly `target` stars and stamps
/// last_star_refill. Users at or above the target are untouched, so the
/// operation never lowers a balance and re-running it is a no-op.
/// Returns the number of users topped up.
pub async fn refill_to_floor(pool: &SqlitePool, target: i64) -> Result<u64, QuizError> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query("UPDATE users SET stars = ?, last_star_refill = ? WHERE stars < ?")
        .bind(target)
        .bind(now)
        .bind(target)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
