// src/engine/refill.rs

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::config::REFILL_TARGET;

use super::{error::QuizError, ledger};

/// Runs one refill cycle: every user below `target` is topped up to it.
/// Idempotent; quiz and attempt state are never touched.
pub async fn run_refill_cycle(pool: &SqlitePool, target: i64) -> Result<u64, QuizError> {
    ledger::refill_to_floor(pool, target).await
}

/// Spawns the periodic refill worker. Runs a cycle immediately, then every
/// `interval`. A failed cycle is logged and retried on the next tick.
pub fn spawn_refill_worker(pool: SqlitePool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Starting star refill worker (target {}, interval {}s)",
            REFILL_TARGET,
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        loop {
            // First tick fires immediately, so startup runs a cycle.
            ticker.tick().await;
            match run_refill_cycle(&pool, REFILL_TARGET).await {
                Ok(count) => {
                    tracing::info!("Star refill cycle completed, {} users topped up", count)
                }
                Err(err) => tracing::warn!("Star refill cycle failed: {}", err),
            }
        }
    })
}
