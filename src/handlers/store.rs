// src/handlers/store.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    engine::{self, QuizError, purchase::PACKAGES},
    utils::jwt::Claims,
};

/// Lists the star package catalog.
pub async fn list_packages() -> impl IntoResponse {
    let packages: Vec<_> = PACKAGES
        .iter()
        .map(|pkg| {
            json!({
                "name": pkg.name,
                "stars": pkg.stars,
                "gems_cost": pkg.gems_cost,
            })
        })
        .collect();

    Json(json!({ "packages": packages }))
}

/// Exchanges gems for the named star package.
pub async fn buy_stars(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(package): Path<String>,
) -> Result<impl IntoResponse, QuizError> {
    let outcome = engine::purchase::buy_star_package(&pool, claims.user_id(), &package).await?;

    Ok(Json(json!({
        "ok": true,
        "stars": outcome.stars,
        "gems": outcome.gems,
        "purchased_package": outcome.purchased_package,
    })))
}
