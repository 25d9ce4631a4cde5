// src/models/subject.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'subjects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub title: String,
}

/// DTO for creating or renaming a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct SubjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}
