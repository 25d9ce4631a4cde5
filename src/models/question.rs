// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,

    /// Question type: 'single' for now; kept as text for future types.
    pub question_type: String,

    /// Points to a row in question_options. Nullable while a question is
    /// being authored, always set for a playable question.
    pub correct_option_id: Option<i64>,

    /// Stars granted for a correct answer; also the question's scoring weight.
    pub stars_reward: i64,
}

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
}

/// DTO for creating a question together with its options.
/// `correct_option_index` points into `options`; it is resolved to the
/// inserted row id inside the same transaction.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    #[validate(length(min = 1, max = 20))]
    pub question_type: Option<String>,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_option_index: usize,
    #[validate(range(min = 0))]
    pub stars_reward: Option<i64>,
}

/// DTO for updating a question. Replacing the options replaces all of them.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question_text: Option<String>,
    pub question_type: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_option_index: Option<usize>,
    pub stars_reward: Option<i64>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("need_at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("option_length"));
        }
    }
    Ok(())
}
