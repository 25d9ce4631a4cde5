// src/models/quiz.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub subject_id: i64,
    pub title: String,

    /// Gems granted once when the quiz is passed.
    pub gems_reward: i64,
}

/// DTO for creating a quiz under a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub subject_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0))]
    pub gems_reward: Option<i64>,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub gems_reward: Option<i64>,
}

/// DTO for submitting one answer inside a quiz.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub selected_option_id: i64,
}

/// One quiz entry inside the home payload.
#[derive(Debug, Serialize)]
pub struct HomeQuiz {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub score_percent: i64,
}

/// One subject with its quizzes inside the home payload.
/// The 'quizes' key spelling is part of the wire contract.
#[derive(Debug, Serialize)]
pub struct HomeSubject {
    pub id: i64,
    pub title: String,
    #[serde(rename = "quizes")]
    pub quizzes: Vec<HomeQuiz>,
}

/// Aggregated progress view for the landing screen.
#[derive(Debug, Serialize)]
pub struct HomePayload {
    pub username: String,
    pub gems: i64,
    pub stars: i64,
    pub subjects: Vec<HomeSubject>,
}

/// Per-question state inside a quiz payload. Reveals the correct option
/// only for questions the user has already answered.
#[derive(Debug, Serialize)]
pub struct QuizQuestionPayload {
    #[serde(rename = "type")]
    pub question_type: String,
    pub text: String,
    /// option id -> option text.
    pub answers: BTreeMap<i64, String>,
    pub stars: i64,
    pub user_answered: bool,
    pub selected_option_id: Option<i64>,
    pub is_correct: Option<bool>,
    pub correct_option_id: Option<i64>,
}

/// Full state of one quiz for one user.
#[derive(Debug, Serialize)]
pub struct QuizPayload {
    pub subject: String,
    pub completed: bool,
    pub score: i64,
    pub score_percent: i64,
    pub current_stars: i64,
    pub current_gems: i64,
    /// question id -> question state.
    pub questions: BTreeMap<i64, QuizQuestionPayload>,
}
