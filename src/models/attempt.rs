// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Per-question outcome of a scored attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub question_index: usize,
    pub correct: bool,

    /// Set only for incorrect answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

/// Represents the 'quiz_attempts' table in the database.
/// Written once per submission and never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttemptRecord {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score_percent: i32,
    pub passed: bool,
    pub feedback: Json<Vec<QuestionFeedback>>,
    pub attempted_at: chrono::DateTime<chrono::Utc>,
}

/// Insert payload for a new attempt.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    pub score_percent: i32,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
    pub attempted_at: chrono::DateTime<chrono::Utc>,
}

impl NewAttempt {
    pub fn into_record(self, id: Uuid) -> QuizAttemptRecord {
        QuizAttemptRecord {
            id,
            quiz_id: self.quiz_id,
            user_id: self.user_id,
            score_percent: self.score_percent,
            passed: self.passed,
            feedback: Json(self.feedback),
            attempted_at: self.attempted_at,
        }
    }
}
