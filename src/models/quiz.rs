// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::Question;

/// Represents the 'quizzes' table in the database.
/// The payload in `quiz_json` is authored elsewhere and may use legacy field names.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizRow {
    pub id: Uuid,
    pub lesson_id: Uuid,

    /// Raw `{ "questions": [...] }` document.
    pub quiz_json: Option<Json<serde_json::Value>>,

    pub passing_threshold: Option<i32>,
    pub timer_minutes: Option<i32>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A quiz after normalization. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizDefinition {
    pub id: Uuid,
    pub lesson_id: Uuid,
    pub questions: Vec<Question>,

    /// Minimum percent score required to pass, 0..=100.
    pub passing_threshold: i32,

    /// Always positive.
    pub timer_minutes: i32,
}

impl QuizDefinition {
    pub fn time_limit_seconds(&self) -> u32 {
        (self.timer_minutes.max(1) as u32).saturating_mul(60)
    }
}

/// DTO for opening a quiz session.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub lesson_id: Uuid,
}

/// DTO for choosing an option.
/// The option index is stored as given; a value outside the options simply scores as wrong.
#[derive(Debug, Deserialize, Validate)]
pub struct SelectAnswerRequest {
    #[validate(range(min = 0, max = 10000))]
    pub question_index: i64,
    pub option_index: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_limit_saturates() {
        let definition = QuizDefinition {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            questions: Vec::new(),
            passing_threshold: 80,
            timer_minutes: i32::MAX,
        };
        assert_eq!(definition.time_limit_seconds(), u32::MAX);
    }
}
