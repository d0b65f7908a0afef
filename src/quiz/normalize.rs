// src/quiz/normalize.rs

//! Adapter from stored quiz documents to the canonical [`Question`] shape.
//!
//! Authored quizzes exist in two schemas: the current one
//! (`question`, `options`, `correct`, `tip`) and a legacy one
//! (`answers`, `correctAnswer`, `hint`). Everything downstream of this module
//! only ever sees the canonical shape.

use serde_json::Value;

use crate::{
    config::{MAX_TIMER_MINUTES, QuizRules},
    models::{
        question::Question,
        quiz::{QuizDefinition, QuizRow},
    },
};

const LABEL_KEYS: [&str; 2] = ["question", "text"];
const OPTION_KEYS: [&str; 2] = ["options", "answers"];
const CORRECT_KEYS: [&str; 2] = ["correct", "correctAnswer"];
const TIP_KEYS: [&str; 2] = ["tip", "hint"];

/// Builds a definition from a stored row.
///
/// Returns `None` when the row carries nothing answerable (no document, or an
/// empty question list); callers treat that the same as "no quiz".
pub fn normalize_definition(row: QuizRow, rules: &QuizRules) -> Option<QuizDefinition> {
    let document = row.quiz_json?.0;

    let questions: Vec<Question> = document
        .get("questions")
        .and_then(Value::as_array)
        .map(|raw| {
            raw.iter()
                .enumerate()
                .map(|(position, q)| normalize_question(q, position))
                .collect()
        })
        .unwrap_or_default();

    if questions.is_empty() {
        return None;
    }

    let passing_threshold = row
        .passing_threshold
        .unwrap_or(rules.default_passing_threshold)
        .clamp(0, 100);

    let timer_minutes = row
        .timer_minutes
        .filter(|minutes| *minutes > 0)
        .unwrap_or(rules.default_timer_minutes)
        .min(MAX_TIMER_MINUTES);

    Some(QuizDefinition {
        id: row.id,
        lesson_id: row.lesson_id,
        questions,
        passing_threshold,
        timer_minutes,
    })
}

/// Normalizes one raw question. Never fails: missing or mistyped fields fall
/// back to defaults. `position` is 0-based.
pub fn normalize_question(raw: &Value, position: usize) -> Question {
    let text = first_string(raw, &LABEL_KEYS).unwrap_or_else(|| format!("Question {}", position + 1));

    let options: Vec<String> = OPTION_KEYS
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_array))
        .map(|items| items.iter().map(option_label).collect())
        .unwrap_or_default();

    let correct_index = CORRECT_KEYS
        .iter()
        .find_map(|key| raw.get(key).and_then(answer_key))
        .unwrap_or(Some(0));

    let tip = first_string(raw, &TIP_KEYS).unwrap_or_default();

    Question {
        text,
        options,
        correct_index,
        tip,
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

fn option_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Any JSON number is an answer key; `None` inside means it can never match
/// (non-integral, or outside `i64`). Non-numbers are not keys at all.
fn answer_key(value: &Value) -> Option<Option<i64>> {
    if !value.is_number() {
        return None;
    }
    let key = value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    });
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn row(doc: Option<Value>, threshold: Option<i32>, minutes: Option<i32>) -> QuizRow {
        QuizRow {
            id: Uuid::new_v4(),
            lesson_id: Uuid::new_v4(),
            quiz_json: doc.map(Json),
            passing_threshold: threshold,
            timer_minutes: minutes,
            created_at: None,
        }
    }

    #[test]
    fn test_current_schema() {
        let q = normalize_question(
            &json!({"question": "2+2?", "options": ["3", "4"], "correct": 1, "tip": "Add"}),
            0,
        );
        assert_eq!(q.text, "2+2?");
        assert_eq!(q.options, vec!["3", "4"]);
        assert_eq!(q.correct_index, Some(1));
        assert_eq!(q.tip, "Add");
    }

    #[test]
    fn test_legacy_schema_matches_current() {
        let current = normalize_question(
            &json!({"question": "Q", "options": ["a", "b", "c"], "correct": 2, "tip": "t"}),
            0,
        );
        let legacy = normalize_question(
            &json!({"question": "Q", "answers": ["a", "b", "c"], "correctAnswer": 2, "hint": "t"}),
            0,
        );
        assert_eq!(current, legacy);
    }

    #[test]
    fn test_current_fields_win_over_legacy() {
        let q = normalize_question(
            &json!({
                "options": ["x"],
                "answers": ["y", "z"],
                "correct": 0,
                "correctAnswer": 1,
                "tip": "tip",
                "hint": "hint"
            }),
            0,
        );
        assert_eq!(q.options, vec!["x"]);
        assert_eq!(q.correct_index, Some(0));
        assert_eq!(q.tip, "tip");
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let q = normalize_question(&json!({}), 3);
        assert_eq!(q.text, "Question 4");
        assert!(q.options.is_empty());
        assert_eq!(q.correct_index, Some(0));
        assert_eq!(q.tip, "");

        // Non-object entries are tolerated too.
        let q = normalize_question(&json!("not a question"), 0);
        assert_eq!(q.text, "Question 1");
    }

    #[test]
    fn test_non_numeric_correct_is_ignored() {
        let q = normalize_question(&json!({"correct": "1", "correctAnswer": 2}), 0);
        assert_eq!(q.correct_index, Some(2));

        let q = normalize_question(&json!({"correct": 2.0}), 0);
        assert_eq!(q.correct_index, Some(2));
    }

    #[test]
    fn test_fractional_correct_never_matches() {
        // A number is still the key, even when it cannot be an index.
        let q = normalize_question(&json!({"correct": 1.5, "correctAnswer": 0}), 0);
        assert_eq!(q.correct_index, None);

        let q = normalize_question(&json!({"options": ["a", "b"], "correct": 0.5}), 0);
        assert_eq!(q.correct_index, None);
    }

    #[test]
    fn test_empty_tip_falls_through_to_hint() {
        let q = normalize_question(&json!({"tip": "", "hint": "look again"}), 0);
        assert_eq!(q.tip, "look again");
    }

    #[test]
    fn test_definition_defaults() {
        let rules = QuizRules::default();
        let def = normalize_definition(
            row(Some(json!({"questions": [{"question": "Q"}]})), None, None),
            &rules,
        )
        .unwrap();
        assert_eq!(def.passing_threshold, 80);
        assert_eq!(def.timer_minutes, 5);
        assert_eq!(def.time_limit_seconds(), 300);

        let def = normalize_definition(
            row(Some(json!({"questions": [{}]})), Some(150), Some(0)),
            &rules,
        )
        .unwrap();
        assert_eq!(def.passing_threshold, 100);
        assert_eq!(def.timer_minutes, 5);
    }

    #[test]
    fn test_huge_timer_is_capped() {
        let def = normalize_definition(
            row(Some(json!({"questions": [{}]})), None, Some(100_000_000)),
            &QuizRules::default(),
        )
        .unwrap();
        assert_eq!(def.timer_minutes, MAX_TIMER_MINUTES);
        assert_eq!(def.time_limit_seconds(), 86_400);
    }

    #[test]
    fn test_unanswerable_definition_is_empty() {
        let rules = QuizRules::default();
        assert!(normalize_definition(row(None, None, None), &rules).is_none());
        assert!(normalize_definition(row(Some(json!({})), None, None), &rules).is_none());
        assert!(
            normalize_definition(row(Some(json!({"questions": []})), None, None), &rules)
                .is_none()
        );
    }
}
