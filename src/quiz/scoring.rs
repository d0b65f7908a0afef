// src/quiz/scoring.rs

use std::collections::HashMap;

use crate::models::{attempt::QuestionFeedback, question::Question};

/// Outcome of grading one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub correct_count: usize,
    pub total_questions: usize,
    pub score_percent: i32,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
}

/// `correct / total * 100`, rounded half up. Integer arithmetic, so `x.5` is exact.
/// An empty quiz scores 0.
pub fn score_percent(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((correct * 200 + total) / (total * 2)) as i32
}

/// Grades `answers` (question index -> chosen option) against `questions`.
///
/// Unanswered questions count as incorrect. A chosen option is correct only
/// when it equals the question's answer key exactly.
pub fn grade(
    questions: &[Question],
    answers: &HashMap<usize, i64>,
    passing_threshold: i32,
    fallback_tip: &str,
) -> Scorecard {
    let mut correct_count = 0;
    let mut feedback = Vec::with_capacity(questions.len());

    for (index, question) in questions.iter().enumerate() {
        let correct = question
            .correct_index
            .is_some_and(|key| answers.get(&index) == Some(&key));
        if correct {
            correct_count += 1;
        }

        let tip = (!correct).then(|| {
            if question.tip.is_empty() {
                fallback_tip.to_string()
            } else {
                question.tip.clone()
            }
        });

        feedback.push(QuestionFeedback {
            question_index: index,
            correct,
            tip,
        });
    }

    let score_percent = score_percent(correct_count, questions.len());

    Scorecard {
        correct_count,
        total_questions: questions.len(),
        score_percent,
        passed: score_percent >= passing_threshold,
        feedback,
    }
}
