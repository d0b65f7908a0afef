// src/models/question.rs

use serde::{Deserialize, Serialize};

/// Canonical question shape used by the quiz engine.
/// Built once at load time from whatever shape the stored quiz JSON uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Display label.
    pub text: String,

    /// Answer choices. The position of an option is its identity.
    pub options: Vec<String>,

    /// Index into `options` of the correct choice.
    /// Not guaranteed to be in range; an out-of-range key simply never matches.
    /// `None` when the stored key is a number that cannot be an index (e.g. `1.5`):
    /// no selection matches it.
    pub correct_index: Option<i64>,

    /// Remediation shown when the question is answered incorrectly. May be empty.
    pub tip: String,
}

impl Question {
    pub fn to_public(&self, index: usize) -> PublicQuestion {
        PublicQuestion {
            index,
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }
}

/// DTO for sending a question to the client (excludes the answer key and tip).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub index: usize,
    pub text: String,
    pub options: Vec<String>,
}
