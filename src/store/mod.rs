// src/store/mod.rs

//! Persistence boundary of the quiz engine.
//!
//! Quiz content and attempt history live behind [`ContentStore`]; the credit
//! balance lives behind [`LedgerStore`]. Balance changes are expressed as
//! atomic adjustments so concurrent sessions of the same user never lose an
//! update.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{NewAttempt, QuizAttemptRecord},
        quiz::QuizRow,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Most recently created quiz for the lesson, if any.
    async fn fetch_quiz_definition(&self, lesson_id: Uuid) -> Result<Option<QuizRow>, AppError>;

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttemptRecord, AppError>;

    /// Attempts of one user on one quiz, newest first.
    async fn fetch_attempt_history(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<QuizAttemptRecord>, AppError>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_balance(&self, user_id: Uuid) -> Result<f64, AppError>;

    /// Atomically adds `delta` to the balance and returns the new balance.
    async fn adjust_balance(&self, user_id: Uuid, delta: f64) -> Result<f64, AppError>;

    /// Atomically subtracts `amount` only if the balance covers it.
    /// Returns `None` when funds are insufficient or the account does not exist.
    async fn debit_if_sufficient(&self, user_id: Uuid, amount: f64)
    -> Result<Option<f64>, AppError>;
}

/// The collaborators a quiz session talks to.
#[derive(Clone)]
pub struct Stores {
    pub content: Arc<dyn ContentStore>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Stores {
    pub fn new(content: Arc<dyn ContentStore>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { content, ledger }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            content: store.clone(),
            ledger: store,
        }
    }

    pub fn memory(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            content: store.clone(),
            ledger: store,
        }
    }
}
