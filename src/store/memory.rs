// src/store/memory.rs

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{NewAttempt, QuizAttemptRecord},
        quiz::QuizRow,
    },
    store::{ContentStore, LedgerStore},
};

#[derive(Default)]
struct MemoryData {
    quizzes: Vec<QuizRow>,
    attempts: Vec<QuizAttemptRecord>,
    balances: HashMap<Uuid, f64>,
}

/// In-process store used when no database is configured, and by tests.
///
/// Every ledger mutation happens under a single write lock, which gives the
/// same all-or-nothing semantics as the single-statement SQL updates.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_quiz(&self, row: QuizRow) {
        self.data.write().await.quizzes.push(row);
    }

    /// Creates the account if needed.
    pub async fn set_balance(&self, user_id: Uuid, balance: f64) {
        self.data.write().await.balances.insert(user_id, balance);
    }

    pub async fn attempt_count(&self) -> usize {
        self.data.read().await.attempts.len()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch_quiz_definition(&self, lesson_id: Uuid) -> Result<Option<QuizRow>, AppError> {
        let data = self.data.read().await;
        // `max_by_key` keeps the last of equal keys, so later inserts win ties.
        let latest = data
            .quizzes
            .iter()
            .filter(|q| q.lesson_id == lesson_id)
            .max_by_key(|q| q.created_at)
            .cloned();
        Ok(latest)
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttemptRecord, AppError> {
        let record = attempt.into_record(Uuid::new_v4());
        self.data.write().await.attempts.push(record.clone());
        Ok(record)
    }

    async fn fetch_attempt_history(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<QuizAttemptRecord>, AppError> {
        let data = self.data.read().await;
        let mut history: Vec<QuizAttemptRecord> = data
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id && a.user_id == user_id)
            .cloned()
            .collect();
        history.reverse();
        history.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        Ok(history)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_balance(&self, user_id: Uuid) -> Result<f64, AppError> {
        self.data
            .read()
            .await
            .balances
            .get(&user_id)
            .copied()
            .ok_or(AppError::NotFound("User not found".to_string()))
    }

    async fn adjust_balance(&self, user_id: Uuid, delta: f64) -> Result<f64, AppError> {
        let mut data = self.data.write().await;
        let balance = data
            .balances
            .get_mut(&user_id)
            .ok_or(AppError::NotFound("User not found".to_string()))?;
        *balance += delta;
        Ok(*balance)
    }

    async fn debit_if_sufficient(
        &self,
        user_id: Uuid,
        amount: f64,
    ) -> Result<Option<f64>, AppError> {
        let mut data = self.data.write().await;
        match data.balances.get_mut(&user_id) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
                Ok(Some(*balance))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn quiz(lesson_id: Uuid, minutes_ago: i64) -> QuizRow {
        QuizRow {
            id: Uuid::new_v4(),
            lesson_id,
            quiz_json: None,
            passing_threshold: None,
            timer_minutes: None,
            created_at: Some(Utc::now() - Duration::minutes(minutes_ago)),
        }
    }

    #[tokio::test]
    async fn test_latest_quiz_wins() {
        let store = MemoryStore::new();
        let lesson = Uuid::new_v4();
        let old = quiz(lesson, 60);
        let new = quiz(lesson, 1);
        let new_id = new.id;
        store.insert_quiz(new).await;
        store.insert_quiz(old).await;
        store.insert_quiz(quiz(Uuid::new_v4(), 0)).await;

        let found = store.fetch_quiz_definition(lesson).await.unwrap().unwrap();
        assert_eq!(found.id, new_id);
    }

    #[tokio::test]
    async fn test_missing_lesson_is_none() {
        let store = MemoryStore::new();
        let found = store.fetch_quiz_definition(Uuid::new_v4()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_debit_requires_funds() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, 1.9).await;

        assert_eq!(store.debit_if_sufficient(user, 2.0).await.unwrap(), None);
        assert_eq!(store.get_balance(user).await.unwrap(), 1.9);

        store.set_balance(user, 2.0).await;
        assert_eq!(store.debit_if_sufficient(user, 2.0).await.unwrap(), Some(0.0));
        assert_eq!(store.debit_if_sufficient(Uuid::new_v4(), 0.0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_adjustments_are_not_lost() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.set_balance(user, 0.0).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.adjust_balance(user, 0.5).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_balance(user).await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_adjust_unknown_user_fails() {
        let store = MemoryStore::new();
        let err = store.adjust_balance(Uuid::new_v4(), 0.5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
