// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attempt::{NewAttempt, QuizAttemptRecord},
        quiz::QuizRow,
    },
    store::{ContentStore, LedgerStore},
};

/// Postgres-backed content and ledger store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn fetch_quiz_definition(&self, lesson_id: Uuid) -> Result<Option<QuizRow>, AppError> {
        sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT id, lesson_id, quiz_json, passing_threshold, timer_minutes, created_at
            FROM quizzes
            WHERE lesson_id = $1
            ORDER BY created_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz for lesson {}: {:?}", lesson_id, e);
            AppError::from(e)
        })
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> Result<QuizAttemptRecord, AppError> {
        sqlx::query_as::<_, QuizAttemptRecord>(
            r#"
            INSERT INTO quiz_attempts (quiz_id, user_id, score, passed, feedback, attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                id,
                quiz_id,
                user_id,
                score AS score_percent,
                passed,
                feedback,
                attempt_at AS attempted_at
            "#,
        )
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(attempt.score_percent)
        .bind(attempt.passed)
        .bind(Json(&attempt.feedback))
        .bind(attempt.attempted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz attempt: {:?}", e);
            AppError::from(e)
        })
    }

    async fn fetch_attempt_history(
        &self,
        quiz_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<QuizAttemptRecord>, AppError> {
        let history = sqlx::query_as::<_, QuizAttemptRecord>(
            r#"
            SELECT
                id,
                quiz_id,
                user_id,
                score AS score_percent,
                passed,
                feedback,
                attempt_at AS attempted_at
            FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY attempt_at DESC
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn get_balance(&self, user_id: Uuid) -> Result<f64, AppError> {
        sqlx::query_scalar::<_, f64>("SELECT bitcred_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("User not found".to_string()))
    }

    async fn adjust_balance(&self, user_id: Uuid, delta: f64) -> Result<f64, AppError> {
        // Single statement: the increment happens inside the database, no read-modify-write.
        sqlx::query_scalar::<_, f64>(
            r#"
            UPDATE users
            SET bitcred_balance = bitcred_balance + $2
            WHERE id = $1
            RETURNING bitcred_balance
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to adjust balance of {}: {:?}", user_id, e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("User not found".to_string()))
    }

    async fn debit_if_sufficient(
        &self,
        user_id: Uuid,
        amount: f64,
    ) -> Result<Option<f64>, AppError> {
        let balance = sqlx::query_scalar::<_, f64>(
            r#"
            UPDATE users
            SET bitcred_balance = bitcred_balance - $2
            WHERE id = $1 AND bitcred_balance >= $2
            RETURNING bitcred_balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to debit balance of {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

        Ok(balance)
    }
}
