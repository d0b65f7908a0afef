// src/quiz/registry.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::RwLock,
    task::JoinHandle,
    time::{self, Instant},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    quiz::session::{QuizPhase, QuizSession},
};

struct Entry {
    session: Arc<QuizSession>,
    last_touched: Instant,
}

/// Live quiz sessions, keyed by session id.
///
/// Lookups are owner-checked: a session belonging to someone else is
/// reported as not found. Sessions that are never closed or acknowledged
/// are dropped by [`SessionRegistry::evict_idle`].
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<QuizSession>) {
        let entry = Entry {
            session: Arc::clone(&session),
            last_touched: Instant::now(),
        };
        self.sessions.write().await.insert(session.id(), entry);
    }

    pub async fn get(&self, session_id: Uuid, user_id: Uuid) -> Result<Arc<QuizSession>, AppError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&session_id)
            .filter(|e| e.session.user_id() == user_id)
            .ok_or(AppError::NotFound("Quiz session not found".to_string()))?;
        entry.last_touched = Instant::now();
        Ok(Arc::clone(&entry.session))
    }

    /// Removes and disposes the session.
    pub async fn remove(&self, session_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let entry = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&session_id) {
                Some(e) if e.session.user_id() == user_id => sessions.remove(&session_id),
                _ => None,
            }
        }
        .ok_or(AppError::NotFound("Quiz session not found".to_string()))?;

        entry.session.dispose().await;
        Ok(())
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Disposes sessions nobody has touched for `idle`.
    ///
    /// Only settled sessions (results shown, or already disposed) are evicted.
    /// An unattended running quiz ends through its own timer first.
    /// Returns how many sessions were removed.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<Arc<QuizSession>> = {
            let mut sessions = self.sessions.write().await;
            let mut stale = Vec::new();
            for (id, entry) in sessions.iter() {
                if now.duration_since(entry.last_touched) < idle {
                    continue;
                }
                if matches!(
                    entry.session.phase().await,
                    QuizPhase::Results | QuizPhase::Disposed
                ) {
                    stale.push(*id);
                }
            }
            stale
                .into_iter()
                .filter_map(|id| sessions.remove(&id))
                .map(|e| e.session)
                .collect()
        };

        for session in &evicted {
            session.dispose().await;
        }
        evicted.len()
    }

    /// Runs [`SessionRegistry::evict_idle`] every `every` until the handle is aborted.
    pub fn spawn_sweeper(&self, idle: Duration, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + every, every);
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle(idle).await;
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted idle quiz sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::QuizRules,
        models::quiz::QuizRow,
        quiz::session::{LoadOutcome, SubmitOutcome},
        store::{MemoryStore, Stores},
    };
    use serde_json::json;
    use sqlx::types::Json;

    const IDLE: Duration = Duration::from_secs(30 * 60);

    async fn load_session(store: &MemoryStore, minutes: i32) -> Arc<QuizSession> {
        let user = Uuid::new_v4();
        let lesson = Uuid::new_v4();
        store.set_balance(user, 0.0).await;
        store
            .insert_quiz(QuizRow {
                id: Uuid::new_v4(),
                lesson_id: lesson,
                quiz_json: Some(Json(json!({
                    "questions": [{ "question": "Q1", "options": ["a", "b"], "correct": 1 }]
                }))),
                passing_threshold: Some(80),
                timer_minutes: Some(minutes),
                created_at: None,
            })
            .await;

        match QuizSession::load(lesson, user, Stores::memory(store.clone()), QuizRules::default())
            .await
            .unwrap()
        {
            LoadOutcome::Ready(session) => session,
            LoadOutcome::Empty => panic!("expected a quiz"),
        }
    }

    async fn finish(session: &Arc<QuizSession>) {
        session.select_answer(0, 1).await.unwrap();
        assert!(matches!(
            session.submit().await.unwrap(),
            SubmitOutcome::Scored(_)
        ));
    }

    #[tokio::test]
    async fn test_lookup_is_owner_checked() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        let session = load_session(&store, 5).await;
        registry.insert(Arc::clone(&session)).await;

        assert!(registry.get(session.id(), session.user_id()).await.is_ok());
        let err = registry.get(session.id(), Uuid::new_v4()).await.err().expect("expected lookup error");
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(registry.remove(session.id(), Uuid::new_v4()).await.is_err());
        assert_eq!(registry.active_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_scored_session_is_evicted() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        let session = load_session(&store, 5).await;
        registry.insert(Arc::clone(&session)).await;
        finish(&session).await;

        time::sleep(IDLE - Duration::from_secs(1)).await;
        assert_eq!(registry.evict_idle(IDLE).await, 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(registry.evict_idle(IDLE).await, 1);
        assert_eq!(registry.active_count().await, 0);
        assert_eq!(session.phase().await, QuizPhase::Disposed);
        assert!(registry.get(session.id(), session.user_id()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_keeps_session_alive() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        let session = load_session(&store, 5).await;
        registry.insert(Arc::clone(&session)).await;
        finish(&session).await;

        time::sleep(IDLE - Duration::from_secs(60)).await;
        registry.get(session.id(), session.user_id()).await.unwrap();
        time::sleep(Duration::from_secs(120)).await;

        assert_eq!(registry.evict_idle(IDLE).await, 0);
        assert_eq!(session.phase().await, QuizPhase::Results);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_quiz_is_not_evicted() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        let session = load_session(&store, 60).await;
        registry.insert(Arc::clone(&session)).await;

        time::sleep(IDLE + Duration::from_secs(1)).await;
        assert_eq!(registry.evict_idle(IDLE).await, 0);
        assert_eq!(session.phase().await, QuizPhase::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_disposes_abandoned_sessions() {
        let store = MemoryStore::new();
        let registry = SessionRegistry::new();
        // Expires after a minute, then sits in results untouched.
        let session = load_session(&store, 1).await;
        registry.insert(Arc::clone(&session)).await;

        let sweeper = registry.spawn_sweeper(IDLE, Duration::from_secs(60));
        time::sleep(IDLE + Duration::from_secs(120)).await;

        assert_eq!(registry.active_count().await, 0);
        assert_eq!(session.phase().await, QuizPhase::Disposed);
        assert_eq!(store.attempt_count().await, 1);
        sweeper.abort();
    }
}
