// tests/common/mod.rs

#![allow(dead_code)]

use quizledger::{
    config::{Config, QuizRules},
    models::quiz::QuizRow,
    routes,
    state::AppState,
    store::{MemoryStore, Stores},
    utils::jwt::sign_jwt,
};
use serde_json::json;
use sqlx::types::Json;
use uuid::Uuid;

pub const SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port, backed by `store`.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app(store: MemoryStore) -> String {
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        session_idle_minutes: 30,
        rules: QuizRules::default(),
    };

    let state = AppState::new(Stores::memory(store), config);
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

pub fn token_for(user_id: Uuid) -> String {
    sign_jwt(user_id, SECRET, 600).expect("Failed to sign token")
}

/// Four questions with answer keys [1, 0, 2, 3]; two of them use the legacy schema.
pub async fn seed_quiz(store: &MemoryStore, lesson_id: Uuid) -> Uuid {
    let row = QuizRow {
        id: Uuid::new_v4(),
        lesson_id,
        quiz_json: Some(Json(json!({
            "questions": [
                { "question": "Q1", "options": ["a", "b", "c", "d"], "correct": 1 },
                { "question": "Q2", "answers": ["a", "b", "c", "d"], "correctAnswer": 0 },
                { "question": "Q3", "options": ["a", "b", "c", "d"], "correct": 2, "tip": "Reread section 3" },
                { "answers": ["a", "b", "c", "d"], "correctAnswer": 3, "hint": "Reread section 4" }
            ]
        }))),
        passing_threshold: Some(80),
        timer_minutes: Some(5),
        created_at: Some(chrono::Utc::now()),
    };
    let id = row.id;
    store.insert_quiz(row).await;
    id
}
