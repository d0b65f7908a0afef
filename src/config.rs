// src/config.rs

use std::env;

use dotenvy::dotenv;

/// Credits granted for a passing attempt.
pub const PASS_REWARD: f64 = 0.5;
/// Credits charged for a retake after a failing attempt.
pub const RETAKE_COST: f64 = 2.0;
pub const DEFAULT_PASSING_THRESHOLD: i32 = 80;
pub const DEFAULT_TIMER_MINUTES: i32 = 5;
/// Longest accepted quiz timer (one day).
pub const MAX_TIMER_MINUTES: i32 = 24 * 60;
pub const FALLBACK_TIP: &str = "Review this topic again";
/// Minutes a settled session may sit untouched before it is evicted.
pub const DEFAULT_SESSION_IDLE_MINUTES: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub session_idle_minutes: u64,
    pub rules: QuizRules,
}

/// Economy and defaulting rules applied by the quiz engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizRules {
    pub pass_reward: f64,
    pub retake_cost: f64,
    pub default_passing_threshold: i32,
    pub default_timer_minutes: i32,
    pub fallback_tip: String,
}

impl Default for QuizRules {
    fn default() -> Self {
        Self {
            pass_reward: PASS_REWARD,
            retake_cost: RETAKE_COST,
            default_passing_threshold: DEFAULT_PASSING_THRESHOLD,
            default_timer_minutes: DEFAULT_TIMER_MINUTES,
            fallback_tip: FALLBACK_TIP.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let session_idle_minutes = match env::var("SESSION_IDLE_MINUTES") {
            Ok(raw) => raw.parse::<u64>().ok().filter(|m| *m > 0).unwrap_or_else(|| {
                tracing::warn!("Ignoring invalid SESSION_IDLE_MINUTES={:?}, using default", raw);
                DEFAULT_SESSION_IDLE_MINUTES
            }),
            Err(_) => DEFAULT_SESSION_IDLE_MINUTES,
        };

        let mut rules = QuizRules::default();
        if let Some(reward) = env_f64("PASS_REWARD") {
            rules.pass_reward = reward;
        }
        if let Some(cost) = env_f64("RETAKE_COST") {
            rules.retake_cost = cost;
        }

        Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            session_idle_minutes,
            rules,
        }
    }
}

fn env_f64(key: &str) -> Option<f64> {
    let raw = env::var(key).ok()?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}
