// src/main.rs

use std::time::Duration;

use quizledger::config::Config;
use quizledger::routes;
use quizledger::state::AppState;
use quizledger::store::{MemoryStore, PgStore, Stores};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let stores = match &config.database_url {
        Some(database_url) => Stores::postgres(PgStore::new(connect(database_url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is not persisted)");
            Stores::memory(MemoryStore::new())
        }
    };

    let state = AppState::new(stores, config.clone());
    let _sweeper = state.sessions.spawn_sweeper(
        Duration::from_secs(config.session_idle_minutes * 60),
        Duration::from_secs(60),
    );
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects with retry, then applies migrations.
async fn connect(database_url: &str) -> Result<sqlx::PgPool, Box<dyn std::error::Error>> {
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(format!("Failed to connect to database after 5 retries: {}", e).into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    Ok(pool)
}
