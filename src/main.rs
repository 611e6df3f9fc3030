use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feuddash::{
    broadcast,
    config::ServerConfig,
    questions::{InMemoryQuestionStore, QuestionStore},
    state::AppState,
    types::FAST_MONEY_QUESTIONS,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feuddash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FeudDash...");

    let config = ServerConfig::from_env();

    let loaded = match &config.questions_path {
        Some(path) => InMemoryQuestionStore::from_json_file(path),
        None => InMemoryQuestionStore::seeded(),
    };
    let store = match loaded {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to load question bank: {}", e);
            std::process::exit(1);
        }
    };
    let questions: Arc<dyn QuestionStore> = Arc::new(store);

    match (questions.count(false).await, questions.count(true).await) {
        (Ok(main_pool), Ok(fast_money_pool)) => {
            tracing::info!(
                "Question bank ready: {} round questions, {} fast money",
                main_pool,
                fast_money_pool
            );
            if fast_money_pool < FAST_MONEY_QUESTIONS {
                tracing::warn!(
                    "Fast money needs {} questions, bank has {}",
                    FAST_MONEY_QUESTIONS,
                    fast_money_pool
                );
            }
        }
        (Err(e), _) | (_, Err(e)) => tracing::warn!("Could not count questions: {}", e),
    }

    let state =
        Arc::new(AppState::new(questions).with_question_timeout(config.question_timeout));

    // Spawn background task for deleting abandoned sessions
    broadcast::spawn_idle_sweeper(state.clone(), config.idle_timeout, config.sweep_interval);

    let app = feuddash::app(state);

    tracing::info!("Listening on http://{}", config.addr);
    let listener = match tokio::net::TcpListener::bind(config.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
