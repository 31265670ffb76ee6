use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizdash::{
    api,
    config::Config,
    console, questions,
    server::{self, ServerError},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
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
                .unwrap_or_else(|_| "quizdash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quiz server...");

    let config = Config::from_env().inspect_err(|e| tracing::error!("{}", e))?;

    let questions = questions::load_questions(&config.questions_path)
        .inspect_err(|e| tracing::error!("Cannot load questions: {}", e))?;

    let listener = server::bind(&config.bind_addr())
        .await
        .inspect_err(|e| tracing::error!("{}", e))?;

    let state = AppState::new(questions, config.game.clone()).into_shared();

    if let Some(port) = config.http_port {
        let addr = format!("{}:{}", config.host, port);
        let http = server::bind(&addr).await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = api::serve(http, state).await {
                tracing::error!("Status API failed: {}", e);
            }
        });
    }

    if config.console {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        tokio::spawn(console::run(stdin, Arc::clone(&state)));
    }

    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                return;
            }
            tracing::info!("Ctrl-C received");
            state.shutdown();
        });
    }

    server::serve(listener, state).await
}
