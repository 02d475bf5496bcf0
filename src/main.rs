// Web-based sandwich symmetry evaluator backed by Google Gemini.

use std::sync::Arc;

use anyhow::Context;
use sandwich_symmetry::{
    config::Config,
    gemini::GeminiClient,
    server::{router, AppState},
    symmetry::SymmetryScorer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let client = GeminiClient::new(&config.gemini).context("failed to build Gemini client")?;
    tracing::info!("🤖 Using model {}", config.gemini.model);

    let state = Arc::new(AppState {
        model: Arc::new(client),
        scorer: SymmetryScorer::default(),
        comment_retry: config.comment_retry,
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", config.bind_addr);
    tracing::info!("🥪 Open in your browser to start judging sandwiches!");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
