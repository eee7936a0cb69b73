use anyhow::Context;
use pumpslip_ocr::OcrBackend;
use pumpslip_server::{build_recognizer, router, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::load()?;

    let recognizer = build_recognizer(&config.tesseract);
    if !recognizer.is_available() {
        tracing::warn!("No OCR engine compiled in; every region will fail. Rebuild with `--features tesseract`.");
    }
    let backend = recognizer.name();

    let state = AppState::new(recognizer, &config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    tracing::info!(
        bind = %config.bind,
        backend,
        split_policy = %config.pipeline.split_policy,
        max_concurrent_ocr = config.max_concurrent_ocr,
        "OCR service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
