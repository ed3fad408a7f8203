use anyhow::Result;
use certificate_analyzer::{
    app,
    config::AppConfig,
    db,
    services::ocr_client::{HttpOcrTransport, OcrClient},
    state::AppState,
};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting certificate-analyzer with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    tracing::debug!("Connecting to {}", cfg.database_url);
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    let applied = db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete ({} statements).", applied);
        return Ok(());
    }

    // --- Wire the analysis pipeline ---
    let transport = HttpOcrTransport::new(&cfg.ocr)?;
    let ocr = OcrClient::new(Arc::new(transport), cfg.ocr.poll);
    let (state, dispatcher) = AppState::new(db, &cfg.storage_dir, ocr, cfg.watch_prefix.clone());
    tracing::info!(
        watch_prefix = %cfg.watch_prefix,
        max_attempts = cfg.ocr.poll.max_attempts,
        interval_ms = cfg.ocr.poll.interval.as_millis() as u64,
        "Analysis pipeline ready"
    );

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Router and its state are gone; let queued analyses finish.
    dispatcher.await?;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
