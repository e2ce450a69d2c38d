use anyhow::Result;
use ember_notifications::{
    EngineContext, EngineEvent, NotificationEngine, Severity, ShowOptions,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Small driver exercising the engine against the headless surface.
/// `RUST_LOG=debug cargo run` shows the internal decision points.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = NotificationEngine::new(EngineContext::headless());
    engine.init().await?;

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!("event: {event:?}");
        }
    });

    engine.success("Patient record saved", ShowOptions::default());
    engine.warning(
        "Connection unstable, retrying",
        ShowOptions {
            title: Some("Network".to_string()),
            ..Default::default()
        },
    );
    let persistent = engine.show(
        Severity::Error,
        "Sync failed, changes kept locally",
        ShowOptions {
            duration_ms: Some(0),
            ..Default::default()
        },
    );

    tokio::time::sleep(Duration::from_secs(6)).await;
    engine.remove(&persistent);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let stats = engine.stats();
    tracing::info!(
        "done: {} rendered frames, {} history entries, storage on {:?}",
        stats.render_count,
        stats.history_entries,
        stats.storage_tier
    );
    engine.destroy();
    Ok(())
}
