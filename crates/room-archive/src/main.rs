mod avatars;
mod config;
mod export;
mod source;

use anyhow::{Context, bail};
use archive_core::{ArchiveError, Pipeline, RoomLayout};
use archive_db::Database;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::source::DumpSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_archive=info,archive_core=info,archive_db=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let rooms: Vec<DumpSource> = DumpSource::discover(&config.dump_dir)
        .await?
        .into_iter()
        .filter(|room| config.rooms.matches(room.room_id()))
        .collect();
    if rooms.is_empty() {
        bail!("No room in {} matches the selection", config.dump_dir.display());
    }

    let mut failed = 0;
    for room in &rooms {
        if cancel.is_cancelled() {
            bail!("Interrupted before {}", room.room_id());
        }
        info!("Selected room: {}", room.room_id());
        if let Err(e) = archive_room(&config, room, &cancel).await {
            if let Some(ArchiveError::Interrupted { .. }) = e.downcast_ref::<ArchiveError>() {
                warn!("{}: interrupted, queued rows were flushed", room.room_id());
                return Err(e);
            }
            error!("{}: archive run failed: {:#}", room.room_id(), e);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} room(s) failed", failed, rooms.len());
    }
    Ok(())
}

/// One complete pass over one room, with its own layout, store and pipeline.
async fn archive_room(
    config: &Config,
    room: &DumpSource,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let dump = room.load().await?;
    let fetcher = room.fetcher();

    let layout = RoomLayout::prepare(&config.output_dir, room.room_id())?;
    let db = Database::open(&layout.db_path()).context("opening room store")?;

    let result = Pipeline::new(&db, &layout, config.pipeline_options())
        .cancel_on(cancel.clone())
        .run(dump.events, &fetcher)
        .await;

    if let Err(e) = layout.teardown() {
        warn!("Could not clean up temp directory: {}", e);
    }
    let report = result?;

    export::write_processed(&layout.export_path(), &report.processed).await?;
    if !config.no_media {
        avatars::save_current_avatars(&layout.current_avatars_dir(), &dump.members, &fetcher)
            .await?;
    }

    info!(
        "{}: {} inserted, {} updated, {} unchanged, {} failed ({} messages, {} media files stored)",
        room.room_id(),
        report.inserted,
        report.updated,
        report.skipped,
        report.failed,
        db.message_count()?,
        db.media_count()?
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, stopping..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, stopping..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, stopping...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, stopping...");
    }
}
