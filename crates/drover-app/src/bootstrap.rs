use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use drover_api::StatusServer;
use drover_config::{ConfigArgs, DroverConfig, LogFormatSetting};
use drover_core::TransferEngine;
use drover_engine::{EngineConfig, LocalEngine};
use drover_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use drover_watch::DirWatcher;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::controller::SessionController;
use crate::error::{AppError, AppResult};

/// Upper bound on waiting for fetch triggers once the engine has shut down.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Entry point for the drover boot sequence: parse flags, install logging, then run until an
/// interrupt or terminate signal arrives.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed, or any service
/// fails to start or stops unexpectedly.
pub async fn run_app() -> AppResult<()> {
    let config = ConfigArgs::parse()
        .into_config()
        .map_err(|source| AppError::Config { source })?;
    let format = match config.log_format {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    init_logging(&LoggingConfig {
        level: &config.log_level,
        format,
        build_sha: option_env!("DROVER_BUILD_SHA").unwrap_or("dev"),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("watch");
    match serde_json::to_string(&config) {
        Ok(rendered) => info!(config = %rendered, "drover starting"),
        Err(err) => warn!(error = %err, "drover starting; configuration not serializable"),
    }
    run_services(config, shutdown_signal()).await
}

/// Start the engine, watcher, status surface, and controller; run until `shutdown` resolves.
///
/// Teardown order: stop the watcher and the status surface, terminate every engine session,
/// then drain the fetch triggers those terminations resolved.
///
/// # Errors
///
/// Returns an error if a service cannot start or the descriptor stream fails.
pub async fn run_services<F>(config: DroverConfig, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()>,
{
    let telemetry =
        Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let engine = Arc::new(
        LocalEngine::new(EngineConfig {
            download_dir: config.download_dir.clone(),
            disable_trackers: config.disable_trackers,
            readahead_bytes: config.readahead_bytes,
        })
        .map_err(|err| AppError::engine("engine.new", err))?,
    );
    let (registration, events) = DirWatcher::spawn(&config.metainfo_dir, config.poll_interval)
        .map_err(|err| AppError::watch("watch.spawn", err))?;
    let listener = StatusServer::bind(config.listen_addr)
        .await
        .map_err(|err| AppError::api_server("api.bind", err))?;

    let shared: Arc<dyn TransferEngine> = engine.clone();
    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(StatusServer::new(Arc::clone(&shared), telemetry.clone()).serve(
        listener,
        async move {
            let _ = server_stopped.await;
        },
    ));

    let mut controller = SessionController::new(shared, telemetry);
    let result = controller.run(events, shutdown).await;
    if let Err(err) = &result {
        warn!(error = %err, "session controller stopped");
    }

    drop(registration);
    let _ = stop_server.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "status surface stopped with an error"),
        Err(err) => warn!(error = %err, "status surface task failed"),
    }
    let released = engine.shutdown().await;
    let drained = controller.wait_for_tasks(TASK_DRAIN_TIMEOUT).await;
    info!(sessions = released, triggers = drained, "drover stopped");
    result
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for terminate");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("interrupt received"),
        () = terminate => info!("terminate received"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::Path;

    use drover_test_support::fixtures::MetainfoFixture;

    fn config(metainfo_dir: &Path, download_dir: &Path) -> DroverConfig {
        DroverConfig {
            metainfo_dir: metainfo_dir.to_path_buf(),
            download_dir: download_dir.to_path_buf(),
            disable_trackers: true,
            readahead_bytes: 4096,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            poll_interval: Duration::from_millis(20),
            log_level: "info".to_string(),
            log_format: None,
        }
    }

    #[tokio::test]
    async fn missing_metainfo_dir_fails_with_exit_code_one() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = config(&temp.path().join("absent"), &temp.path().join("data"));
        let err = run_services(config, std::future::pending())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected watcher failure"))?;
        assert!(matches!(err, AppError::Watch { operation: "watch.spawn", .. }));
        assert_eq!(err.exit_code(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unusable_download_dir_fails_with_exit_code_one() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, b"x")?;
        let config = config(temp.path(), &blocker.join("data"));
        let err = run_services(config, std::future::pending())
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected engine failure"))?;
        assert!(matches!(err, AppError::Engine { operation: "engine.new", .. }));
        assert_eq!(err.exit_code(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_signal_stops_cleanly() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let watch = temp.path().join("watch");
        std::fs::create_dir(&watch)?;
        MetainfoFixture::single("item.bin", vec![3_u8; 40]).write_descriptor(&watch, "item.torrent")?;
        let config = config(&watch, &temp.path().join("data"));
        run_services(config, tokio::time::sleep(Duration::from_millis(200))).await?;
        Ok(())
    }

    #[tokio::test]
    async fn vanished_watch_dir_is_fatal() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let watch = temp.path().join("watch");
        std::fs::create_dir(&watch)?;
        let config = config(&watch, &temp.path().join("data"));
        let remover = {
            let watch = watch.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = std::fs::remove_dir(&watch);
                std::future::pending::<()>().await;
            }
        };
        let result = tokio::time::timeout(Duration::from_secs(5), run_services(config, remover)).await?;
        assert!(matches!(result, Err(AppError::Watch { operation: "watch.stream", .. })));
        Ok(())
    }
}
