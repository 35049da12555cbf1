use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use flowpay_api::app::{self, HttpSettings};
use flowpay_infra::config::AppConfig;
use flowpay_infra::workers::{log_commit, NotificationWorker};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowpay_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        app::build_services(&config)
            .await
            .context("failed to wire ledger services")?,
    );

    let worker = NotificationWorker::spawn(
        "commit-log",
        services.bus().clone(),
        Some(services.topic().to_string()),
        log_commit,
    )
    .context("failed to start notification worker")?;

    let router = app::build_app(Arc::clone(&services), HttpSettings::from(&config));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        storage = config.storage.label(),
        topic = %config.events_topic,
        "listening"
    );

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    server.await.context("server error")?;

    tracing::info!("shutting down");
    if tokio::time::timeout(SHUTDOWN_GRACE, services.close()).await.is_err() {
        tracing::warn!("store did not close within {}s", SHUTDOWN_GRACE.as_secs());
    }
    tokio::task::spawn_blocking(move || worker.shutdown())
        .await
        .context("notification worker panicked")?;

    tracing::info!("server exiting");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
