use std::sync::Arc;

use anyhow::{Context, Result};

use skybridge::config::CONFIG;
use skybridge::link::{LinkSession, TelemetryPoller};
use skybridge::util::setup_logging;
use skybridge::web::WebServer;

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(&CONFIG.log_level);
    info!("skybridge {} starting...", env!("CARGO_PKG_VERSION"));

    // The one link session for this process, shared by every service
    let session = Arc::new(
        LinkSession::connect(&CONFIG.link)
            .await
            .with_context(|| format!("Failed to bind link socket on {}", CONFIG.link.listen_addr))?,
    );

    // Create a shutdown signal channel
    let (shutdown_tx, _) = broadcast::channel(1);

    let poller_handle = spawn_telemetry_poller(session.clone(), shutdown_tx.subscribe()).await;
    let web_handle = spawn_web_server(session.clone(), shutdown_tx.subscribe()).await;

    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping services...");
                if shutdown_tx.send(()).is_err() {
                    error!("No service was listening for the shutdown signal");
                }
            }
            Err(err) => {
                error!("Failed to listen for shutdown signal: {}", err);
            }
        }
    };

    let results = tokio::join!(poller_handle, web_handle, shutdown_signal);

    for (result, name) in [results.0, results.1]
        .into_iter()
        .zip(["Telemetry poller", "Web server"])
    {
        if let Err(e) = result {
            error!("{} join error: {}", name, e);
        }
    }

    info!("All services stopped, shutting down");

    Ok(())
}

async fn spawn_telemetry_poller(
    session: Arc<LinkSession>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let poller = TelemetryPoller::new(session);
    tokio::spawn(async move {
        tokio::select! {
            result = poller.start() => {
                if let Err(e) = result {
                    error!("Telemetry poller error: {}", e);
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down telemetry poller...");
                poller.stop().await;
            }
        }
    })
}

async fn spawn_web_server(
    session: Arc<LinkSession>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let server = WebServer::new(CONFIG.web.clone(), session);
    tokio::spawn(async move {
        tokio::select! {
            result = server.start() => {
                if let Err(e) = result {
                    error!("Web server error: {}", e);
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down web server...");
                server.stop().await;
            }
        }
    })
}
