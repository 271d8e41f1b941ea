use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::api;
use crate::config::WebConfig;
use crate::link::LinkSession;

pub struct WebServer {
    config: WebConfig,
    session: Arc<LinkSession>,
    running: Arc<AtomicBool>,
}

impl WebServer {
    pub fn new(config: WebConfig, session: Arc<LinkSession>) -> Self {
        Self {
            config,
            session,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let app = api::routes(self.session.clone())
            .layer(TraceLayer::new_for_http())
            // The lesson UI is served from a different origin
            .layer(CorsLayer::permissive());

        self.running.store(true, Ordering::SeqCst);

        let host = &self.config.host;
        let port = self.config.port;
        info!("Starting web server on http://{}:{}", host, port);

        let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port))
            .await
            .context(format!("Failed to bind to port {}", port))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.running.clone()))
            .await
            .context("Failed to serve")?;

        info!("Web server stopped");
        Ok(())
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn shutdown_signal(running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
