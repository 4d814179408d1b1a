//! Relay server bridging touch controllers to a set-top box.
//!
//! Controllers hold a websocket to the relay and send key commands as JSON
//! text frames; the relay validates each command and forwards it to the
//! device's HTTP control endpoint. The router is assembled here so
//! integration tests can run the whole server in-process.

use std::time::Instant;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod cli;
pub mod config;
pub mod forward;
pub mod handlers;
pub mod registry;
pub mod target;
pub mod telemetry;
pub mod websocket;

use crate::config::ServerConfig;
use crate::forward::CommandForwarder;
use crate::registry::ControllerRegistry;
use crate::target::RokuTarget;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: ControllerRegistry,
    pub target: RokuTarget,
    pub forwarder: CommandForwarder,
    pub metrics: PrometheusHandle,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: &ServerConfig, metrics: PrometheusHandle) -> Result<Self> {
        let target = RokuTarget::new(config.roku_ip.clone());
        let forwarder =
            CommandForwarder::new(target.clone(), config.ecp_port, config.forward_timeout)
                .context("failed to build downstream http client")?;
        Ok(Self {
            registry: ControllerRegistry::new(),
            target,
            forwarder,
            metrics,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Controller websocket plus the HTTP side-channel, behind permissive CORS
/// so browser controllers can reach the relay from any origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::websocket_handler))
        .route("/health", get(handlers::health_check))
        .route("/roku-ip", post(handlers::set_roku_ip))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
