//! Screen casting server
//!
//! Serves the viewer page and the negotiation endpoint, and mirrors the
//! primary display with system audio to every connected viewer.

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screencaster::audio::device::list_devices;
use screencaster::config::AppConfig;
use screencaster::session::ConnectionManager;
use screencaster::web;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting screencaster");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "could not load config file, using defaults");
            AppConfig::default()
        }
    };

    // List available devices
    println!("\n=== Available Audio Inputs ===");
    for device in list_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        let loopback_marker = if device.loopback_candidate { " [LOOPBACK]" } else { "" };
        println!("  {}{}{}", device.name, default_marker, loopback_marker);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();

    let manager = Arc::new(ConnectionManager::new(config.clone()));

    tracing::info!(
        "Viewer page at http://{}:{}/",
        config.server.bind_address,
        config.server.http_port
    );

    tokio::select! {
        served = web::serve(&config.server, manager.clone()) => {
            served?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down, closing active sessions");
            manager.shutdown().await;
        }
    }

    Ok(())
}
