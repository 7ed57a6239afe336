//! `LexSync` gateway -- realtime change-event fan-out and calendar proxy.
//!
//! An axum server exposing the `/realtime` WebSocket (change-notification
//! fan-out between producers and engine clients) and the `/calendar/events`
//! JSON REST proxy to the external calendar provider.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin lexsync-gateway
//!
//! # Run on custom address with calendar credentials
//! CALENDAR_API_KEY=... CALENDAR_ID=estudio@example.com \
//!     cargo run --bin lexsync-gateway -- --bind 127.0.0.1:9100
//! ```

use std::sync::Arc;

use clap::Parser;
use lexsync_gateway::calendar::RestCalendar;
use lexsync_gateway::config::{GatewayCliArgs, GatewayConfig};
use lexsync_gateway::server::{self, GatewayState};

#[tokio::main]
async fn main() {
    let cli = GatewayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match GatewayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level; keep the appender
    // guard alive for the process lifetime when logging to a file.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    let _guard = match &config.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let file = path.file_name().map_or("lexsync-gateway.log".as_ref(), |f| f);
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            None
        }
    };

    let calendar = config
        .calendar_credentials()
        .map(|(key, id)| RestCalendar::new(&config.calendar_base_url, key, id));
    if calendar.is_none() {
        tracing::warn!(
            "calendar credentials not configured, calendar routes will answer with errors"
        );
    }
    let state = Arc::new(GatewayState::new(calendar));

    tracing::info!(addr = %config.bind_addr, "starting lexsync gateway");
    match server::start_server(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "gateway listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "gateway server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start gateway");
            std::process::exit(1);
        }
    }
}
