//! Headless dashboard consumer.
//!
//! Connects to the bridge WebSocket, maintains the client-side parking
//! view and logs every change. Rendering is left to whatever front-end
//! sits on top; this binary is the reference consumer.

mod connection;
mod models;
mod topics;
mod view;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::connection::WsConsumer;

const DEFAULT_WS_URL: &str = "ws://localhost:8080";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let url = std::env::var("PARQ_DASHBOARD_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.into());
    info!(%url, "starting dashboard consumer");

    let consumer = WsConsumer::spawn(url);
    let mut view = consumer.view();
    let mut status = consumer.status();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let v = view.borrow_and_update().clone();
                info!(
                    occupied = v.stats.occupied_spaces,
                    available = v.stats.available_spaces,
                    rate = v.stats.occupancy_rate,
                    entries = v.stats.daily_entries,
                    updates = v.updates_applied,
                    "view updated"
                );
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let s = *status.borrow_and_update();
                info!(status = ?s, "connection status changed");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
    Ok(())
}
