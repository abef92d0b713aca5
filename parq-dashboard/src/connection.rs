//! Resilient WebSocket consumer.
//!
//! Owns the socket lifecycle on a single task: connect, feed every text
//! frame into the view, and on loss retry with exponential backoff
//! (1 s doubling, capped at 30 s, at most 10 automatic attempts). A
//! manual reconnect command resets the attempt counter, cancels any
//! pending retry timer and reconnects after a short settle delay.

use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::models::Envelope;
use crate::view::DashboardView;

/// Automatic retries after a lost or failed connection.
pub const MAX_ATTEMPTS: u32 = 10;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(30);
/// Grace period before a manually requested reconnect.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("consumer task is gone")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// All automatic attempts exhausted; only a manual reconnect resumes.
    GaveUp,
}

#[derive(Debug)]
enum Command {
    Reconnect,
}

/// Delay before retry number `attempt` (zero-based): 1 s doubling,
/// capped at 30 s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64 << attempt.min(5);
    BASE_DELAY
        .saturating_mul(secs as u32)
        .min(MAX_DELAY)
}

/// Whether another automatic attempt may be scheduled.
pub fn should_retry(attempts_made: u32) -> bool {
    attempts_made < MAX_ATTEMPTS
}

/// Handle over the consumer task. Dropping it stops the task (the
/// command channel closes and the loop winds down).
pub struct WsConsumer {
    view: watch::Receiver<DashboardView>,
    status: watch::Receiver<ConnectionStatus>,
    commands: mpsc::Sender<Command>,
}

impl WsConsumer {
    pub fn spawn(url: String) -> Self {
        let (view_tx, view_rx) = watch::channel(DashboardView::default());
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);

        tokio::spawn(run(url, view_tx, status_tx, cmd_rx));

        Self {
            view: view_rx,
            status: status_rx,
            commands: cmd_tx,
        }
    }

    pub fn view(&self) -> watch::Receiver<DashboardView> {
        self.view.clone()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Requests an immediate reconnect, resetting the attempt budget.
    pub fn reconnect(&self) -> Result<(), ConsumerError> {
        self.commands
            .try_send(Command::Reconnect)
            .map_err(|_| ConsumerError::Closed)
    }
}

enum SocketExit {
    /// Transport closed or errored; schedule an automatic retry.
    Lost,
    /// Manual reconnect requested while connected.
    Manual,
    /// Handle dropped; stop the task.
    Shutdown,
}

async fn run(
    url: String,
    view_tx: watch::Sender<DashboardView>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut attempts: u32 = 0;

    loop {
        status_tx.send_replace(ConnectionStatus::Connecting);
        match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                info!(%url, "connected");
                attempts = 0;
                status_tx.send_replace(ConnectionStatus::Connected);

                match drive_socket(socket, &view_tx, &mut commands).await {
                    SocketExit::Lost => {
                        warn!("connection lost");
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                    }
                    SocketExit::Manual => {
                        info!("manual reconnect requested");
                        status_tx.send_replace(ConnectionStatus::Disconnected);
                        attempts = 0;
                        tokio::time::sleep(SETTLE_DELAY).await;
                        continue;
                    }
                    SocketExit::Shutdown => return,
                }
            }
            Err(e) => {
                warn!(%url, error = %e, "connect failed");
                status_tx.send_replace(ConnectionStatus::Disconnected);
            }
        }

        if !should_retry(attempts) {
            warn!(attempts, "giving up on automatic reconnects");
            status_tx.send_replace(ConnectionStatus::GaveUp);
            // only a manual command gets us out of here
            match commands.recv().await {
                Some(Command::Reconnect) => {
                    info!("manual reconnect after giving up");
                    attempts = 0;
                    tokio::time::sleep(SETTLE_DELAY).await;
                    continue;
                }
                None => return,
            }
        }

        let delay = backoff_delay(attempts);
        attempts += 1;
        info!(attempt = attempts, ?delay, "scheduling reconnect");

        // a manual command cancels the pending retry timer
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            cmd = commands.recv() => match cmd {
                Some(Command::Reconnect) => {
                    info!("manual reconnect, pending retry cancelled");
                    attempts = 0;
                    tokio::time::sleep(SETTLE_DELAY).await;
                }
                None => return,
            }
        }
    }
}

async fn drive_socket<S>(
    mut socket: S,
    view_tx: &watch::Sender<DashboardView>,
    commands: &mut mpsc::Receiver<Command>,
) -> SocketExit
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Envelope>(&text) {
                        Ok(env) => {
                            view_tx.send_modify(|view| {
                                view.apply_envelope(&env);
                            });
                        }
                        Err(e) => debug!(error = %e, "frame is not an envelope, skipped"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SocketExit::Lost,
                Some(Ok(_)) => {} // ping/pong/binary, nothing to do
                Some(Err(e)) => {
                    warn!(error = %e, "socket error");
                    return SocketExit::Lost;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Reconnect) => return SocketExit::Manual,
                None => return SocketExit::Shutdown,
            }
        }
    }
}
