//! Watch client that survives server restarts.
//!
//! ```text
//!            connect ok
//! Connecting ──────────▶ Subscribed ──┐ frame → consumer
//!     ▲   │                  │  ◀─────┘
//!     │   │ connect error    │ error / close
//!     │   ▼                  ▼
//!     └── Backoff ◀──────────┘
//!   sleep(next_delay)
//! ```
//!
//! Every trip into `Backoff` first hands the consumer an `unknown` summary
//! so a display never keeps showing a stale color while disconnected.

use cistatus_common::Summary;
use tokio::sync::{mpsc, watch};

use super::backoff::Backoff;
use super::status_client::StatusClient;
use crate::config::ClientConfig;
use crate::errors::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Subscribed,
    Backoff,
}

pub struct ReconnectingClient {
    client: StatusClient,
    backoff: Backoff,
    state_tx: watch::Sender<ClientState>,
}

impl ReconnectingClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::with_client(
            StatusClient::new(config)?,
            Backoff::new(config.backoff.clone()),
        ))
    }

    pub fn with_client(client: StatusClient, backoff: Backoff) -> Self {
        let (state_tx, _) = watch::channel(ClientState::Connecting);
        Self {
            client,
            backoff,
            state_tx,
        }
    }

    pub fn state(&self) -> ClientState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state_tx.subscribe()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn set_state(&self, state: ClientState) {
        self.state_tx.send_replace(state);
    }

    /// Deliver summaries to `consumer` forever, reconnecting with backoff.
    ///
    /// Returns only when the consumer is dropped, the host is missing, or the
    /// backoff's elapsed-time budget runs out.
    pub async fn run(&mut self, consumer: mpsc::Sender<Summary>) -> Result<(), ClientError> {
        // Configuration problems will not fix themselves by retrying.
        self.client.watch_url()?;

        loop {
            self.set_state(ClientState::Connecting);

            let last_error = match self.client.connect().await {
                Ok(mut stream) => {
                    self.set_state(ClientState::Subscribed);
                    self.backoff.reset();
                    tracing::info!("subscribed to status server");

                    loop {
                        match stream.next_summary().await {
                            Ok(summary) => {
                                if consumer.send(summary).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => break e,
                        }
                    }
                }
                Err(e) => e,
            };

            self.set_state(ClientState::Backoff);
            if consumer.send(Summary::unknown()).await.is_err() {
                return Ok(());
            }

            match self.backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        error = %last_error,
                        retry_in = ?delay,
                        "watch connection lost, reconnecting"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = consumer.closed() => return Ok(()),
                    }
                }
                None => {
                    return Err(ClientError::RetriesExhausted {
                        elapsed: self.backoff.elapsed(),
                        last_error: last_error.to_string(),
                    });
                }
            }
        }
    }
}
