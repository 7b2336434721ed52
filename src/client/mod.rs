//! Clients of the status server.
//!
//! `StatusClient` does a single pull or opens a single watch socket.
//! `ReconnectingClient` wraps it in a Connecting → Subscribed → Backoff
//! state machine so consumers (a menu-bar icon, an LED panel, a terminal)
//! keep receiving colors across server restarts and network drops.

pub mod backoff;
pub mod reconnect;
pub mod status_client;

pub use backoff::{Backoff, BackoffConfig};
pub use reconnect::{ClientState, ReconnectingClient};
pub use status_client::{StatusClient, WatchStream};
