//! Status service — the aggregation and broadcast engine.
//!
//! ## Overview
//!
//! A fetch loop polls the CI server on a fixed interval, reduces the result
//! to a single traffic-light color and publishes a summary to every watch
//! socket whenever that color changes. The latest summary is also served on
//! a pull endpoint, with the detailed project list gated behind a bearer
//! token.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐          ┌───────────────────────────────────────────────┐
//! │ Fetcher  │ ───────> │ fetch_loop.rs  (FetchLoop, TickOutcome)       │
//! │ (GitLab) │          │     │ SummaryStore::update() → color changed? │
//! └──────────┘          │     v                                         │
//!                       │ state.rs  (SummaryStore)                      │
//!                       │     │ Hub::broadcast() on transition          │
//!                       │     v                                         │
//!                       │ hub.rs  (Hub, Subscription)                   │
//!                       │     │ per-subscriber bounded queue            │
//!                       │     v                                         │
//! ┌──────────┐ WebSocket│ ws.rs   (one writer task per socket)          │
//! │ Watchers │ <─────── │                                               │
//! │          │   HTTP   │ api.rs  (GET /api, AuthGate from auth.rs)     │
//! └──────────┘ <─────── │ server.rs (Router, start_server)              │
//!                       └───────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod fetch_loop;
pub mod hub;
pub mod server;
pub mod state;
pub mod ws;
