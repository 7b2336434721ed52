//! CI status aggregation and broadcast.
//!
//! A server polls a CI system, reduces every build to one traffic-light
//! color and pushes color changes to any number of watchers. See
//! [`status`] for the server side and [`client`] for consumers.

pub mod client;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod gitlab;
pub mod logging;
pub mod status;

pub use cistatus_common::{Branch, BuildState, BuildStatus, Color, Project, Summary, classify};
