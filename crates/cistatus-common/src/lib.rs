//! Shared domain types for cistatus.
//!
//! Both the status server and the watch clients speak in terms of these
//! types: the server builds a [`Summary`] from fetched [`Project`]s and the
//! clients decode the same [`Summary`] from the wire.

pub mod color;
pub mod model;

pub use color::classify;
pub use model::{Branch, BuildState, BuildStatus, Color, Project, Summary};
