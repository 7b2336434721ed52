//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `serve`   | `Serve`          |
//! | `watch`   | `Watch`, `Summary` |

pub mod serve;
pub mod watch;

pub use serve::cmd_serve;
pub use watch::{cmd_summary, cmd_watch};
