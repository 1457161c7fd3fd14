//! CLI command implementations

pub mod config;
mod render;
pub mod tail;
pub mod watch;

pub use config::config;
pub use tail::tail;
pub use watch::watch;
