//! Subcommand implementations

pub mod config;
pub mod list;
pub mod queue;
pub mod quota;
pub mod session;
pub mod status;
pub mod sync;
