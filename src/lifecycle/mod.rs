//! Process lifecycle.
//!
//! ```text
//! startup.rs:  exporter (optional) → components → bind listener → serve
//! signals.rs:  SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: broadcast to every subscriber → accept loop exits
//! ```
//!
//! The listener binds after every component exists, so the first accepted
//! connection already sees a fully wired pipeline.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
