//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! TCP accept (bounded by max_connections)
//!     → listener.rs spawns one task per connection
//!     → HTTP/1.1 with a deadline on reading the request head
//!     → router from the http subsystem
//! ```
//!
//! Shutdown stops the accept loop; connections already being served run to
//! completion.

pub mod listener;
