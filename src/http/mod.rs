//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → net::listener (bounded accept, HTTP/1.1 per connection)
//!     → server.rs (router: status endpoints + proxy pipeline)
//!     → pipeline.rs (request id, observe, classify, admission)
//!     → dispatch.rs (select backend, forward with deadline)
//!     → request.rs (outbound URI and headers)
//!     → response.rs (relay status, headers and body back)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod status;

pub use dispatch::{DispatchOutcome, Dispatcher, OutcomeKind};
pub use server::{AppState, HttpServer};
