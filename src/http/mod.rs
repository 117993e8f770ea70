//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, mount-path routing)
//!     → request.rs (add request ID)
//!     → proxy pipeline (admission → authentication → forwarding)
//!     → Send upstream response to client
//! ```

pub mod request;
pub mod server;

pub use request::{request_id, MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
