//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build pipeline → Metrics → Bind listener → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop accepting → Drain requests → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: remaining requests are abandoned after the grace period
//! - The server is stopped through a oneshot; dropping the sender stops it too

pub mod signals;
pub mod startup;
