//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admission.rs (bounded concurrency, queue with timeout)
//!     → credentials.rs (shared secret, constant-time comparison)
//!     → headers.rs (strip credentials, add X-Forwarded-*)
//!     → Forward to upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Gateway credentials never reach the upstream

pub mod admission;
pub mod credentials;
pub mod headers;

pub use admission::{AdmissionController, AdmissionSlot};
pub use credentials::CredentialVerifier;
