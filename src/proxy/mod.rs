//! Request pipeline and upstream forwarding.
//!
//! # Data Flow
//! ```text
//! Inbound request + peer address
//!     → pipeline.rs: AdmissionController (429 on queue timeout)
//!     → pipeline.rs: CredentialVerifier (401 on bad credentials)
//!     → director.rs: rewrite URI and headers, stream to upstream (502 on failure)
//!     → upstream response relayed unmodified
//! ```
//!
//! # Design Decisions
//! - Stage order is fixed by the driver, not by how layers were stacked
//! - The admission slot lives until the response body is done
//! - No retries and no alternate upstream

pub mod director;
pub mod pipeline;

pub use director::Director;
pub use pipeline::{Pipeline, Stage};
