//! Authenticating reverse proxy for a single upstream HTTP service.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                 AUTHENTICATION PROXY                  │
//!                        │                                                       │
//!   Client Request       │  ┌─────────┐   ┌───────────┐   ┌──────────────┐       │
//!   ─────────────────────┼─▶│  http   │──▶│ admission │──▶│ credentials  │       │
//!                        │  │ server  │   │  (429)    │   │    (401)     │       │
//!                        │  └─────────┘   └───────────┘   └──────┬───────┘       │
//!                        │                                       │               │
//!                        │                                       ▼               │
//!   Client Response      │                               ┌──────────────┐        │
//!   ◀────────────────────┼───────────────────────────────│   director   │◀───────┼──── Upstream
//!                        │          streamed verbatim    │    (502)     │        │
//!                        │                               └──────────────┘        │
//!                        │                                                       │
//!                        │  config · observability · lifecycle                   │
//!                        └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use proxy::Pipeline;
