//! Middleware for `axum::Router` and HTTP request processing.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::Router;
//! use konvert_server::middleware::{
//!     RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt,
//! };
//!
//! let app: Router = Router::new()
//!     .with_default_recovery()
//!     .with_observability()
//!     .with_default_security();
//! ```

mod observability;
mod recovery;
mod security;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{CorsConfig, RouterSecurityExt};
