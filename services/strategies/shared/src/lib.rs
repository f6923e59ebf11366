//! Shared Strategy Framework
//!
//! Lifecycle trait, configuration validation and metrics used by every
//! strategy service.

pub mod metrics;
pub mod traits;

pub use metrics::*;
pub use traits::*;
