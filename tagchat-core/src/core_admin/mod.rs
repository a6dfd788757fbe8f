//! Channel ownership
//!
//! - `trust`: the process-wide [`TrustModel`]
//! - `resolver`: memoizing per-channel [`AdminResolver`]

pub mod resolver;
pub mod trust;

pub use resolver::{AdminConfig, AdminResolver};
pub use trust::TrustModel;
