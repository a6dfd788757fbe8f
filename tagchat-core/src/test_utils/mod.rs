//! Test utilities and helpers for tagchat
//!
//! Fixtures for discovered objects, async helpers for watch channels and
//! discovery streams, and seeded shuffles for arrival-order tests.

pub mod async_helpers;
pub mod deterministic_rng;
pub mod fixtures;

pub use async_helpers::*;
pub use deterministic_rng::*;
pub use fixtures::*;
