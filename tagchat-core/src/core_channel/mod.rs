//! Per-channel derived state
//!
//! - `state`: reducers for one channel combined into a [`ChannelSnapshot`]
//! - `registry`: lazily started background observers publishing snapshots

pub mod registry;
pub mod state;

pub use registry::ChannelRegistry;
pub use state::{current_name, ChannelConfig, ChannelSnapshot, ChannelState};
