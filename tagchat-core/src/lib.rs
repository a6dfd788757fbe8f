//! tagchat - derived-state engine for a tag-addressed group chat
//!
//! Channel state (owner, members, display name, message history) is
//! reconstructed purely from objects discovered in a schema-queryable,
//! access-controlled object store.

pub mod config;
pub mod core_admin;
pub mod core_channel;
pub mod core_client;
pub mod core_gateway;
pub mod core_membership;
pub mod core_schema;
pub mod core_store;
pub mod core_timeline;
pub mod logging;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_admin::{AdminResolver, TrustModel};
pub use core_channel::{ChannelRegistry, ChannelSnapshot};
pub use core_client::ChatClient;
pub use core_gateway::{GatewayError, MutationGateway, WriteOutcome};
pub use core_store::{MemoryStore, ObjectStore, Session, StoredObject};
pub use logging::{init_logging, LogConfig, LogLevel, LoggingError};

/// Install logging from `config` and register metric descriptions
pub fn init(config: &Config) -> Result<(), LoggingError> {
    logging::init_logging_with_config(LogConfig::try_from(&config.logging)?)?;
    metrics::init_metrics();
    Ok(())
}
