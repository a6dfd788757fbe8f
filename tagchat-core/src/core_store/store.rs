//! Object store capability
//!
//! The object store and its discovery transport live outside this crate.
//! Everything here depends only on the two operations below.

use super::errors::StoreResult;
use super::object::{ObjectDraft, Session, StoredObject};
use crate::core_schema::SchemaFilter;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Possibly infinite sequence of discovery results
///
/// Items are independent: an `Err` describes one object that could not be
/// delivered and never ends the stream.
pub type DiscoveryStream = Pin<Box<dyn Stream<Item = StoreResult<StoredObject>> + Send>>;

/// Schema-queryable, access-controlled object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Discover objects tagged with any of `channels` that match `filter` and
    /// are visible to `session`
    fn discover(&self, channels: &[String], filter: &SchemaFilter, session: &Session) -> DiscoveryStream;

    /// Publish a draft as `session`
    ///
    /// A successful return means the object is discoverable by permitted
    /// readers from now on.
    async fn put(&self, draft: ObjectDraft, session: &Session) -> StoreResult<StoredObject>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn discover(&self, channels: &[String], filter: &SchemaFilter, session: &Session) -> DiscoveryStream {
        (**self).discover(channels, filter, session)
    }

    async fn put(&self, draft: ObjectDraft, session: &Session) -> StoreResult<StoredObject> {
        (**self).put(draft, session).await
    }
}
