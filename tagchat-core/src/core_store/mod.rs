/*
    core_store - Boundary to the external object store

    The object store and its discovery transport are external collaborators.
    This module defines:
    - the object model (StoredObject, ObjectDraft, Session)
    - the ObjectStore capability trait
    - an in-memory implementation used by tests and local runs
*/

pub mod errors;
pub mod memory_store;
pub mod object;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use memory_store::{DiscoveryConfig, DiscoveryMode, MemoryStore};
pub use object::{Actor, ObjectDraft, Session, StoredObject};
pub use store::{DiscoveryStream, ObjectStore};
