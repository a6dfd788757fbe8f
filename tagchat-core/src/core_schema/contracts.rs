//! Schema contracts for channel objects
//!
//! Each contract is a pure builder returning an immutable [`SchemaFilter`].
//! Channel-scoped contracts pin the field that names the channel to a single
//! literal so objects describing a different channel never match.

use super::filter::{FieldConstraint, SchemaFilter};
use super::payload::{ChatMessage, ChatName, Envelope, MemberUpdate, ObjectKind};
use crate::core_store::StoredObject;
use tracing::debug;

/// Contract for channel-name claims describing `channel`
pub fn chat_name_schema(channel: &str) -> SchemaFilter {
    debug_assert!(!channel.is_empty(), "chat name schema needs a channel");
    SchemaFilter::new("chat_name")
        .require("describes", FieldConstraint::one_of([channel]))
        .require("name", FieldConstraint::String)
        .require("published", FieldConstraint::Integer)
}

/// Contract for Add/Remove events targeting `channel`
pub fn member_update_schema(channel: &str) -> SchemaFilter {
    debug_assert!(!channel.is_empty(), "member update schema needs a channel");
    SchemaFilter::new("member_update")
        .require("activity", FieldConstraint::one_of(["Add", "Remove"]))
        .require("target", FieldConstraint::String)
        .require("object", FieldConstraint::one_of([channel]))
        .require("published", FieldConstraint::Integer)
}

/// Contract for chat messages; channel scoping comes from the discovery tags
pub fn message_schema() -> SchemaFilter {
    SchemaFilter::new("message")
        .require("content", FieldConstraint::String)
        .require("published", FieldConstraint::Integer)
        .optional("to", FieldConstraint::StringArray)
}

/// Any object carrying a publish timestamp
pub fn published_schema() -> SchemaFilter {
    SchemaFilter::new("published").require("published", FieldConstraint::Integer)
}

/// Sort a discovered object into one of the channel object kinds
///
/// Returns `None` for objects that match no contract or whose payload fails
/// to decode; such objects are ignored by every reducer.
pub fn classify(object: &StoredObject, channel: &str) -> Option<ObjectKind> {
    let decoded = if chat_name_schema(channel).matches(object) {
        Envelope::<ChatName>::decode(object).map(ObjectKind::ChatName)
    } else if member_update_schema(channel).matches(object) {
        Envelope::<MemberUpdate>::decode(object).map(ObjectKind::MemberUpdate)
    } else if message_schema().matches(object) {
        Envelope::<ChatMessage>::decode(object).map(ObjectKind::Message)
    } else {
        return None;
    };

    match decoded {
        Ok(kind) => Some(kind),
        Err(e) => {
            debug!(url = %object.url, channel = %channel, error = %e, "Dropping undecodable object");
            None
        }
    }
}
