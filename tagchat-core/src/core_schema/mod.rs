/*
    core_schema - Shape contracts for channel objects

    Discovery returns arbitrary objects. The contracts in this module restrict
    which of them reach the reducers and decode the survivors into typed
    payloads:
    - channel-name claims
    - membership-change events
    - messages
*/

pub mod contracts;
pub mod filter;
pub mod payload;

pub use contracts::{chat_name_schema, classify, member_update_schema, message_schema, published_schema};
pub use filter::{FieldConstraint, SchemaFilter};
pub use payload::{Activity, ChatMessage, ChatName, Envelope, HasPublished, MemberUpdate, ObjectKind};
