/*
    core_gateway - Mutation Gateway

    Guarded construction of outbound writes:
    - set_chat_name: publish a channel-name claim
    - add_member / remove_member: publish membership events
    - send_message: publish a message to the current members

    Inputs are validated against derived state (current name, member set)
    before anything reaches the store. Redundant writes are skipped, not
    reported as errors.
*/

pub mod clock;
pub mod errors;
pub mod gateway;

pub use clock::{Clock, SystemClock};
pub use errors::{GatewayError, GatewayResult};
pub use gateway::{GatewayConfig, MutationGateway, SkipReason, WriteOutcome};
