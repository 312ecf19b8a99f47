//! Events emitted by the channel client.
//!
//! These represent the connection lifecycle plus the decoded inbound
//! traffic, delivered in arrival order to a single consumer.

use lumen_core::messages::InboundEvent;
use lumen_core::types::JobId;

/// An event observed on the job channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel to a job was established (or re-established).
    Connected { job_id: JobId },

    /// The channel closed. `clean` is true for a normal closure, which
    /// is never followed by a reconnect.
    Disconnected { job_id: JobId, clean: bool },

    /// A decoded inbound message.
    Message(InboundEvent),

    /// A transport-level error. The connection may still be alive.
    TransportError { message: String },

    /// The reconnect ceiling was hit; no further automatic attempts.
    ReconnectsExhausted { job_id: JobId, attempts: u32 },
}
