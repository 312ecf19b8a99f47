//! Resilient push-channel client for per-job prediction streams.
//!
//! [`client::ChannelClient`] owns one WebSocket connection per job id,
//! reconnects with exponential backoff when the connection drops
//! uncleanly, and forwards decoded [`lumen_core::messages::InboundEvent`]s
//! to a single consumer. The transport is injected behind
//! [`transport::Transport`] so the state machine can be driven by a mock
//! in tests.

pub mod backoff;
pub mod client;
pub mod events;
pub mod transport;
pub mod ws;
