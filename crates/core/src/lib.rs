//! Shared types for the Lumen prediction monitor.
//!
//! Holds the wire message types pushed over the per-job channel, the
//! prediction lifecycle status enum, and the small set of aliases and
//! errors the other crates build on.

pub mod error;
pub mod messages;
pub mod types;
