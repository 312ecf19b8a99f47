//! Incremental aggregation of prediction results.
//!
//! [`aggregator::ResultAggregator`] folds the unordered, possibly
//! duplicated event stream from the job channel into one consistent
//! collection that views can render directly. It has no dependency on
//! the channel client; any [`lumen_core::messages::InboundEvent`]
//! source can drive it.

pub mod aggregator;

pub use aggregator::{ResultAggregator, ResultRecord};
