//! Event-to-state reducer for per-prediction results.
//!
//! The channel delivers `prediction_update` snapshots unordered,
//! possibly duplicated and possibly stale. [`ResultAggregator::apply`]
//! folds them under a deterministic merge rule: a record that reached
//! `succeeded` is frozen, while other terminal states stay overwritable
//! so an upstream retry can land (`failed` → `succeeded`).

use lumen_core::messages::{InboundEvent, PredictionMetrics, PredictionStatus, PredictionUpdate};
use lumen_core::types::{PredictionId, Timestamp};
use serde::Serialize;

/// Aggregated state of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub prediction_id: PredictionId,
    pub status: PredictionStatus,
    /// Generated artifact URLs, empty until the prediction succeeds.
    pub outputs: Vec<String>,
    /// Error message, set when `status` is `failed`.
    pub error: Option<String>,
    /// Execution metrics, present once the prediction is terminal.
    pub metrics: Option<PredictionMetrics>,
    /// When the last accepted update for this record arrived.
    pub updated_at: Timestamp,
}

impl ResultRecord {
    fn from_update(update: &PredictionUpdate, now: Timestamp) -> Self {
        Self {
            prediction_id: update.prediction_id.clone(),
            status: update.status,
            outputs: update.outputs().to_vec(),
            error: update.error.clone(),
            metrics: update.metrics,
            updated_at: now,
        }
    }
}

/// Ordered collection of prediction results for the current job.
///
/// Records are kept most-recently-arrived-first. Created empty at job
/// submission, populated by [`apply`](Self::apply), and cleared
/// wholesale by [`reset`](Self::reset) when a new job is submitted —
/// an observed prediction id is never removed piecemeal.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<ResultRecord>,
    first_success_at: Option<Timestamp>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one inbound event into the collection.
    ///
    /// Returns `true` when the collection changed. Keep-alive and
    /// server-notice events are not part of the data model and are
    /// absorbed silently, as are duplicate or stale updates for a
    /// prediction that already succeeded.
    pub fn apply(&mut self, event: &InboundEvent) -> bool {
        self.apply_at(event, chrono::Utc::now())
    }

    fn apply_at(&mut self, event: &InboundEvent, now: Timestamp) -> bool {
        let update = match event {
            InboundEvent::PredictionUpdate { data } => data,
            InboundEvent::Pong { .. } | InboundEvent::ServerError { .. } => return false,
        };

        let position = self
            .records
            .iter()
            .position(|r| r.prediction_id == update.prediction_id);

        match position {
            None => {
                let record = ResultRecord::from_update(update, now);
                let succeeded = record.status == PredictionStatus::Succeeded;
                // Most-recently-arrived-first.
                self.records.insert(0, record);
                if succeeded {
                    self.latch_first_success(now);
                }
                true
            }
            Some(index) => {
                let existing = &self.records[index];
                if existing.status == PredictionStatus::Succeeded {
                    // Frozen terminal state: duplicates and reordered
                    // stale updates must not churn the record.
                    tracing::debug!(
                        prediction_id = %update.prediction_id,
                        incoming_status = ?update.status,
                        "Ignoring update for succeeded prediction",
                    );
                    return false;
                }
                // Replace in place; position in the ordering is kept.
                self.records[index] = ResultRecord::from_update(update, now);
                if update.status == PredictionStatus::Succeeded {
                    self.latch_first_success(now);
                }
                true
            }
        }
    }

    /// Clear all records and the first-success latch. Used when a new
    /// job is submitted.
    pub fn reset(&mut self) {
        self.records.clear();
        self.first_success_at = None;
    }

    /// All records, most recently arrived first. Read-only.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// When the first prediction of this run reached `succeeded`.
    pub fn first_success_at(&self) -> Option<Timestamp> {
        self.first_success_at
    }

    /// Records currently in the given status.
    pub fn by_status(
        &self,
        status: PredictionStatus,
    ) -> impl Iterator<Item = &ResultRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    /// Succeeded records that actually carry outputs to show.
    pub fn succeeded(&self) -> impl Iterator<Item = &ResultRecord> {
        self.by_status(PredictionStatus::Succeeded)
            .filter(|r| !r.outputs.is_empty())
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.by_status(PredictionStatus::Succeeded).count()
    }

    /// Records still in flight (`starting` plus `processing`).
    pub fn processing_count(&self) -> usize {
        self.by_status(PredictionStatus::Starting).count()
            + self.by_status(PredictionStatus::Processing).count()
    }

    pub fn failed_count(&self) -> usize {
        self.by_status(PredictionStatus::Failed).count()
    }

    fn latch_first_success(&mut self, now: Timestamp) {
        if self.first_success_at.is_none() {
            self.first_success_at = Some(now);
        }
    }
}
