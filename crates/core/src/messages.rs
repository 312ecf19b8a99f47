//! Channel wire messages and parser.
//!
//! The job channel pushes JSON text frames shaped
//! `{"type": "<kind>", ...}`. This module deserializes them into a
//! strongly-typed [`InboundEvent`] enum.

use serde::{Deserialize, Serialize};

use crate::types::PredictionId;

/// All known channel message types.
///
/// Deserialized via the internally-tagged `"type"` field. Prediction
/// updates carry their payload under `"data"`; keep-alive and error
/// notices carry an optional top-level `"message"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// Status snapshot for one prediction within the job.
    #[serde(rename = "prediction_update")]
    PredictionUpdate { data: PredictionUpdate },

    /// Keep-alive reply to a client ping.
    #[serde(rename = "pong")]
    Pong {
        #[serde(default)]
        message: Option<String>,
    },

    /// Server-side error notice. Informational; the channel stays open.
    #[serde(rename = "error")]
    ServerError {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Lifecycle status of a single prediction.
///
/// `Succeeded`, `Failed` and `Canceled` are terminal. The server emits
/// `"error"` as a status string when it could not fetch a prediction;
/// that is folded into [`Failed`](Self::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    #[serde(alias = "error")]
    Failed,
    Canceled,
}

impl PredictionStatus {
    /// Whether no further progress is expected for this prediction.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// Payload of a `prediction_update` message.
///
/// `output` is `null` upstream until the prediction completes;
/// [`outputs`](Self::outputs) normalizes that to an empty list.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUpdate {
    pub prediction_id: PredictionId,
    pub status: PredictionStatus,
    /// Generated artifact URLs, in generation order.
    #[serde(default)]
    pub output: Option<Vec<String>>,
    /// Error message, set when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Execution metrics, present once the prediction is terminal.
    #[serde(default)]
    pub metrics: Option<PredictionMetrics>,
}

impl PredictionUpdate {
    /// Output URLs with the upstream `null` normalized away.
    pub fn outputs(&self) -> &[String] {
        self.output.as_deref().unwrap_or(&[])
    }
}

/// Execution metrics reported alongside terminal predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionMetrics {
    /// Number of artifacts produced.
    #[serde(default)]
    pub image_count: Option<u32>,
    /// Model execution time in seconds.
    #[serde(default)]
    pub predict_time: Option<f64>,
}

/// Parse a channel text frame into a typed event.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log the failure and continue reading the channel.
pub fn parse_event(text: &str) -> Result<InboundEvent, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prediction_update() {
        let json = r#"{"type":"prediction_update","data":{"prediction_id":"abc-123","status":"processing"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::PredictionUpdate { data } => {
                assert_eq!(data.prediction_id, "abc-123");
                assert_eq!(data.status, PredictionStatus::Processing);
                assert!(data.outputs().is_empty());
                assert!(data.error.is_none());
                assert!(data.metrics.is_none());
            }
            other => panic!("Expected PredictionUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_succeeded_with_outputs_and_metrics() {
        let json = r#"{"type":"prediction_update","data":{
            "prediction_id":"p1",
            "status":"succeeded",
            "output":["https://x/1.png","https://x/2.png"],
            "metrics":{"image_count":2,"predict_time":3.4}
        }}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::PredictionUpdate { data } => {
                assert_eq!(data.status, PredictionStatus::Succeeded);
                assert_eq!(data.outputs(), ["https://x/1.png", "https://x/2.png"]);
                let metrics = data.metrics.unwrap();
                assert_eq!(metrics.image_count, Some(2));
                assert_eq!(metrics.predict_time, Some(3.4));
            }
            other => panic!("Expected PredictionUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_null_output_normalizes_to_empty() {
        let json = r#"{"type":"prediction_update","data":{"prediction_id":"p1","status":"starting","output":null}}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::PredictionUpdate { data } => assert!(data.outputs().is_empty()),
            other => panic!("Expected PredictionUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_status_as_failed() {
        let json = r#"{"type":"prediction_update","data":{"prediction_id":"p1","status":"error","error":"HTTP 500"}}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::PredictionUpdate { data } => {
                assert_eq!(data.status, PredictionStatus::Failed);
                assert_eq!(data.error.as_deref(), Some("HTTP 500"));
            }
            other => panic!("Expected PredictionUpdate, got {other:?}"),
        }
    }

    #[test]
    fn parse_pong_message() {
        let json = r#"{"type":"pong","message":"Connection alive"}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::Pong { message } => {
                assert_eq!(message.as_deref(), Some("Connection alive"));
            }
            other => panic!("Expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn parse_pong_without_message() {
        let json = r#"{"type":"pong"}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::Pong { message } => assert!(message.is_none()),
            other => panic!("Expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn parse_server_error() {
        let json = r#"{"type":"error","message":"job not found"}"#;
        let event = parse_event(json).unwrap();
        match event {
            InboundEvent::ServerError { message } => {
                assert_eq!(message.as_deref(), Some("job not found"));
            }
            other => panic!("Expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"unknown_thing","data":{}}"#;
        assert!(parse_event(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_event("not json at all").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(PredictionStatus::Succeeded.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
    }
}
