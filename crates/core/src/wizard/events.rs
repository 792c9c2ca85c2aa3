//! # Wizard Events
//!
//! Progress events broadcast to anyone watching a session (the SSE stream,
//! the CLI log).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::WizardStage;

/// Kind of wizard event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardEventKind {
    /// The session moved to another stage
    StageChanged,
    SuggestionStarted,
    SuggestionCompleted,
    SuggestionFailed,
    GenerationStarted,
    GenerationCompleted,
    GenerationFailed,
    /// An in-flight request was abandoned by the operator
    RequestAbandoned,
    /// A response arrived for a superseded request and was dropped
    ResponseDiscarded,
    /// A variable was renamed or relabeled
    TaxonomyEdited,
    CategorySelected,
    NoticeDismissed,
}

/// An event emitted by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: WizardEventKind,
    /// Stage of the session after the event
    pub stage: WizardStage,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl WizardEvent {
    pub fn new(kind: WizardEventKind, stage: WizardStage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
            stage,
            data: None,
        }
    }

    /// Attach a JSON payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = WizardEvent::new(WizardEventKind::GenerationStarted, WizardStage::Workbench)
            .with_data(serde_json::json!({"method": "OLS Baseline"}));

        assert_eq!(event.kind, WizardEventKind::GenerationStarted);
        assert_eq!(event.data.as_ref().unwrap()["method"], "OLS Baseline");
        assert_eq!(event.id.len(), 36);
    }

    #[test]
    fn test_event_serialization() {
        let event = WizardEvent::new(WizardEventKind::ResponseDiscarded, WizardStage::TopicIntake);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "response_discarded");
        assert_eq!(json["stage"], "topic_intake");
        assert!(json["data"].is_null());
    }
}
