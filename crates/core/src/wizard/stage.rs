//! # Wizard Stages
//!
//! The three-stage state machine gating which operations are legal.
//!
//! ```text
//! TopicIntake ──(suggestions ok)──▶ VariableReview ──(confirm)──▶ Workbench
//!      ▲                                  │
//!      └────────────(return)──────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::WizardError;

/// Stage of the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    /// Topic, field, and role counts are being entered
    #[default]
    TopicIntake,
    /// Suggested taxonomy is being reviewed and edited
    VariableReview,
    /// Code generation per category; resting stage
    Workbench,
}

impl WizardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopicIntake => "topic_intake",
            Self::VariableReview => "variable_review",
            Self::Workbench => "workbench",
        }
    }

    /// 1-based position, as shown in a progress indicator
    pub fn step(&self) -> u8 {
        match self {
            Self::TopicIntake => 1,
            Self::VariableReview => 2,
            Self::Workbench => 3,
        }
    }

    /// Whether the taxonomy may be renamed or relabeled here
    pub fn allows_taxonomy_edits(&self) -> bool {
        matches!(self, Self::VariableReview | Self::Workbench)
    }
}

impl std::fmt::Display for WizardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages reachable in one step from `from`
pub fn allowed_transitions(from: WizardStage) -> &'static [WizardStage] {
    match from {
        WizardStage::TopicIntake => &[WizardStage::VariableReview],
        WizardStage::VariableReview => &[WizardStage::TopicIntake, WizardStage::Workbench],
        WizardStage::Workbench => &[],
    }
}

/// Check a single transition; `operation` names the attempted action in the error
pub fn validate_transition(
    from: WizardStage,
    to: WizardStage,
    operation: &'static str,
) -> Result<(), WizardError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(WizardError::InvalidTransition {
            operation,
            stage: from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [WizardStage; 3] = [
        WizardStage::TopicIntake,
        WizardStage::VariableReview,
        WizardStage::Workbench,
    ];

    #[test]
    fn test_forward_path() {
        assert!(validate_transition(WizardStage::TopicIntake, WizardStage::VariableReview, "t").is_ok());
        assert!(validate_transition(WizardStage::VariableReview, WizardStage::Workbench, "t").is_ok());
        assert!(validate_transition(WizardStage::VariableReview, WizardStage::TopicIntake, "t").is_ok());
    }

    #[test]
    fn test_workbench_is_terminal() {
        for to in ALL {
            assert!(validate_transition(WizardStage::Workbench, to, "leave").is_err());
        }
    }

    #[test]
    fn test_no_skipping_review() {
        let err = validate_transition(WizardStage::TopicIntake, WizardStage::Workbench, "confirm")
            .unwrap_err();
        assert_eq!(
            err,
            WizardError::InvalidTransition {
                operation: "confirm",
                stage: WizardStage::TopicIntake
            }
        );
    }

    #[test]
    fn test_self_transitions_rejected() {
        for stage in ALL {
            assert!(!allowed_transitions(stage).contains(&stage));
        }
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&WizardStage::VariableReview).unwrap();
        assert_eq!(json, "\"variable_review\"");
        assert_eq!(WizardStage::Workbench.step(), 3);
    }
}
