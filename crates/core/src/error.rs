//! # Wizard Errors
//!
//! Domain errors raised by the wizard state machine and its collaborator
//! exchanges. Transport and I/O plumbing uses `anyhow`; everything the
//! operator can see or react to is a [`WizardError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Category;
use crate::wizard::stage::WizardStage;

/// The two kinds of collaborator exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Variable-suggestion exchange
    Suggestion,
    /// Code-generation exchange
    Generation,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suggestion => "suggestion",
            Self::Generation => "generation",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "suggestion" => Some(Self::Suggestion),
            "generation" => Some(Self::Generation),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by wizard operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WizardError {
    /// Empty topic, transport error, or malformed/empty suggestion response
    #[error("variable suggestion failed: {0}")]
    SuggestionFetch(String),

    /// Transport error or empty generation response
    #[error("code generation failed: {0}")]
    CodeGeneration(String),

    /// The suggestion response parsed but violates the taxonomy contract
    #[error("suggestion response does not match the variable schema: {0}")]
    SchemaMismatch(String),

    /// The operation is not legal in the current stage
    #[error("cannot {operation} while in stage {stage}")]
    InvalidTransition {
        operation: &'static str,
        stage: WizardStage,
    },

    /// A request of the same kind is still outstanding
    #[error("a {0} request is already in flight")]
    Busy(RequestKind),

    /// The response belongs to an abandoned or superseded request
    #[error("{0} response discarded: request was superseded")]
    StaleResponse(RequestKind),

    #[error("invalid role configuration: {0}")]
    InvalidRoleConfig(String),

    #[error("invalid variable name '{0}': expected a lowercase identifier like `ln_gdp`")]
    InvalidIdentifier(String),

    #[error("no variable at index {0}")]
    UnknownVariable(usize),

    #[error("no method '{method}' in category {category}")]
    UnknownMethod { category: Category, method: String },
}

impl WizardError {
    /// Failures that are recorded as operator-visible notices
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self,
            Self::SuggestionFetch(_) | Self::CodeGeneration(_) | Self::SchemaMismatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_cause() {
        let err = WizardError::InvalidTransition {
            operation: "confirm the taxonomy",
            stage: WizardStage::TopicIntake,
        };
        assert_eq!(
            err.to_string(),
            "cannot confirm the taxonomy while in stage topic_intake"
        );
        assert_eq!(
            WizardError::Busy(RequestKind::Generation).to_string(),
            "a generation request is already in flight"
        );
    }

    #[test]
    fn test_only_exchange_failures_are_surfaced() {
        assert!(WizardError::SuggestionFetch("timeout".into()).is_surfaced());
        assert!(WizardError::SchemaMismatch("two Y".into()).is_surfaced());
        assert!(!WizardError::Busy(RequestKind::Suggestion).is_surfaced());
        assert!(!WizardError::UnknownVariable(3).is_surfaced());
    }

    #[test]
    fn test_request_kind_parsing() {
        assert_eq!(RequestKind::from_str("generation"), Some(RequestKind::Generation));
        assert_eq!(RequestKind::from_str("other"), None);
    }
}
