//! # Wizard Orchestration
//!
//! Drives a session through the three stages and talks to the collaborator.
//!
//! ## Flow
//!
//! ```text
//! topic + role counts → suggestion exchange → review/edit → confirm → per-category generation
//! ```

pub mod collaborator;
pub mod coordinator;
pub mod events;
pub mod request;
pub mod stage;

pub use collaborator::{Collaborator, LlmCollaborator};
pub use coordinator::{BusyState, Notice, WizardConfig, WizardCoordinator};
pub use events::{WizardEvent, WizardEventKind};
pub use request::{
    CodeGenerationRequest, SuggestionRequest, VariableReferences, MANDATORY_CONSTRAINTS,
};
pub use stage::{allowed_transitions, validate_transition, WizardStage};
