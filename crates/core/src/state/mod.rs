//! # Session State
//!
//! The workflow aggregate, its reducer, and the pieces it is built from.

pub mod io;
pub mod store;
pub mod taxonomy;
pub mod workflow;

pub use store::{CodeSection, GenerationStore};
pub use taxonomy::{
    group_by_role, is_valid_identifier, validate_taxonomy, Role, RoleBucket, RoleConfiguration,
    VariableDefinition,
};
pub use workflow::{WorkflowAction, WorkflowState};
