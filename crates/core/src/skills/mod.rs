//! # StataForge Skills
//!
//! The two LLM-backed exchanges of the wizard:
//!
//! - `VariableSuggestSkill` - propose a role-tagged variable taxonomy
//! - `StataCodegenSkill` - write the do-file body for one catalog method
//!
//! Both are thin SDK-style wrappers over `run_llm_function!`; the wizard
//! reaches them through the [`Collaborator`](crate::wizard::Collaborator) seam.

pub mod llm_helpers;
pub mod prompts;

pub mod codegen_skill;
pub mod suggest_skill;

pub use codegen_skill::{ScriptOutput, StataCodegenSkill};
pub use suggest_skill::{SuggestedVariable, SuggestionOutput, VariableSuggestSkill};
