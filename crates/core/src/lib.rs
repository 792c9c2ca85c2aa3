//! # StataForge Core
//!
//! The engine behind the StataForge wizard: variable taxonomy, method
//! catalog, stage machine, request construction, and the per-category
//! history of generated do-file sections.
//!
//! ## Architecture
//!
//! - `catalog` - The five analysis categories and their methods
//! - `state/` - Workflow aggregate, taxonomy, generation store, runtime files
//! - `wizard/` - Stage machine, request builder, coordinator, events
//! - `skills/` - radkit-backed LLM exchanges
//! - `models` - LLM provider configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stataforge_core::wizard::{LlmCollaborator, WizardConfig, WizardCoordinator};
//! use stataforge_core::{Category, RoleConfiguration};
//!
//! let config = WizardConfig::default();
//! let collaborator = Arc::new(LlmCollaborator::new(config.model.clone()));
//! let wizard = WizardCoordinator::new(config, collaborator);
//!
//! wizard.request_suggestions("Digitalization and TFP", "Economics", RoleConfiguration::default()).await?;
//! wizard.confirm_taxonomy()?;
//! wizard.select_category(Category::Benchmark)?;
//! let (_, section) = wizard.generate(0).await?;
//! ```

pub mod catalog;
pub mod error;
pub mod models;
pub mod skills;
pub mod state;
pub mod wizard;

pub use catalog::{AnalysisMethod, Category};
pub use error::{RequestKind, WizardError};
pub use state::{CodeSection, Role, RoleConfiguration, VariableDefinition, WorkflowState};
pub use wizard::{WizardCoordinator, WizardStage};
