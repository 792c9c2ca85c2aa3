//! # Collaborator
//!
//! The seam between the wizard and the language model. The coordinator only
//! sees this trait, so tests and offline runs can swap in their own
//! implementation.

use async_trait::async_trait;

use crate::models::ModelConfig;
use crate::skills::{StataCodegenSkill, VariableSuggestSkill};
use crate::state::taxonomy::VariableDefinition;

use super::request::{CodeGenerationRequest, SuggestionRequest};

/// External service answering the two wizard exchanges
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Propose a role-tagged taxonomy for the topic
    async fn suggest_variables(
        &self,
        request: &SuggestionRequest,
    ) -> anyhow::Result<Vec<VariableDefinition>>;

    /// Write the script body for one catalog method
    async fn generate_code(&self, request: &CodeGenerationRequest) -> anyhow::Result<String>;
}

/// Collaborator backed by the radkit skills
pub struct LlmCollaborator {
    suggester: VariableSuggestSkill,
    coder: StataCodegenSkill,
}

impl LlmCollaborator {
    /// Use one model for both exchanges
    pub fn new(config: ModelConfig) -> Self {
        Self {
            suggester: VariableSuggestSkill::new(config.clone()),
            coder: StataCodegenSkill::new(config),
        }
    }

    /// Use a separate model for code generation
    pub fn with_codegen_model(mut self, config: ModelConfig) -> Self {
        self.coder = StataCodegenSkill::new(config);
        self
    }

    pub fn suggestion_model(&self) -> &ModelConfig {
        self.suggester.config()
    }

    pub fn codegen_model(&self) -> &ModelConfig {
        self.coder.config()
    }
}

#[async_trait]
impl Collaborator for LlmCollaborator {
    async fn suggest_variables(
        &self,
        request: &SuggestionRequest,
    ) -> anyhow::Result<Vec<VariableDefinition>> {
        let output = self.suggester.suggest(request).await?;
        Ok(output.into_definitions())
    }

    async fn generate_code(&self, request: &CodeGenerationRequest) -> anyhow::Result<String> {
        self.coder.generate(request).await
    }
}
