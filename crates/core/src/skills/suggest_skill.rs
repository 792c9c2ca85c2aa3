//! # Variable Suggestion Skill
//!
//! Asks the model for a role-tagged variable taxonomy. The response is a
//! structured output whose `role` field is constrained to the six-value
//! enumeration by the JSON schema.

use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::state::taxonomy::{Role, VariableDefinition};
use crate::wizard::request::SuggestionRequest;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One suggested variable
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct SuggestedVariable {
    /// Stata variable name: lowercase letters, digits, underscores
    pub name: String,
    /// Human-readable description
    pub label: String,
    pub role: Role,
}

impl From<SuggestedVariable> for VariableDefinition {
    fn from(v: SuggestedVariable) -> Self {
        VariableDefinition::new(v.name, v.label, v.role)
    }
}

/// Output from the suggestion skill
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct SuggestionOutput {
    pub variables: Vec<SuggestedVariable>,
}

impl SuggestionOutput {
    pub fn into_definitions(self) -> Vec<VariableDefinition> {
        self.variables.into_iter().map(Into::into).collect()
    }
}

/// Skill that proposes variables for a research topic
pub struct VariableSuggestSkill {
    config: ModelConfig,
}

impl VariableSuggestSkill {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run against this skill's own model config
    pub async fn suggest(&self, request: &SuggestionRequest) -> anyhow::Result<SuggestionOutput> {
        Self::run(request, &self.config).await
    }

    /// SDK-style call: one structured-output request, no agent runtime.
    pub async fn run(
        request: &SuggestionRequest,
        config: &ModelConfig,
    ) -> anyhow::Result<SuggestionOutput> {
        let prompt = request.to_prompt();
        run_llm_function!(config, SuggestionOutput, SYSTEM_PROMPT, prompt)
    }
}

const SYSTEM_PROMPT: &str = super::prompts::VARIABLE_SUGGESTER;
