//! # Stata Codegen Skill
//!
//! Sends a composed generation request and returns the script body. The
//! body is never parsed or checked here; it is stored as returned.

use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::wizard::request::CodeGenerationRequest;
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the codegen skill
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ScriptOutput {
    /// Plain Stata do-file code, no markdown fences
    pub code: String,
}

/// Skill that writes the do-file body for one catalog method
pub struct StataCodegenSkill {
    config: ModelConfig,
}

impl StataCodegenSkill {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run against this skill's own model config
    pub async fn generate(&self, request: &CodeGenerationRequest) -> anyhow::Result<String> {
        Self::run(request, &self.config).await
    }

    pub async fn run(
        request: &CodeGenerationRequest,
        config: &ModelConfig,
    ) -> anyhow::Result<String> {
        let prompt = request.to_prompt();
        let output = run_llm_function!(config, ScriptOutput, SYSTEM_PROMPT, prompt)?;
        Ok(output.code)
    }
}

const SYSTEM_PROMPT: &str = super::prompts::STATA_CODER;
