//! # LLM Helpers
//!
//! Provider dispatch for structured-output calls. Both skills go through
//! `run_llm_function!` so the provider match lives in one place.

use radkit::agent::LlmFunction;
use radkit::models::providers::{
    AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
};
use radkit::models::{BaseLlm, LLMOutputTrait, Thread};
use schemars::JsonSchema;

use crate::models::{LlmProvider, ModelConfig};

/// One structured-output call against the provider named in `config`.
///
/// Missing API keys surface as errors from the provider's `from_env`.
pub async fn run_structured<T>(
    config: &ModelConfig,
    system_prompt: &str,
    input: impl Into<Thread>,
) -> anyhow::Result<T>
where
    T: LLMOutputTrait + JsonSchema + Send + Sync + 'static,
{
    let thread = input.into();
    match config.provider {
        LlmProvider::Anthropic => {
            call(AnthropicLlm::from_env(&config.model)?, system_prompt, thread).await
        }
        LlmProvider::OpenAI => {
            let mut llm = OpenAILlm::from_env(&config.model)?;
            if let Some(base_url) = &config.base_url {
                llm = llm.with_base_url(base_url);
            }
            call(llm, system_prompt, thread).await
        }
        LlmProvider::Gemini => call(GeminiLlm::from_env(&config.model)?, system_prompt, thread).await,
        LlmProvider::OpenRouter => {
            call(OpenRouterLlm::from_env(&config.model)?, system_prompt, thread).await
        }
        LlmProvider::Grok => call(GrokLlm::from_env(&config.model)?, system_prompt, thread).await,
        LlmProvider::DeepSeek => {
            call(DeepSeekLlm::from_env(&config.model)?, system_prompt, thread).await
        }
    }
}

async fn call<T, L>(llm: L, system_prompt: &str, thread: Thread) -> anyhow::Result<T>
where
    T: LLMOutputTrait + JsonSchema + Send + Sync + 'static,
    L: BaseLlm + 'static,
{
    let func = LlmFunction::<T>::new_with_system_instructions(llm, system_prompt);
    Ok(func.run(thread).await?)
}

/// Run an `LlmFunction` producing `$output_type` against the provider named in
/// a [`ModelConfig`](crate::models::ModelConfig).
///
/// Expands to an `anyhow::Result<$output_type>`.
#[macro_export]
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {
        $crate::skills::llm_helpers::run_structured::<$output_type>(
            $config,
            $system_prompt,
            $input,
        )
        .await
    };
}

pub use run_llm_function;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::ScriptOutput;

    #[tokio::test]
    async fn test_blank_api_key_fails_before_dispatch() {
        let provider = LlmProvider::DeepSeek;
        std::env::set_var(provider.env_var(), "");
        let config = ModelConfig::with_provider(provider, provider.default_model());

        let result = run_structured::<ScriptOutput>(&config, "system", "summarize").await;
        let err = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains(provider.env_var()), "unexpected error: {}", err);
    }
}
