#![allow(dead_code)]

//! Stub collaborators shared by the integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use stataforge_core::wizard::{CodeGenerationRequest, Collaborator, SuggestionRequest};
use stataforge_core::{Role, VariableDefinition};

/// Answers every suggestion with exactly the requested role counts
pub struct ExactCollaborator {
    script: Option<String>,
    pub suggestion_calls: AtomicUsize,
    pub generation_requests: Mutex<Vec<CodeGenerationRequest>>,
}

impl ExactCollaborator {
    pub fn new(script: &str) -> Self {
        Self {
            script: Some(script.to_string()),
            suggestion_calls: AtomicUsize::new(0),
            generation_requests: Mutex::new(Vec::new()),
        }
    }

    /// Generation always fails with a transport error
    pub fn failing() -> Self {
        Self {
            script: None,
            ..Self::new("")
        }
    }

    pub fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }
}

pub fn taxonomy_for(request: &SuggestionRequest) -> Vec<VariableDefinition> {
    let mut variables = vec![
        VariableDefinition::new("tfp", "Total factor productivity", Role::Y),
        VariableDefinition::new("dig", "Digital transformation index", Role::X),
    ];
    let groups = [
        ("ctrl", Role::Control, request.control_count),
        ("mech", Role::Mechanism, request.mechanism_count),
        ("het", Role::Hetero, request.hetero_count),
        ("fe", Role::FixedEffect, request.fixed_effect_count),
    ];
    for (prefix, role, count) in groups {
        for i in 1..=count {
            variables.push(VariableDefinition::new(
                format!("{}_{}", prefix, i),
                format!("{:?} variable {}", role, i),
                role,
            ));
        }
    }
    variables
}

#[async_trait]
impl Collaborator for ExactCollaborator {
    async fn suggest_variables(
        &self,
        request: &SuggestionRequest,
    ) -> anyhow::Result<Vec<VariableDefinition>> {
        self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
        Ok(taxonomy_for(request))
    }

    async fn generate_code(&self, request: &CodeGenerationRequest) -> anyhow::Result<String> {
        self.generation_requests
            .lock()
            .unwrap()
            .push(request.clone());
        match &self.script {
            Some(script) => Ok(script.clone()),
            None => anyhow::bail!("upstream returned 503"),
        }
    }
}
