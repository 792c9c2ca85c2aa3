//! # Workflow State
//!
//! The root aggregate of a wizard session and the reducer that moves it.
//!
//! State is never mutated in place by callers: every change goes through
//! [`WorkflowState::apply`], which returns the next state or an error and
//! leaves the current one untouched.

use serde::{Deserialize, Serialize};

use crate::catalog::Category;
use crate::error::WizardError;
use crate::state::store::{CodeSection, GenerationStore};
use crate::state::taxonomy::{
    group_by_role, validate_identifier, validate_taxonomy, RoleBucket, RoleConfiguration,
    VariableDefinition,
};
use crate::wizard::request::VariableReferences;
use crate::wizard::stage::{validate_transition, WizardStage};

/// Every state change a session can go through
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    SetTopic { topic: String, field: String },
    SetRoleConfig(RoleConfiguration),
    /// A validated suggestion exchange completed
    ApplySuggestions(Vec<VariableDefinition>),
    ReturnToTopic,
    ConfirmTaxonomy,
    RenameVariable { index: usize, name: String },
    RelabelVariable { index: usize, label: String },
    SelectCategory(Category),
    RecordSection { category: Category, section: CodeSection },
}

impl WorkflowAction {
    /// Short name used in logs and events
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetTopic { .. } => "set_topic",
            Self::SetRoleConfig(_) => "set_role_config",
            Self::ApplySuggestions(_) => "apply_suggestions",
            Self::ReturnToTopic => "return_to_topic",
            Self::ConfirmTaxonomy => "confirm_taxonomy",
            Self::RenameVariable { .. } => "rename_variable",
            Self::RelabelVariable { .. } => "relabel_variable",
            Self::SelectCategory(_) => "select_category",
            Self::RecordSection { .. } => "record_section",
        }
    }
}

/// A wizard session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub stage: WizardStage,
    pub topic: String,
    pub field: String,
    pub role_config: RoleConfiguration,
    pub variables: Vec<VariableDefinition>,
    pub active_category: Category,
    pub store: GenerationStore,
}

impl WorkflowState {
    pub fn new(role_config: RoleConfiguration) -> Self {
        Self {
            role_config,
            ..Self::default()
        }
    }

    /// Produce the state that follows `action`
    pub fn apply(&self, action: WorkflowAction) -> Result<WorkflowState, WizardError> {
        let mut next = self.clone();
        match action {
            WorkflowAction::SetTopic { topic, field } => {
                self.require(WizardStage::TopicIntake, "edit the topic")?;
                next.topic = topic.trim().to_string();
                next.field = field.trim().to_string();
            }
            WorkflowAction::SetRoleConfig(config) => {
                self.require(WizardStage::TopicIntake, "change role counts")?;
                config.validate()?;
                next.role_config = config;
            }
            WorkflowAction::ApplySuggestions(variables) => {
                validate_transition(
                    self.stage,
                    WizardStage::VariableReview,
                    "apply suggested variables",
                )?;
                if variables.is_empty() {
                    return Err(WizardError::SuggestionFetch(
                        "collaborator returned no variables".to_string(),
                    ));
                }
                validate_taxonomy(&variables)?;
                next.variables = variables;
                next.stage = WizardStage::VariableReview;
            }
            WorkflowAction::ReturnToTopic => {
                validate_transition(self.stage, WizardStage::TopicIntake, "return to the topic")?;
                next.stage = WizardStage::TopicIntake;
            }
            WorkflowAction::ConfirmTaxonomy => {
                validate_transition(self.stage, WizardStage::Workbench, "confirm the taxonomy")?;
                if self.variables.is_empty() {
                    return Err(WizardError::InvalidTransition {
                        operation: "confirm an empty taxonomy",
                        stage: self.stage,
                    });
                }
                next.stage = WizardStage::Workbench;
            }
            WorkflowAction::RenameVariable { index, name } => {
                self.require_edits("rename a variable")?;
                let name = validate_identifier(name.trim())?.to_string();
                next.variable_mut(index)?.name = name;
            }
            WorkflowAction::RelabelVariable { index, label } => {
                self.require_edits("relabel a variable")?;
                next.variable_mut(index)?.label = label;
            }
            WorkflowAction::SelectCategory(category) => {
                next.active_category = category;
            }
            WorkflowAction::RecordSection { category, section } => {
                self.require(WizardStage::Workbench, "record generated code")?;
                next.store.prepend(category, section);
            }
        }
        Ok(next)
    }

    fn require(&self, stage: WizardStage, operation: &'static str) -> Result<(), WizardError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                operation,
                stage: self.stage,
            })
        }
    }

    fn require_edits(&self, operation: &'static str) -> Result<(), WizardError> {
        if self.stage.allows_taxonomy_edits() {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                operation,
                stage: self.stage,
            })
        }
    }

    fn variable_mut(&mut self, index: usize) -> Result<&mut VariableDefinition, WizardError> {
        self.variables
            .get_mut(index)
            .ok_or(WizardError::UnknownVariable(index))
    }

    /// The six role buckets in display order
    pub fn group_by_role(&self) -> Vec<RoleBucket> {
        group_by_role(&self.variables)
    }

    pub fn references(&self) -> VariableReferences {
        VariableReferences::from_variables(&self.variables)
    }

    /// Render a category's history as one do-file, oldest section first
    pub fn render_do_file(&self, category: Category) -> String {
        let refs = self.references();
        let rule = format!("*{}", "=".repeat(70));
        let mut out = String::new();

        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!("* Topic:          {}\n", self.topic));
        if !self.field.is_empty() {
            out.push_str(&format!("* Field:          {}\n", self.field));
        }
        out.push_str(&format!("* Analysis:       {}\n", category.title()));
        out.push_str(&format!("* Y:              {}\n", refs.y));
        out.push_str(&format!("* X:              {}\n", refs.x));
        for (label, value) in [
            ("Controls", &refs.controls),
            ("Mechanisms", &refs.mechanisms),
            ("Heterogeneity", &refs.heteros),
            ("Fixed effects", &refs.fixed_effects),
        ] {
            if !value.is_empty() {
                out.push_str(&format!("* {:<15} {}\n", format!("{}:", label), value));
            }
        }
        out.push_str(&rule);
        out.push('\n');

        for section in self.store.sections(category).iter().rev() {
            out.push('\n');
            out.push_str(&format!("* ---- {} ----\n", section.title));
            out.push_str(&format!("* {}\n", section.explanation));
            out.push_str(section.code.trim_end());
            out.push('\n');
        }
        out
    }
}
