//! # Request Builder
//!
//! Turns the taxonomy and a catalog selection into the payloads sent to the
//! collaborator: a variable-suggestion request and a code-generation request.

use serde::{Deserialize, Serialize};

use crate::catalog::{AnalysisMethod, Category};
use crate::state::taxonomy::{Role, RoleConfiguration, VariableDefinition};

/// Constraints every generated script must honour, in the order they are sent.
pub const MANDATORY_CONSTRAINTS: [&str; 7] = [
    "never fabricate, randomize, or synthesize sample data, or alter observation counts — assume data already exists and is clean",
    "use exactly the supplied variable names, no substitutions",
    "when the method implies fixed-effects absorption, the fixed-effect variable set must be referenced in the absorption clause",
    "every analytical step must carry inline explanatory commentary in the operator's language",
    "regression-like methods must include a results-export step",
    "output must be plain analysis code only — no enclosing formatting markers",
    "a \"placebo/permutation\"-style method must produce a randomization/permutation loop operating on the existing data, never on synthesized data",
];

/// Variable-suggestion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub topic: String,
    pub field: String,
    pub control_count: u8,
    pub mechanism_count: u8,
    pub hetero_count: u8,
    pub fixed_effect_count: u8,
}

impl SuggestionRequest {
    pub fn new(topic: &str, field: &str, roles: &RoleConfiguration) -> Self {
        Self {
            topic: topic.to_string(),
            field: field.to_string(),
            control_count: roles.control_count,
            mechanism_count: roles.mechanism_count,
            hetero_count: roles.hetero_count,
            fixed_effect_count: roles.fixed_effect_count,
        }
    }

    /// Instruction text handed to the suggestion model
    pub fn to_prompt(&self) -> String {
        let field = if self.field.trim().is_empty() {
            "unspecified"
        } else {
            self.field.as_str()
        };
        format!(
            "Research topic: {topic}\n\
             Field: {field}\n\n\
             Propose the variable taxonomy for this study:\n\
             - exactly 1 Y (dependent variable)\n\
             - exactly 1 X (core explanatory variable)\n\
             - {controls} Control variables\n\
             - {mechanisms} Mechanism variables\n\
             - {heteros} Hetero (heterogeneity grouping) variables\n\
             - {fes} FixedEffect variables\n\n\
             Each variable needs a Stata name (lowercase letters, digits, underscores, starting with a letter, no spaces) and a descriptive label.",
            topic = self.topic,
            field = field,
            controls = self.control_count,
            mechanisms = self.mechanism_count,
            heteros = self.hetero_count,
            fes = self.fixed_effect_count,
        )
    }
}

/// Canonical variable references substituted into a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableReferences {
    pub y: String,
    pub x: String,
    pub controls: String,
    pub mechanisms: String,
    pub heteros: String,
    pub fixed_effects: String,
}

impl VariableReferences {
    /// Resolve references from the taxonomy.
    ///
    /// A missing Y or X falls back to the literal `y` / `x`; role lists are
    /// space-joined and empty when the role has no members.
    pub fn from_variables(variables: &[VariableDefinition]) -> Self {
        let first = |role: Role, fallback: &str| {
            variables
                .iter()
                .find(|v| v.role == role)
                .map(|v| v.name.clone())
                .unwrap_or_else(|| fallback.to_string())
        };
        let joined = |role: Role| {
            variables
                .iter()
                .filter(|v| v.role == role)
                .map(|v| v.name.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };

        Self {
            y: first(Role::Y, "y"),
            x: first(Role::X, "x"),
            controls: joined(Role::Control),
            mechanisms: joined(Role::Mechanism),
            heteros: joined(Role::Hetero),
            fixed_effects: joined(Role::FixedEffect),
        }
    }
}

/// Code-generation request for one catalog method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeGenerationRequest {
    pub topic: String,
    pub category: Category,
    pub method: AnalysisMethod,
    pub references: VariableReferences,
    /// Language of the inline commentary
    pub commentary_language: String,
}

impl CodeGenerationRequest {
    pub fn new(
        topic: &str,
        category: Category,
        method: AnalysisMethod,
        variables: &[VariableDefinition],
        commentary_language: &str,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            category,
            method,
            references: VariableReferences::from_variables(variables),
            commentary_language: commentary_language.to_string(),
        }
    }

    /// Caption stored with the resulting section
    pub fn caption(&self) -> String {
        format!("{}: {}", self.category.title(), self.method.hint)
    }

    /// Compose the natural-language instruction
    pub fn to_prompt(&self) -> String {
        let refs = &self.references;
        let mut prompt = format!(
            "Research topic: {topic}\n\
             Analysis category: {category}\n\
             Method: {method}\n\
             Method guidance: {hint}\n\n\
             Variables:\n\
             - Dependent variable (Y): {y}\n\
             - Core explanatory variable (X): {x}\n\
             - Controls: {controls}\n\
             - Mechanisms: {mechanisms}\n\
             - Heterogeneity variables: {heteros}\n\
             - Fixed effects: {fixed_effects}\n\n\
             Write the Stata do-file code for this method.\n\
             Commentary language: {language}\n\n\
             Mandatory constraints:\n",
            topic = self.topic,
            category = self.category.title(),
            method = self.method.name,
            hint = self.method.hint,
            y = refs.y,
            x = refs.x,
            controls = none_if_empty(&refs.controls),
            mechanisms = none_if_empty(&refs.mechanisms),
            heteros = none_if_empty(&refs.heteros),
            fixed_effects = none_if_empty(&refs.fixed_effects),
            language = self.commentary_language,
        );
        for (i, constraint) in MANDATORY_CONSTRAINTS.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, constraint));
        }
        prompt
    }
}

fn none_if_empty(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> Vec<VariableDefinition> {
        vec![
            VariableDefinition::new("tfp", "Total factor productivity", Role::Y),
            VariableDefinition::new("dig", "Digital transformation index", Role::X),
            VariableDefinition::new("size", "Firm size", Role::Control),
            VariableDefinition::new("lev", "Leverage", Role::Control),
            VariableDefinition::new("year", "Year", Role::FixedEffect),
            VariableDefinition::new("city", "City", Role::FixedEffect),
        ]
    }

    #[test]
    fn test_references_join_roles() {
        let refs = VariableReferences::from_variables(&taxonomy());
        assert_eq!(refs.y, "tfp");
        assert_eq!(refs.x, "dig");
        assert_eq!(refs.controls, "size lev");
        assert_eq!(refs.fixed_effects, "year city");
        assert_eq!(refs.mechanisms, "");
    }

    #[test]
    fn test_references_fallback_when_roles_missing() {
        let refs = VariableReferences::from_variables(&[]);
        assert_eq!(refs.y, "y");
        assert_eq!(refs.x, "x");
        assert_eq!(refs.controls, "");
    }

    #[test]
    fn test_fixed_effects_slot_in_prompt() {
        let method = *Category::Benchmark.method_by_name("Two-Way Fixed Effects").unwrap();
        let request =
            CodeGenerationRequest::new("Digitalization and TFP", Category::Benchmark, method, &taxonomy(), "English");

        assert_eq!(request.references.fixed_effects, "year city");
        let prompt = request.to_prompt();
        assert!(prompt.contains("- Fixed effects: year city\n"));
        assert!(prompt.contains("Method: Two-Way Fixed Effects"));
        assert!(prompt.contains("- Mechanisms: (none)"));
    }

    #[test]
    fn test_prompt_carries_all_constraints_verbatim() {
        let method = *Category::Robust.method_by_name("Placebo Test (Permutation)").unwrap();
        let request = CodeGenerationRequest::new("t", Category::Robust, method, &taxonomy(), "Chinese");
        let prompt = request.to_prompt();

        for (i, constraint) in MANDATORY_CONSTRAINTS.iter().enumerate() {
            assert!(prompt.contains(&format!("{}. {}", i + 1, constraint)));
        }
        assert!(prompt.contains("Commentary language: Chinese"));
    }

    #[test]
    fn test_caption_names_category_and_hint() {
        let method = *Category::Basic.method(0).unwrap();
        let request = CodeGenerationRequest::new("t", Category::Basic, method, &taxonomy(), "English");
        assert_eq!(
            request.caption(),
            format!("Descriptive Statistics: {}", method.hint)
        );
    }

    #[test]
    fn test_suggestion_prompt_lists_counts() {
        let request = SuggestionRequest::new("Green credit and innovation", "", &RoleConfiguration::default());
        let prompt = request.to_prompt();
        assert!(prompt.contains("Field: unspecified"));
        assert!(prompt.contains("- 4 Control variables"));
        assert!(prompt.contains("- 2 FixedEffect variables"));

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["controlCount"], 4);
        assert_eq!(json["fixedEffectCount"], 2);
    }
}
