//! # Variable Taxonomy
//!
//! Role-tagged variable definitions and the role-cardinality configuration
//! the operator picks before asking for suggestions.

use std::sync::OnceLock;

use radkit::macros::LLMOutput;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::WizardError;

/// Analytical role a variable plays in the study
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, LLMOutput,
)]
pub enum Role {
    /// Dependent variable
    Y,
    /// Core explanatory variable
    X,
    Control,
    Mechanism,
    /// Heterogeneity grouping variable
    Hetero,
    /// Fixed-effect absorber
    FixedEffect,
}

impl Role {
    /// Display order of role buckets
    pub const ORDER: [Role; 6] = [
        Role::Y,
        Role::X,
        Role::Control,
        Role::Mechanism,
        Role::Hetero,
        Role::FixedEffect,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Y => "Dependent Variable",
            Role::X => "Core Explanatory Variable",
            Role::Control => "Control Variables",
            Role::Mechanism => "Mechanism Variables",
            Role::Hetero => "Heterogeneity Variables",
            Role::FixedEffect => "Fixed Effects",
        }
    }
}

/// A variable in the taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Stata identifier, e.g. `ln_gdp`
    pub name: String,
    /// Free-form description
    pub label: String,
    pub role: Role,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            role,
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static identifier pattern"))
}

/// Whether `name` is a valid Stata variable identifier for the taxonomy
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Validate a variable name, returning it unchanged on success
pub fn validate_identifier(name: &str) -> Result<&str, WizardError> {
    if is_valid_identifier(name) {
        Ok(name)
    } else {
        Err(WizardError::InvalidIdentifier(name.to_string()))
    }
}

/// How many variables of each configurable role the operator wants.
///
/// Exactly one Y and one X are always implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfiguration {
    pub control_count: u8,
    pub fixed_effect_count: u8,
    pub mechanism_count: u8,
    pub hetero_count: u8,
}

impl Default for RoleConfiguration {
    fn default() -> Self {
        Self {
            control_count: 4,
            fixed_effect_count: 2,
            mechanism_count: 1,
            hetero_count: 1,
        }
    }
}

impl RoleConfiguration {
    pub const CONTROL_RANGE: (u8, u8) = (1, 20);
    pub const FIXED_EFFECT_RANGE: (u8, u8) = (0, 5);
    pub const MECHANISM_RANGE: (u8, u8) = (1, 5);
    pub const HETERO_RANGE: (u8, u8) = (0, 5);

    /// Build a validated configuration
    pub fn new(
        control_count: u8,
        fixed_effect_count: u8,
        mechanism_count: u8,
        hetero_count: u8,
    ) -> Result<Self, WizardError> {
        let config = Self {
            control_count,
            fixed_effect_count,
            mechanism_count,
            hetero_count,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WizardError> {
        check_range("controlCount", self.control_count, Self::CONTROL_RANGE)?;
        check_range(
            "fixedEffectCount",
            self.fixed_effect_count,
            Self::FIXED_EFFECT_RANGE,
        )?;
        check_range("mechanismCount", self.mechanism_count, Self::MECHANISM_RANGE)?;
        check_range("heteroCount", self.hetero_count, Self::HETERO_RANGE)?;
        Ok(())
    }

    /// Requested count for a role (Y and X are always one)
    pub fn count_for(&self, role: Role) -> usize {
        match role {
            Role::Y | Role::X => 1,
            Role::Control => self.control_count as usize,
            Role::Mechanism => self.mechanism_count as usize,
            Role::Hetero => self.hetero_count as usize,
            Role::FixedEffect => self.fixed_effect_count as usize,
        }
    }

    /// Total number of variables this configuration asks for
    pub fn expected_total(&self) -> usize {
        Role::ORDER.iter().map(|role| self.count_for(*role)).sum()
    }
}

fn check_range(field: &str, value: u8, (min, max): (u8, u8)) -> Result<(), WizardError> {
    if value < min || value > max {
        return Err(WizardError::InvalidRoleConfig(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// Variables of one role, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleBucket {
    pub role: Role,
    /// Taxonomy indices paired with the variables, so callers can edit by reference
    pub variables: Vec<(usize, VariableDefinition)>,
}

impl RoleBucket {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|(_, v)| v.name.as_str()).collect()
    }
}

/// Partition variables into the six role buckets in [`Role::ORDER`].
///
/// Every bucket is present; within a bucket the taxonomy order is kept.
pub fn group_by_role(variables: &[VariableDefinition]) -> Vec<RoleBucket> {
    Role::ORDER
        .iter()
        .map(|role| RoleBucket {
            role: *role,
            variables: variables
                .iter()
                .enumerate()
                .filter(|(_, v)| v.role == *role)
                .map(|(i, v)| (i, v.clone()))
                .collect(),
        })
        .collect()
}

/// Count variables per role in [`Role::ORDER`]
pub fn role_counts(variables: &[VariableDefinition]) -> [usize; 6] {
    let mut counts = [0usize; 6];
    for variable in variables {
        if let Some(slot) = Role::ORDER.iter().position(|r| *r == variable.role) {
            counts[slot] += 1;
        }
    }
    counts
}

/// Check a suggested taxonomy against the variable contract.
///
/// Every name must be a valid identifier, every label non-blank, and the set
/// must hold exactly one Y and one X. Counts of the other roles are not
/// checked against the requested [`RoleConfiguration`].
pub fn validate_taxonomy(variables: &[VariableDefinition]) -> Result<(), WizardError> {
    for variable in variables {
        if !is_valid_identifier(&variable.name) {
            return Err(WizardError::SchemaMismatch(format!(
                "'{}' is not a lowercase identifier",
                variable.name
            )));
        }
        if variable.label.trim().is_empty() {
            return Err(WizardError::SchemaMismatch(format!(
                "variable '{}' has an empty label",
                variable.name
            )));
        }
    }

    let counts = role_counts(variables);
    for (role, count) in [(Role::Y, counts[0]), (Role::X, counts[1])] {
        if count != 1 {
            return Err(WizardError::SchemaMismatch(format!(
                "expected exactly one {:?} variable, got {}",
                role, count
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_constraint() {
        assert!(is_valid_identifier("ln_gdp"));
        assert!(is_valid_identifier("tfp2"));
        assert!(!is_valid_identifier("2tfp"));
        assert!(!is_valid_identifier("GDP"));
        assert!(!is_valid_identifier("ln gdp"));
        assert!(!is_valid_identifier(""));
        assert!(validate_identifier("Size").is_err());
    }

    #[test]
    fn test_role_config_ranges() {
        assert!(RoleConfiguration::new(1, 0, 1, 0).is_ok());
        assert!(RoleConfiguration::new(20, 5, 5, 5).is_ok());
        assert!(matches!(
            RoleConfiguration::new(0, 0, 1, 0),
            Err(WizardError::InvalidRoleConfig(_))
        ));
        assert!(RoleConfiguration::new(21, 0, 1, 0).is_err());
        assert!(RoleConfiguration::new(4, 6, 1, 1).is_err());
        assert!(RoleConfiguration::new(4, 2, 0, 1).is_err());
        assert!(RoleConfiguration::new(4, 2, 1, 6).is_err());
    }

    #[test]
    fn test_default_expected_total() {
        assert_eq!(RoleConfiguration::default().expected_total(), 10);
    }

    #[test]
    fn test_group_by_role_is_stable() {
        let variables = vec![
            VariableDefinition::new("city", "City", Role::FixedEffect),
            VariableDefinition::new("size", "Firm size", Role::Control),
            VariableDefinition::new("tfp", "TFP", Role::Y),
            VariableDefinition::new("lev", "Leverage", Role::Control),
            VariableDefinition::new("dig", "Digitalization", Role::X),
            VariableDefinition::new("year", "Year", Role::FixedEffect),
        ];

        let buckets = group_by_role(&variables);
        assert_eq!(buckets.len(), 6);
        let roles: Vec<_> = buckets.iter().map(|b| b.role).collect();
        assert_eq!(roles, Role::ORDER.to_vec());

        assert_eq!(buckets[0].names(), vec!["tfp"]);
        assert_eq!(buckets[2].names(), vec!["size", "lev"]);
        assert_eq!(buckets[5].names(), vec!["city", "year"]);
        assert!(buckets[3].is_empty());
        assert_eq!(buckets[2].variables[1].0, 3);
    }

    #[test]
    fn test_validate_taxonomy() {
        let mut variables = vec![
            VariableDefinition::new("tfp", "TFP", Role::Y),
            VariableDefinition::new("dig", "Digitalization", Role::X),
        ];
        assert!(validate_taxonomy(&variables).is_ok());

        variables.push(VariableDefinition::new("roa", "Return on assets", Role::Y));
        assert!(matches!(
            validate_taxonomy(&variables),
            Err(WizardError::SchemaMismatch(_))
        ));

        let bad_name = vec![
            VariableDefinition::new("Firm Size", "Size", Role::Y),
            VariableDefinition::new("dig", "Digitalization", Role::X),
        ];
        assert!(validate_taxonomy(&bad_name).is_err());

        let blank_label = vec![
            VariableDefinition::new("tfp", " ", Role::Y),
            VariableDefinition::new("dig", "Digitalization", Role::X),
        ];
        assert!(validate_taxonomy(&blank_label).is_err());
    }

    #[test]
    fn test_role_serialization_matches_schema_enum() {
        assert_eq!(serde_json::to_string(&Role::FixedEffect).unwrap(), "\"FixedEffect\"");
        let role: Role = serde_json::from_str("\"Hetero\"").unwrap();
        assert_eq!(role, Role::Hetero);
        assert!(serde_json::from_str::<Role>("\"Outcome\"").is_err());
    }
}
