//! Default system prompts bundled at compile time.

/// Variable suggester - proposes the role-tagged taxonomy for a topic
pub const VARIABLE_SUGGESTER: &str = include_str!("defaults/variable_suggester.md");

/// Stata coder - writes the do-file body for one catalog method
pub const STATA_CODER: &str = include_str!("defaults/stata_coder.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("variable_suggester", VARIABLE_SUGGESTER),
        ("stata_coder", STATA_CODER),
    ]
}
