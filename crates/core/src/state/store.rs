//! # Generation Store
//!
//! Per-category history of generated code sections, newest first.
//!
//! The store only grows: sections are never deduplicated, evicted, or capped.
//! History lives in memory for the lifetime of the session and is dropped with
//! it, so a long session keeps every section it ever generated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Category;

/// The result of one generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSection {
    /// Method name the section was generated for
    pub title: String,
    /// Script body exactly as the generator returned it
    pub code: String,
    /// Caption derived from the category and method hint
    pub explanation: String,
    pub generated_at: DateTime<Utc>,
}

impl CodeSection {
    pub fn new(
        title: impl Into<String>,
        code: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            code: code.into(),
            explanation: explanation.into(),
            generated_at: Utc::now(),
        }
    }
}

/// Category id → sections, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStore {
    sections: BTreeMap<Category, Vec<CodeSection>>,
}

impl GenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a section at the head of its category's history
    pub fn prepend(&mut self, category: Category, section: CodeSection) {
        self.sections.entry(category).or_default().insert(0, section);
    }

    /// Sections of a category, newest first
    pub fn sections(&self, category: Category) -> &[CodeSection] {
        self.sections
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self, category: Category) -> usize {
        self.sections(category).len()
    }

    pub fn total(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_keeps_newest_first() {
        let mut store = GenerationStore::new();
        store.prepend(Category::Benchmark, CodeSection::new("OLS Baseline", "reg y x", "first"));
        store.prepend(Category::Benchmark, CodeSection::new("OLS Baseline", "reg y x", "second"));

        let sections = store.sections(Category::Benchmark);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].explanation, "second");
        assert_eq!(sections[1].explanation, "first");
    }

    #[test]
    fn test_categories_are_independent() {
        let mut store = GenerationStore::new();
        store.prepend(Category::Basic, CodeSection::new("Descriptive Statistics", "sum", ""));

        assert_eq!(store.len(Category::Basic), 1);
        assert_eq!(store.len(Category::Hetero), 0);
        assert!(store.sections(Category::Endo).is_empty());
        assert_eq!(store.total(), 1);
        assert!(!store.is_empty());
    }
}
