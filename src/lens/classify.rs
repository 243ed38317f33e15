//! Classifier: one post's text -> immutable tag record
//!
//! Evaluates every catalog entry exactly once. No error conditions: a missing
//! match is simply `false` or an empty facet list.

use serde::{Deserialize, Serialize};

use crate::lens::catalog::{BinaryFlag, FacetCategory, PatternCatalog};

/// Derived classification of one post
///
/// Facet lists hold value names in catalog order, so identical text always
/// yields an identical record.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostTags {
    pub remote: bool,
    pub onsite: bool,
    pub salary: bool,
    pub exclusive: bool,
    pub stacks: Vec<String>,
    pub employment_types: Vec<String>,
    pub seniorities: Vec<String>,
    pub role_types: Vec<String>,
}

impl PostTags {
    pub fn flag(&self, flag: BinaryFlag) -> bool {
        match flag {
            BinaryFlag::Remote => self.remote,
            BinaryFlag::Onsite => self.onsite,
            BinaryFlag::Salary => self.salary,
            BinaryFlag::Exclusive => self.exclusive,
        }
    }

    pub fn facet(&self, category: FacetCategory) -> &[String] {
        match category {
            FacetCategory::TechnologyStack => &self.stacks,
            FacetCategory::EmploymentType => &self.employment_types,
            FacetCategory::SeniorityLevel => &self.seniorities,
            FacetCategory::RoleType => &self.role_types,
        }
    }

    fn facet_mut(&mut self, category: FacetCategory) -> &mut Vec<String> {
        match category {
            FacetCategory::TechnologyStack => &mut self.stacks,
            FacetCategory::EmploymentType => &mut self.employment_types,
            FacetCategory::SeniorityLevel => &mut self.seniorities,
            FacetCategory::RoleType => &mut self.role_types,
        }
    }
}

/// Applies a PatternCatalog to post text
#[derive(Clone, Copy)]
pub struct Classifier<'c> {
    catalog: &'c PatternCatalog,
}

impl Default for Classifier<'static> {
    fn default() -> Self {
        Self::new(PatternCatalog::shared())
    }
}

impl<'c> Classifier<'c> {
    pub fn new(catalog: &'c PatternCatalog) -> Self {
        Self { catalog }
    }

    /// Classify original-case text (matchers are case-insensitive)
    pub fn classify(&self, text: &str) -> PostTags {
        let mut tags = PostTags {
            remote: self.catalog.binary(BinaryFlag::Remote).is_match(text),
            onsite: self.catalog.binary(BinaryFlag::Onsite).is_match(text),
            salary: self.catalog.binary(BinaryFlag::Salary).is_match(text),
            exclusive: self.catalog.binary(BinaryFlag::Exclusive).is_match(text),
            ..PostTags::default()
        };

        for category in FacetCategory::ALL {
            let values = self
                .catalog
                .facet(category)
                .iter()
                .filter(|m| m.is_match(text))
                .map(|m| m.name().to_string());
            tags.facet_mut(category).extend(values);
        }

        tags
    }
}
