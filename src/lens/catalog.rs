//! PatternCatalog - Lexical matchers for hiring-post classification
//!
//! A fixed table of case-insensitive, word-boundary-aware regexes grouped into
//! two kinds of category:
//! - BINARY: one matcher per flag (remote, onsite, salary, exclusive)
//! - FACET: value name -> matcher, a post may carry several values per facet
//!
//! # Facets
//! - stacks: go, rust, java, kotlin, python, typescript, react, aws, gcp,
//!   kubernetes, postgres, kafka
//! - employmentTypes: fulltime, parttime, contract, intern
//! - seniorities: junior, mid, senior, staff
//! - roleTypes: backend, frontend, fullstack, devops, mobile, data, security
//!
//! The catalog is built once and shared; it never depends on a single post.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ==================== TYPE DEFINITIONS ====================

/// On/off classification flags
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum BinaryFlag {
    Remote,
    Onsite,
    Salary,
    /// Listing restricted to one country's residents (US-only phrasing)
    Exclusive,
}

impl BinaryFlag {
    pub const ALL: [BinaryFlag; 4] = [
        BinaryFlag::Remote,
        BinaryFlag::Onsite,
        BinaryFlag::Salary,
        BinaryFlag::Exclusive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryFlag::Remote => "remote",
            BinaryFlag::Onsite => "onsite",
            BinaryFlag::Salary => "salary",
            BinaryFlag::Exclusive => "exclusive",
        }
    }
}

/// Multi-valued classification categories
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum FacetCategory {
    TechnologyStack,
    EmploymentType,
    SeniorityLevel,
    RoleType,
}

impl FacetCategory {
    pub const ALL: [FacetCategory; 4] = [
        FacetCategory::TechnologyStack,
        FacetCategory::EmploymentType,
        FacetCategory::SeniorityLevel,
        FacetCategory::RoleType,
    ];

    /// Key used in persisted preferences
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetCategory::TechnologyStack => "stacks",
            FacetCategory::EmploymentType => "employmentTypes",
            FacetCategory::SeniorityLevel => "seniorities",
            FacetCategory::RoleType => "roleTypes",
        }
    }

    /// Human-readable label for active-filter descriptions
    pub fn label(&self) -> &'static str {
        match self {
            FacetCategory::TechnologyStack => "Tech stacks",
            FacetCategory::EmploymentType => "Employment types",
            FacetCategory::SeniorityLevel => "Seniority levels",
            FacetCategory::RoleType => "Role types",
        }
    }

    fn index(&self) -> usize {
        match self {
            FacetCategory::TechnologyStack => 0,
            FacetCategory::EmploymentType => 1,
            FacetCategory::SeniorityLevel => 2,
            FacetCategory::RoleType => 3,
        }
    }
}

/// A named lexical matcher
#[derive(Debug, Clone)]
pub struct Matcher {
    name: &'static str,
    regex: Regex,
}

impl Matcher {
    fn compile(name: &'static str, pattern: &str) -> Self {
        // Catalog patterns are static; a bad one is a defect, not input.
        let regex = Regex::new(&format!("(?i){}", pattern))
            .unwrap_or_else(|e| panic!("catalog pattern `{}` failed to compile: {}", name, e));
        Self { name, regex }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

// ==================== DICTIONARIES ====================

const BINARY_PATTERNS: &[(BinaryFlag, &str)] = &[
    (BinaryFlag::Remote, r"\b(remote|distributed|anywhere|US hours|EU time.?zone)\b"),
    (BinaryFlag::Onsite, r"\b(onsite|on-site|hybrid)\b"),
    (BinaryFlag::Salary, r"([$€£]\s?\d{2,3}k|\b\d{2,3}k\b|\b(comp|salary|pay|ote)\b)"),
    (
        BinaryFlag::Exclusive,
        r"\b(US.only|USA.only|US.based.only|United States.only|U\.?S\.?\s+only|US.citizens?.only|US.?.work.authorization|must.be.in.the.US|must.be.based.in.the.US|US.?.location.required|US.?.residency.required|US.Remote|USA.Remote|Remote.US|Remote.USA|Remote.\(US|Remote.\(USA)\b",
    ),
];

// Tech stacks (12 values)
const STACK_PATTERNS: &[(&str, &str)] = &[
    ("go", r"\b(go|golang)\b"),
    ("rust", r"\brust\b"),
    ("java", r"\bjava\b"),
    ("kotlin", r"\bkotlin\b"),
    ("python", r"\bpython\b"),
    ("typescript", r"\b(typescript|ts)\b"),
    ("react", r"\breact\b"),
    ("aws", r"\baws\b"),
    ("gcp", r"\b(gcp|google cloud)\b"),
    ("kubernetes", r"\b(kubernetes|k8s)\b"),
    ("postgres", r"\b(postgres|postgresql)\b"),
    ("kafka", r"\bkafka\b"),
];

const EMPLOYMENT_PATTERNS: &[(&str, &str)] = &[
    ("fulltime", r"\b(FT|full.?time|full.time)\b"),
    ("parttime", r"\b(PT|part.?time|part.time)\b"),
    ("contract", r"\b(contract|contractor|consulting|freelance)\b"),
    ("intern", r"\b(intern|internship)\b"),
];

const SENIORITY_PATTERNS: &[(&str, &str)] = &[
    ("senior", r"\b(senior|sr\.?|lead)\b"),
    ("staff", r"\b(staff|principal|architect)\b"),
    ("mid", r"\b(mid.level|intermediate)\b"),
    ("junior", r"\b(junior|jr\.?|entry.level)\b"),
];

const ROLE_PATTERNS: &[(&str, &str)] = &[
    ("backend", r"\b(backend|back.end|BE|server.side)\b"),
    ("frontend", r"\b(frontend|front.end|FE|client.side)\b"),
    ("fullstack", r"\b(fullstack|full.stack|full stack)\b"),
    ("devops", r"\b(devops|sre|platform|infrastructure)\b"),
    ("mobile", r"\b(mobile|ios|android|react.native)\b"),
    ("data", r"\b(data engineer|data scientist|ML|machine learning|AI)\b"),
    ("security", r"\b(security|infosec|appsec)\b"),
];

// ==================== MAIN IMPLEMENTATION ====================

/// Compiled catalog of every binary and facet matcher
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    binary: Vec<(BinaryFlag, Matcher)>,
    /// Indexed by `FacetCategory::index`
    facets: [Vec<Matcher>; 4],
}

static SHARED: OnceLock<PatternCatalog> = OnceLock::new();

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCatalog {
    /// Compile every dictionary entry
    pub fn new() -> Self {
        let binary = BINARY_PATTERNS
            .iter()
            .map(|(flag, pattern)| (*flag, Matcher::compile(flag.as_str(), pattern)))
            .collect();

        let table = |entries: &[(&'static str, &str)]| -> Vec<Matcher> {
            entries.iter().map(|(name, pattern)| Matcher::compile(name, pattern)).collect()
        };

        Self {
            binary,
            facets: [
                table(STACK_PATTERNS),
                table(EMPLOYMENT_PATTERNS),
                table(SENIORITY_PATTERNS),
                table(ROLE_PATTERNS),
            ],
        }
    }

    /// Process-wide catalog, compiled on first use
    pub fn shared() -> &'static PatternCatalog {
        SHARED.get_or_init(PatternCatalog::new)
    }

    /// Matcher for a binary flag
    pub fn binary(&self, flag: BinaryFlag) -> &Matcher {
        // BINARY_PATTERNS covers every BinaryFlag variant
        self.binary
            .iter()
            .find(|(f, _)| *f == flag)
            .map(|(_, m)| m)
            .unwrap_or_else(|| unreachable!("no matcher for {:?}", flag))
    }

    /// Matchers for a facet, in catalog order
    pub fn facet(&self, category: FacetCategory) -> &[Matcher] {
        &self.facets[category.index()]
    }

    /// Known value names for a facet, in catalog order
    pub fn facet_values(&self, category: FacetCategory) -> Vec<&'static str> {
        self.facet(category).iter().map(Matcher::name).collect()
    }

    /// Total number of compiled matchers
    pub fn pattern_count(&self) -> usize {
        self.binary.len() + self.facets.iter().map(Vec::len).sum::<usize>()
    }
}

// ==================== TESTS ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_count() {
        let catalog = PatternCatalog::new();
        assert_eq!(catalog.pattern_count(), 4 + 12 + 4 + 4 + 7);
    }

    #[test]
    fn test_every_flag_has_a_matcher() {
        let catalog = PatternCatalog::new();
        for flag in BinaryFlag::ALL {
            assert_eq!(catalog.binary(flag).name(), flag.as_str());
        }
    }

    #[test]
    fn test_remote_is_case_insensitive() {
        let catalog = PatternCatalog::new();
        let remote = catalog.binary(BinaryFlag::Remote);
        assert!(remote.is_match("REMOTE ok"));
        assert!(remote.is_match("Fully distributed team"));
        assert!(!remote.is_match("remoteness"));
    }

    #[test]
    fn test_salary_forms() {
        let catalog = PatternCatalog::new();
        let salary = catalog.binary(BinaryFlag::Salary);
        assert!(salary.is_match("$150k base"));
        assert!(salary.is_match("€ 90k"));
        assert!(salary.is_match("120k-160k"));
        assert!(salary.is_match("Competitive salary"));
        assert!(!salary.is_match("We build compilers"));
    }

    #[test]
    fn test_exclusive_phrasings() {
        let catalog = PatternCatalog::new();
        let exclusive = catalog.binary(BinaryFlag::Exclusive);
        assert!(exclusive.is_match("Remote (US only)"));
        assert!(exclusive.is_match("REMOTE US"));
        assert!(exclusive.is_match("must be based in the US"));
        assert!(!exclusive.is_match("Remote, worldwide"));
    }

    #[test]
    fn test_stack_word_boundaries() {
        let catalog = PatternCatalog::new();
        let go = &catalog.facet(FacetCategory::TechnologyStack)[0];
        assert_eq!(go.name(), "go");
        assert!(go.is_match("We use Go and Postgres"));
        assert!(go.is_match("golang"));
        assert!(!go.is_match("Google"));
        assert!(!go.is_match("mongodb"));
    }

    #[test]
    fn test_facet_values_in_catalog_order() {
        let catalog = PatternCatalog::new();
        assert_eq!(
            catalog.facet_values(FacetCategory::SeniorityLevel),
            vec!["senior", "staff", "mid", "junior"]
        );
        assert_eq!(catalog.facet_values(FacetCategory::RoleType).len(), 7);
    }

    #[test]
    fn test_shared_is_singleton() {
        let a = PatternCatalog::shared() as *const PatternCatalog;
        let b = PatternCatalog::shared() as *const PatternCatalog;
        assert_eq!(a, b);
    }
}
