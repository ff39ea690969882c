// Mode policies: per-mode vocabulary, evidence rules and industry lists.
// Read-only once loaded; the copy gate and matcher only ever borrow them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use routegrid_core::EvidenceType;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyProfile {
    /// Mode list plus the built-in hype list
    #[default]
    Strict,
    /// Mode list only
    Broad,
    /// Mode list only, with `allowed_vocabulary` carving out exceptions
    Custom,
}

impl std::fmt::Display for VocabularyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Broad => write!(f, "broad"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A claim word gated on evidence.
///
/// Any of `words` appearing in copy requires at least one of `requires` in
/// the evidence set supplied with the copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRule {
    pub claim: String,
    pub words: Vec<String>,
    pub requires: Vec<EvidenceType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModePolicy {
    /// Filled from the `[modes.<id>]` table key.
    #[serde(skip)]
    pub id: String,
    pub vocabulary_profile: VocabularyProfile,
    pub allowed_vocabulary: Vec<String>,
    pub forbidden_vocabulary: Vec<String>,
    pub evidence_rules: Vec<EvidenceRule>,
    pub industry_allow: Vec<String>,
    pub industry_deny: Vec<String>,
    pub default_titles: Vec<String>,
}

impl ModePolicy {
    /// Forbidden words with allowed exceptions removed (custom profile only).
    pub fn effective_forbidden(&self) -> Vec<&str> {
        self.forbidden_vocabulary
            .iter()
            .filter(|w| {
                self.vocabulary_profile != VocabularyProfile::Custom
                    || !self
                        .allowed_vocabulary
                        .iter()
                        .any(|a| a.eq_ignore_ascii_case(w))
            })
            .map(String::as_str)
            .collect()
    }

    pub fn is_industry_denied(&self, industry: &str) -> bool {
        contains_ci(&self.industry_deny, industry)
    }

    pub fn is_industry_allowed(&self, industry: &str) -> bool {
        contains_ci(&self.industry_allow, industry)
    }
}

fn contains_ci(list: &[String], value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !value.is_empty()
        && list.iter().any(|entry| {
            let entry = entry.trim().to_lowercase();
            value == entry || value.contains(&entry)
        })
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Read-only lookup of mode policies by id.
pub trait ModePolicySource: Send + Sync {
    fn policy(&self, mode: &str) -> Option<&ModePolicy>;

    fn mode_ids(&self) -> Vec<&str>;

    fn require(&self, mode: &str) -> Result<&ModePolicy, ConfigError> {
        self.policy(mode)
            .ok_or_else(|| ConfigError::UnknownMode(mode.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TOML-backed policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModePolicies {
    #[serde(default)]
    modes: BTreeMap<String, ModePolicy>,
}

const BUILTIN_POLICIES: &str = r#"
[modes.recruiting]
vocabulary_profile = "strict"
forbidden_vocabulary = ["guarantee", "guaranteed", "cheap", "desperate", "urgent"]
industry_allow = ["staffing", "recruiting", "talent", "human resources"]
industry_deny = ["gambling", "tobacco"]
default_titles = ["Head of Talent", "VP People", "Recruiting Manager", "Founder"]

[[modes.recruiting.evidence_rules]]
claim = "funding"
words = ["funded", "funding", "series a", "series b", "investors"]
requires = ["funding"]

[[modes.recruiting.evidence_rules]]
claim = "open roles"
words = ["open roles", "job openings", "openings", "job posts"]
requires = ["job_postings", "operator_attested"]

[[modes.recruiting.evidence_rules]]
claim = "team growth"
words = ["headcount", "team growth", "doubled the team"]
requires = ["headcount_growth"]

[modes.partnerships]
vocabulary_profile = "broad"
forbidden_vocabulary = ["guarantee", "exclusive deal", "kickback"]
industry_allow = ["software", "saas", "agency", "consulting", "marketing"]
industry_deny = ["gambling"]
default_titles = ["Head of Partnerships", "VP Business Development", "Founder", "CEO"]

[[modes.partnerships.evidence_rules]]
claim = "launch"
words = ["launch", "new product", "just released"]
requires = ["product_launch", "press_coverage"]

[[modes.partnerships.evidence_rules]]
claim = "partnership"
words = ["partnered", "partnership with", "integration with"]
requires = ["partnership"]

[[modes.partnerships.evidence_rules]]
claim = "leadership"
words = ["new ceo", "new cto", "appointed", "joined as"]
requires = ["leadership_change"]
"#;

impl ModePolicies {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let mut policies: ModePolicies =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        for (id, policy) in policies.modes.iter_mut() {
            policy.id = id.clone();
        }
        policies.validate()?;
        Ok(policies)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let policies = Self::from_toml(&contents)?;
        log::debug!(
            "loaded {} mode policies from {}",
            policies.modes.len(),
            path.display()
        );
        Ok(policies)
    }

    /// Built-in `recruiting` and `partnerships` modes.
    pub fn builtin() -> &'static ModePolicies {
        static BUILTIN: OnceLock<ModePolicies> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            ModePolicies::from_toml(BUILTIN_POLICIES).expect("built-in mode policies")
        })
    }

    /// Built-ins overlaid with `other`; modes in `other` replace same-id built-ins.
    pub fn with_overrides(other: ModePolicies) -> ModePolicies {
        let mut merged = Self::builtin().clone();
        merged.modes.extend(other.modes);
        merged
    }

    /// A copy holding only `mode`.
    pub fn subset(&self, mode: &str) -> Option<ModePolicies> {
        let policy = self.modes.get(mode)?;
        Some(ModePolicies {
            modes: [(mode.to_string(), policy.clone())].into_iter().collect(),
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, policy) in &self.modes {
            if id.trim().is_empty() {
                return Err(ConfigError::Validation("mode id must not be empty".into()));
            }
            for rule in &policy.evidence_rules {
                if rule.words.iter().all(|w| w.trim().is_empty()) {
                    return Err(ConfigError::Validation(format!(
                        "mode '{id}': evidence rule '{}' has no words",
                        rule.claim
                    )));
                }
                if rule.requires.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "mode '{id}': evidence rule '{}' requires no evidence type",
                        rule.claim
                    )));
                }
            }
            if let Some(both) = policy
                .industry_allow
                .iter()
                .find(|a| contains_ci(&policy.industry_deny, a))
            {
                return Err(ConfigError::Validation(format!(
                    "mode '{id}': industry '{both}' is both allowed and denied"
                )));
            }
        }
        Ok(())
    }
}

impl ModePolicySource for ModePolicies {
    fn policy(&self, mode: &str) -> Option<&ModePolicy> {
        self.modes.get(mode)
    }

    fn mode_ids(&self) -> Vec<&str> {
        self.modes.keys().map(String::as_str).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
