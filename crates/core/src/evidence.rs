use serde::{Deserialize, Serialize};

/// Field-level provenance: where a derived value came from and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Canonical field the value was assigned to (e.g. `company.domain`).
    pub field: String,
    pub value: String,
    /// Structural path inside the raw item (e.g. `$.raw.website`).
    pub source_path: String,
    /// Extractor that produced the value (`legacy_website`, `mapping`, ...).
    pub extractor: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

impl Evidence {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        source_path: impl Into<String>,
        extractor: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            source_path: source_path.into(),
            extractor: extractor.into(),
            confidence,
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternatives = alternatives;
        self
    }
}

/// Kinds of supporting evidence an operator can attach to outreach copy.
/// Claim words in copy are gated on the presence of a matching type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Funding,
    JobPostings,
    HeadcountGrowth,
    ProductLaunch,
    LeadershipChange,
    PressCoverage,
    Partnership,
    OperatorAttested,
}

impl EvidenceType {
    pub const ALL: [EvidenceType; 8] = [
        EvidenceType::Funding,
        EvidenceType::JobPostings,
        EvidenceType::HeadcountGrowth,
        EvidenceType::ProductLaunch,
        EvidenceType::LeadershipChange,
        EvidenceType::PressCoverage,
        EvidenceType::Partnership,
        EvidenceType::OperatorAttested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::Funding => "funding",
            EvidenceType::JobPostings => "job_postings",
            EvidenceType::HeadcountGrowth => "headcount_growth",
            EvidenceType::ProductLaunch => "product_launch",
            EvidenceType::LeadershipChange => "leadership_change",
            EvidenceType::PressCoverage => "press_coverage",
            EvidenceType::Partnership => "partnership",
            EvidenceType::OperatorAttested => "operator_attested",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == needle)
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
