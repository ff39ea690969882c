use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Supply chosen by industry/category fit scoring.
    CategoryFit,
    /// Legacy fallback: first routable supply, fit ignored.
    FirstAvailable,
    /// Proposed or re-scored by the optional secondary matcher.
    Enhanced,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CategoryFit => write!(f, "category_fit"),
            Self::FirstAvailable => write!(f, "first_available"),
            Self::Enhanced => write!(f, "enhanced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub demand_id: String,
    pub supply_id: String,
    pub demand_domain: String,
    pub supply_domain: String,
    pub confidence: f64,
    pub match_type: MatchType,
    pub reason: String,
    pub evidence: Vec<Evidence>,
}

impl MatchResult {
    /// `(demand_id, supply_id)`, the identity of a pairing.
    pub fn pair(&self) -> (&str, &str) {
        (&self.demand_id, &self.supply_id)
    }
}
