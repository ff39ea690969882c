use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroSource {
    Template,
    Generated,
}

impl IntroSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntroSource::Template => "template",
            IntroSource::Generated => "generated",
        }
    }
}

/// A draft intro for one `(demand, supply)` pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroDraft {
    pub demand_entity_id: String,
    pub supply_entity_id: String,
    pub subject: String,
    pub body: String,
    pub tone: String,
    pub generated_at: DateTime<Utc>,
    pub source: IntroSource,
    pub match_rationale: String,
    /// Evidence `sourcePath`s that justified the match.
    pub evidence_refs: Vec<String>,
}

impl IntroDraft {
    pub fn cache_key(&self) -> (String, String) {
        (self.demand_entity_id.clone(), self.supply_entity_id.clone())
    }
}
