use serde::{Deserialize, Serialize};

/// Pipeline stage a block reason was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Ingest,
    Map,
    Match,
    Enrich,
    Intro,
    Copy,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "Ingest",
            Stage::Map => "Map",
            Stage::Match => "Match",
            Stage::Enrich => "Enrich",
            Stage::Intro => "Intro",
            Stage::Copy => "Copy",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable block codes. Serialized as SCREAMING_SNAKE_CASE for downstream
/// correlation; never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockCode {
    NoCompanyNameOrDomain,
    NoDomainFound,
    NoCompanyDomain,
    NoDemandAvailable,
    NoSupplyAvailable,
    CardinalityViolation,
    MatchFailed,
    NoEmailFound,
    EnrichmentFailed,
    UnknownError,
    PresignalRequired,
    ForbiddenWord,
    EvidenceRequired,
    LaneCrossing,
    StructuralViolation,
}

impl BlockCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockCode::NoCompanyNameOrDomain => "NO_COMPANY_NAME_OR_DOMAIN",
            BlockCode::NoDomainFound => "NO_DOMAIN_FOUND",
            BlockCode::NoCompanyDomain => "NO_COMPANY_DOMAIN",
            BlockCode::NoDemandAvailable => "NO_DEMAND_AVAILABLE",
            BlockCode::NoSupplyAvailable => "NO_SUPPLY_AVAILABLE",
            BlockCode::CardinalityViolation => "CARDINALITY_VIOLATION",
            BlockCode::MatchFailed => "MATCH_FAILED",
            BlockCode::NoEmailFound => "NO_EMAIL_FOUND",
            BlockCode::EnrichmentFailed => "ENRICHMENT_FAILED",
            BlockCode::UnknownError => "UNKNOWN_ERROR",
            BlockCode::PresignalRequired => "PRESIGNAL_REQUIRED",
            BlockCode::ForbiddenWord => "FORBIDDEN_WORD",
            BlockCode::EvidenceRequired => "EVIDENCE_REQUIRED",
            BlockCode::LaneCrossing => "LANE_CROSSING",
            BlockCode::StructuralViolation => "STRUCTURAL_VIOLATION",
        }
    }

    /// Invariant violations that must be surfaced, not just counted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BlockCode::CardinalityViolation)
    }
}

impl std::fmt::Display for BlockCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an entity (or a whole stage) was excluded from downstream work.
/// Append-only per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockReason {
    pub stage: Stage,
    pub code: BlockCode,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl BlockReason {
    pub fn new(stage: Stage, code: BlockCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            message: message.into(),
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach a detail field. Non-object details are replaced by an object.
    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        if !self.details.is_object() {
            self.details = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.details.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Entity this reason refers to, when it refers to a single one.
    pub fn entity_id(&self) -> Option<&str> {
        self.details.get("entityId").and_then(|v| v.as_str())
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_serializes_screaming_snake() {
        let json = serde_json::to_string(&BlockCode::NoCompanyNameOrDomain).unwrap();
        assert_eq!(json, "\"NO_COMPANY_NAME_OR_DOMAIN\"");
        assert_eq!(BlockCode::CardinalityViolation.to_string(), "CARDINALITY_VIOLATION");
    }

    #[test]
    fn details_accumulate() {
        let reason = BlockReason::new(Stage::Enrich, BlockCode::NoEmailFound, "no email")
            .with_detail("entityId", "ent_1")
            .with_detail("enrichmentAttempted", true);
        assert_eq!(reason.entity_id(), Some("ent_1"));
        assert_eq!(reason.details["enrichmentAttempted"], true);
        assert!(!reason.is_fatal());
    }

    #[test]
    fn only_cardinality_is_fatal() {
        assert!(BlockCode::CardinalityViolation.is_fatal());
        assert!(!BlockCode::NoSupplyAvailable.is_fatal());
    }
}
