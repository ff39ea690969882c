use serde::{Deserialize, Serialize};

use crate::block::BlockCode;

/// Stable copy-validation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    PresignalRequired,
    TooShort,
    TooLong,
    MissingGreeting,
    TooFewSentences,
    TooManySentences,
    LaneCrossing,
    ForbiddenWord,
    EvidenceRequired,
    ActivityLanguage,
    UnknownMode,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::PresignalRequired => "PRESIGNAL_REQUIRED",
            FailureCode::TooShort => "TOO_SHORT",
            FailureCode::TooLong => "TOO_LONG",
            FailureCode::MissingGreeting => "MISSING_GREETING",
            FailureCode::TooFewSentences => "TOO_FEW_SENTENCES",
            FailureCode::TooManySentences => "TOO_MANY_SENTENCES",
            FailureCode::LaneCrossing => "LANE_CROSSING",
            FailureCode::ForbiddenWord => "FORBIDDEN_WORD",
            FailureCode::EvidenceRequired => "EVIDENCE_REQUIRED",
            FailureCode::ActivityLanguage => "ACTIVITY_LANGUAGE",
            FailureCode::UnknownMode => "UNKNOWN_MODE",
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FailureCode::TooShort
                | FailureCode::TooLong
                | FailureCode::MissingGreeting
                | FailureCode::TooFewSentences
                | FailureCode::TooManySentences
        )
    }

    /// Block code recorded when a draft fails with this code.
    pub fn block_code(&self) -> BlockCode {
        match self {
            FailureCode::PresignalRequired | FailureCode::ActivityLanguage => {
                BlockCode::PresignalRequired
            }
            FailureCode::LaneCrossing => BlockCode::LaneCrossing,
            FailureCode::ForbiddenWord | FailureCode::UnknownMode => BlockCode::ForbiddenWord,
            FailureCode::EvidenceRequired => BlockCode::EvidenceRequired,
            FailureCode::TooShort
            | FailureCode::TooLong
            | FailureCode::MissingGreeting
            | FailureCode::TooFewSentences
            | FailureCode::TooManySentences => BlockCode::StructuralViolation,
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, user-facing validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub code: FailureCode,
    pub message: String,
    pub explanation: String,
    pub how_to_fix: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl ValidationFailure {
    pub fn new(
        code: FailureCode,
        message: impl Into<String>,
        explanation: impl Into<String>,
        how_to_fix: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            explanation: explanation.into(),
            how_to_fix: how_to_fix.into(),
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}
