use std::collections::BTreeMap;

use routegrid_core::{BlockCode, EvidenceType};
use routegrid_ingest::{ItemizeMeta, MappingSpec, RawEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One side of a run: raw items from a single provider dataset.
#[derive(Debug, Clone)]
pub struct DatasetInput {
    pub provider: String,
    pub dataset: String,
    pub items: Vec<Value>,
    /// How `items` were pulled out of the payload, when they came from one.
    pub itemize_meta: Option<ItemizeMeta>,
    /// Fixed mapping. `None` means discover and draft one from the items.
    pub mapping: Option<MappingSpec>,
}

impl DatasetInput {
    pub fn from_items(provider: impl Into<String>, dataset: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            provider: provider.into(),
            dataset: dataset.into(),
            items,
            itemize_meta: None,
            mapping: None,
        }
    }

    /// Itemize an arbitrary payload (array, object, wrapped array).
    pub fn from_payload(provider: impl Into<String>, dataset: impl Into<String>, payload: Value) -> Self {
        let provider = provider.into();
        let envelope = RawEnvelope::new(provider.as_str(), payload);
        Self {
            itemize_meta: Some(envelope.meta().clone()),
            ..Self::from_items(provider, dataset, envelope.items().to_vec())
        }
    }

    pub fn with_mapping(mut self, mapping: MappingSpec) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

/// Everything one orchestrator run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: String,
    pub demand: DatasetInput,
    pub supply: DatasetInput,
    /// Operator-supplied context for timing claims in intro copy.
    pub presignal: Option<String>,
    /// Evidence the operator attests to for this batch.
    pub evidence: Vec<EvidenceType>,
}

impl RunRequest {
    pub fn new(mode: impl Into<String>, demand: DatasetInput, supply: DatasetInput) -> Self {
        Self {
            mode: mode.into(),
            demand,
            supply,
            presignal: None,
            evidence: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stages & progress
// ---------------------------------------------------------------------------

/// Orchestrator stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Map,
    Resolve,
    Match,
    Contact,
    Intro,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Map,
        PipelineStage::Resolve,
        PipelineStage::Match,
        PipelineStage::Contact,
        PipelineStage::Intro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Map => "map",
            PipelineStage::Resolve => "resolve",
            PipelineStage::Match => "match",
            PipelineStage::Contact => "contact",
            PipelineStage::Intro => "intro",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Passed to the progress callback after each stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageProgress {
    pub stage: PipelineStage,
    /// 1-based.
    pub index: usize,
    pub total: usize,
    /// This stage's counters, without the stage prefix.
    pub counts: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Where each entity ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Readiness {
    /// Has a usable contact and a match.
    Ready,
    /// Excluded by the first block reason recorded against it.
    Blocked { code: BlockCode },
    /// Mapped and routable, but no stage produced a match or contact for it.
    Unmatched,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}
