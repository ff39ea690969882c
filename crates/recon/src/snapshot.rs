//! Immutable per-run records and the bounded history that holds them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use routegrid_core::{BlockReason, CanonicalEntity, EntityType, IntroDraft, MatchResult};
use routegrid_ingest::MappingSpec;
use serde::{Deserialize, Serialize};

use crate::events::Metrics;
use crate::model::Readiness;
use crate::parity::ParityStatus;

/// Everything one run produced. Built once at the end of a run and shared
/// behind an `Arc`; there are no mutating methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSnapshot {
    pub run_id: String,
    pub mode: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub demand_mapping: MappingSpec,
    pub supply_mapping: MappingSpec,
    /// Demand entities then supply entities, each side in input order.
    pub entities: Vec<CanonicalEntity>,
    pub matches: Vec<MatchResult>,
    #[serde(default)]
    pub supplemental_matches: Vec<MatchResult>,
    /// Entities that completed contact resolution.
    pub ready: Vec<CanonicalEntity>,
    pub blocked: Vec<BlockReason>,
    pub intros: Vec<IntroDraft>,
    pub readiness: BTreeMap<String, Readiness>,
    pub metrics: Metrics,
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<ParityStatus>,
}

impl PipelineRunSnapshot {
    pub fn entities_of(&self, kind: EntityType) -> impl Iterator<Item = &CanonicalEntity> {
        self.entities.iter().filter(move |e| e.entity_type == kind)
    }

    pub fn entity(&self, entity_id: &str) -> Option<&CanonicalEntity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    pub fn fatal(&self) -> impl Iterator<Item = &BlockReason> {
        self.blocked.iter().filter(|b| b.is_fatal())
    }

    /// Ready entity count per side: `(demand, supply)`.
    pub fn ready_counts(&self) -> (usize, usize) {
        let demand = self.ready.iter().filter(|e| e.entity_type == EntityType::Demand).count();
        (demand, self.ready.len() - demand)
    }
}

/// Most-recent-N snapshots, oldest first.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    capacity: usize,
    entries: VecDeque<Arc<PipelineRunSnapshot>>,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Append, evicting the oldest entry when full.
    pub fn push(&mut self, snapshot: Arc<PipelineRunSnapshot>) {
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                log::debug!("snapshot history full, evicting run {}", evicted.run_id);
            }
        }
        self.entries.push_back(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<PipelineRunSnapshot>> {
        self.entries.back().cloned()
    }

    pub fn get(&self, run_id: &str) -> Option<Arc<PipelineRunSnapshot>> {
        self.entries.iter().find(|s| s.run_id == run_id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PipelineRunSnapshot>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
