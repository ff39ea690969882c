//! Stage-by-stage regression diff between a reference run and a candidate
//! pipeline run, and the tracker that decides when parity is stable.
//!
//! The diff is asymmetric: the pipeline's keys must be a subset of the
//! reference's. Reference-only keys are tolerated fallback noise; any
//! pipeline-only key breaks parity for its stage.

use std::collections::{BTreeSet, HashMap};

use routegrid_core::CanonicalEntity;
use serde::{Deserialize, Serialize};

use crate::snapshot::PipelineRunSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityStage {
    Entities,
    Matches,
    Ready,
    Intros,
}

impl ParityStage {
    pub const ALL: [ParityStage; 4] = [
        ParityStage::Entities,
        ParityStage::Matches,
        ParityStage::Ready,
        ParityStage::Intros,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParityStage::Entities => "entities",
            ParityStage::Matches => "matches",
            ParityStage::Ready => "ready",
            ParityStage::Intros => "intros",
        }
    }
}

impl std::fmt::Display for ParityStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Comparable keys per stage. Entities and ready entities are keyed
/// `type:domain`; matches and intros `demandDomain->supplyDomain`. Entity ids
/// are not used because a reference run may hash them differently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityView {
    pub entities: BTreeSet<String>,
    pub matches: BTreeSet<String>,
    pub ready: BTreeSet<String>,
    pub intros: BTreeSet<String>,
}

fn entity_key(e: &CanonicalEntity) -> String {
    format!("{}:{}", e.entity_type.as_str(), e.label().to_lowercase())
}

fn pair_key(demand: &str, supply: &str) -> String {
    format!("{}->{}", demand.to_lowercase(), supply.to_lowercase())
}

impl ParityView {
    pub fn from_snapshot(snapshot: &PipelineRunSnapshot) -> Self {
        let labels: HashMap<&str, &str> = snapshot
            .entities
            .iter()
            .map(|e| (e.entity_id.as_str(), e.label()))
            .collect();
        let label = |id: &str| labels.get(id).copied().unwrap_or(id).to_string();

        Self {
            entities: snapshot.entities.iter().map(entity_key).collect(),
            matches: snapshot
                .matches
                .iter()
                .map(|m| pair_key(&m.demand_domain, &m.supply_domain))
                .collect(),
            ready: snapshot.ready.iter().map(entity_key).collect(),
            intros: snapshot
                .intros
                .iter()
                .map(|i| pair_key(&label(&i.demand_entity_id), &label(&i.supply_entity_id)))
                .collect(),
        }
    }

    pub fn keys(&self, stage: ParityStage) -> &BTreeSet<String> {
        match stage {
            ParityStage::Entities => &self.entities,
            ParityStage::Matches => &self.matches,
            ParityStage::Ready => &self.ready,
            ParityStage::Intros => &self.intros,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageParity {
    pub stage: ParityStage,
    pub reference_count: usize,
    pub pipeline_count: usize,
    /// Keys the pipeline produced that the reference did not. Non-empty
    /// means the stage diverged.
    pub pipeline_only: Vec<String>,
    /// Tolerated.
    pub reference_only: Vec<String>,
}

impl StageParity {
    pub fn ok(&self) -> bool {
        self.pipeline_only.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityReport {
    pub stages: Vec<StageParity>,
    pub first_divergence: Option<ParityStage>,
}

impl ParityReport {
    pub fn ok(&self) -> bool {
        self.first_divergence.is_none()
    }

    pub fn stage(&self, stage: ParityStage) -> Option<&StageParity> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Diff `pipeline` against `reference`, stage by stage in pipeline order.
pub fn compare(reference: &ParityView, pipeline: &ParityView) -> ParityReport {
    let stages: Vec<StageParity> = ParityStage::ALL
        .iter()
        .map(|&stage| {
            let r = reference.keys(stage);
            let p = pipeline.keys(stage);
            StageParity {
                stage,
                reference_count: r.len(),
                pipeline_count: p.len(),
                pipeline_only: p.difference(r).cloned().collect(),
                reference_only: r.difference(p).cloned().collect(),
            }
        })
        .collect();
    let first_divergence = stages.iter().find(|s| !s.ok()).map(|s| s.stage);
    if let Some(stage) = first_divergence {
        log::warn!("parity diverged at {stage}");
    }
    ParityReport {
        stages,
        first_divergence,
    }
}

pub fn compare_snapshots(reference: &PipelineRunSnapshot, pipeline: &PipelineRunSnapshot) -> ParityReport {
    compare(
        &ParityView::from_snapshot(reference),
        &ParityView::from_snapshot(pipeline),
    )
}

// ---------------------------------------------------------------------------
// Stability
// ---------------------------------------------------------------------------

/// Parity state attached to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParityStatus {
    pub ok: bool,
    pub first_divergence: Option<ParityStage>,
    pub consecutive_ok: u32,
    pub stable: bool,
}

/// Counts consecutive fully-parity runs. Any divergence resets the count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityTracker {
    stable_after: u32,
    consecutive_ok: u32,
}

impl StabilityTracker {
    pub fn new(stable_after: u32) -> Self {
        Self {
            stable_after: stable_after.max(1),
            consecutive_ok: 0,
        }
    }

    pub fn record(&mut self, report: &ParityReport) -> ParityStatus {
        if report.ok() {
            self.consecutive_ok = self.consecutive_ok.saturating_add(1);
        } else {
            self.consecutive_ok = 0;
        }
        ParityStatus {
            ok: report.ok(),
            first_divergence: report.first_divergence,
            consecutive_ok: self.consecutive_ok,
            stable: self.is_stable(),
        }
    }

    pub fn is_stable(&self) -> bool {
        self.consecutive_ok >= self.stable_after
    }

    pub fn consecutive_ok(&self) -> u32 {
        self.consecutive_ok
    }

    pub fn reset(&mut self) {
        self.consecutive_ok = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(entities: &[&str], matches: &[&str]) -> ParityView {
        ParityView {
            entities: entities.iter().map(|s| s.to_string()).collect(),
            matches: matches.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn subset_holds() {
        let report = compare(&view(&["a", "b", "c"], &[]), &view(&["a", "b"], &[]));
        assert!(report.ok());
        let entities = report.stage(ParityStage::Entities).unwrap();
        assert_eq!(entities.reference_only, vec!["c"]);
        assert!(entities.ok());
    }

    #[test]
    fn pipeline_only_fails() {
        let report = compare(&view(&["a", "b", "c"], &[]), &view(&["a", "b", "d"], &[]));
        assert!(!report.ok());
        assert_eq!(report.first_divergence, Some(ParityStage::Entities));
        assert_eq!(report.stage(ParityStage::Entities).unwrap().pipeline_only, vec!["d"]);
    }

    #[test]
    fn first_divergence_is_earliest_stage() {
        let reference = view(&["a"], &["a->x"]);
        let pipeline = view(&["a"], &["a->y"]);
        let report = compare(&reference, &pipeline);
        assert_eq!(report.first_divergence, Some(ParityStage::Matches));
    }

    #[test]
    fn stability_needs_consecutive_runs() {
        let ok = compare(&view(&["a"], &[]), &view(&["a"], &[]));
        let bad = compare(&view(&["a"], &[]), &view(&["b"], &[]));
        let mut tracker = StabilityTracker::new(3);

        assert!(!tracker.record(&ok).stable);
        assert!(!tracker.record(&ok).stable);
        let status = tracker.record(&bad);
        assert!(!status.ok);
        assert_eq!(status.consecutive_ok, 0);

        for _ in 0..2 {
            assert!(!tracker.record(&ok).stable);
        }
        let status = tracker.record(&ok);
        assert!(status.stable);
        assert_eq!(status.consecutive_ok, 3);
    }

    #[test]
    fn snapshot_view_keys_by_domain() {
        use routegrid_core::{CompanyInfo, EntityType, IntroDraft, IntroSource, MatchResult, MatchType, SourceInfo};

        let entity = |id: &str, kind, domain: &str| CanonicalEntity {
            entity_id: id.into(),
            entity_type: kind,
            company: CompanyInfo {
                domain: Some(domain.into()),
                ..Default::default()
            },
            person: Default::default(),
            contacts: Default::default(),
            source: SourceInfo {
                provider: "p".into(),
                dataset_type: "d".into(),
                source_id: None,
                raw_index: 0,
            },
            confidence: Default::default(),
            evidence: Vec::new(),
            raw: serde_json::Value::Null,
            needs_enrichment: false,
        };
        let mut snap = crate::snapshot::tests::empty_snapshot("r1");
        snap.entities = vec![
            entity("d1", EntityType::Demand, "acme.com"),
            entity("s1", EntityType::Supply, "recruiters.io"),
        ];
        snap.matches = vec![MatchResult {
            demand_id: "d1".into(),
            supply_id: "s1".into(),
            demand_domain: "acme.com".into(),
            supply_domain: "recruiters.io".into(),
            confidence: 0.3,
            match_type: MatchType::FirstAvailable,
            reason: String::new(),
            evidence: Vec::new(),
        }];
        snap.intros = vec![IntroDraft {
            demand_entity_id: "d1".into(),
            supply_entity_id: "s1".into(),
            subject: String::new(),
            body: String::new(),
            tone: String::new(),
            generated_at: chrono::Utc::now(),
            source: IntroSource::Template,
            match_rationale: String::new(),
            evidence_refs: Vec::new(),
        }];

        let v = ParityView::from_snapshot(&snap);
        assert!(v.entities.contains("demand:acme.com"));
        assert!(v.entities.contains("supply:recruiters.io"));
        assert!(v.matches.contains("acme.com->recruiters.io"));
        assert!(v.intros.contains("acme.com->recruiters.io"));
        assert!(compare_snapshots(&snap, &snap).ok());
    }
}
