use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use routegrid_config::{ConfigError, ModePolicySource, Settings};
use routegrid_core::{BlockReason, CanonicalEntity, EntityType};
use routegrid_gate::CopyValidator;
use routegrid_ingest::{discover, draft_mapping, map_items, DiscoveryOptions, MapperContext, MappingSpec};
use serde_json::json;

use crate::cache::DecisionMakerCache;
use crate::collaborators::Collaborators;
use crate::contact::ContactStage;
use crate::events::{EventKind, EventLog};
use crate::intro::{IntroCache, IntroGenerator};
use crate::matcher::match_entities;
use crate::model::{DatasetInput, PipelineStage, Readiness, RunRequest, StageProgress};
use crate::parity::{compare_snapshots, ParityReport, StabilityTracker};
use crate::resolve::resolve_domains;
use crate::snapshot::{PipelineRunSnapshot, SnapshotHistory};

/// Result of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot: Arc<PipelineRunSnapshot>,
    pub events: EventLog,
    /// Pipeline-fatal block reasons (cardinality). Also present in
    /// `snapshot.blocked`.
    pub fatal: Vec<BlockReason>,
    /// Present when the run was compared against a reference.
    pub parity: Option<ParityReport>,
}

impl RunOutcome {
    pub fn is_fatal(&self) -> bool {
        !self.fatal.is_empty()
    }
}

/// Sequences map → resolve → match → contact → intro over whole batches.
///
/// The decision-maker and intro caches are borrowed so their lifetime is the
/// caller's choice (per run, per process). History and the parity stability
/// counter live as long as the pipeline.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    policies: &'a dyn ModePolicySource,
    collaborators: Collaborators,
    cache: &'a DecisionMakerCache,
    intros: &'a IntroCache,
    history: RwLock<SnapshotHistory>,
    stability: Mutex<StabilityTracker>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        policies: &'a dyn ModePolicySource,
        cache: &'a DecisionMakerCache,
        intros: &'a IntroCache,
    ) -> Self {
        Self {
            settings,
            policies,
            collaborators: Collaborators::disabled(),
            cache,
            intros,
            history: RwLock::new(SnapshotHistory::new(settings.history.capacity)),
            stability: Mutex::new(StabilityTracker::new(settings.parity.stable_after)),
        }
    }

    /// Install collaborators, each wrapped with the configured per-call
    /// deadline (`timeout_secs = 0` disables the deadline).
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        let secs = self.settings.collaborators.timeout_secs;
        self.collaborators = if secs == 0 {
            collaborators
        } else {
            collaborators.with_deadline(
                Duration::from_secs(secs),
                self.settings.collaborators.max_in_flight,
            )
        };
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn history(&self) -> Vec<Arc<PipelineRunSnapshot>> {
        self.history.read().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Arc<PipelineRunSnapshot>> {
        self.history.read().latest()
    }

    pub fn consecutive_parity(&self) -> u32 {
        self.stability.lock().consecutive_ok()
    }

    pub fn is_parity_stable(&self) -> bool {
        self.stability.lock().is_stable()
    }

    /// Run every stage over the batch. Per-entity problems end up as block
    /// reasons in the snapshot; only an unknown mode is an `Err`.
    pub fn run(
        &self,
        request: &RunRequest,
        reference: Option<&PipelineRunSnapshot>,
        mut progress: impl FnMut(&StageProgress),
    ) -> Result<RunOutcome, ConfigError> {
        let policy = self.policies.require(&request.mode)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut events = EventLog::new();
        let mut blocked: Vec<BlockReason> = Vec::new();
        let max_in_flight = self.settings.collaborators.max_in_flight;
        log::info!(
            "run {run_id}: mode={} demand_items={} supply_items={}",
            request.mode,
            request.demand.items.len(),
            request.supply.items.len()
        );

        let mut report = |events: &mut EventLog, stage: PipelineStage| {
            events.emit(stage.as_str(), EventKind::StageFinished, format!("{stage} finished"), json!(null));
            let counts = events
                .metrics
                .for_stage(stage.as_str())
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            progress(&StageProgress {
                stage,
                index: stage_index(stage),
                total: PipelineStage::ALL.len(),
                counts,
            });
        };

        // Map
        events.emit("map", EventKind::StageStarted, "mapping items", json!(null));
        let discovery = DiscoveryOptions {
            sample_size: self.settings.discovery.sample_size,
            max_depth: self.settings.discovery.max_depth,
            max_samples_per_path: self.settings.discovery.max_samples_per_path,
            top_candidates: self.settings.discovery.top_candidates,
        };
        let (demand_mapping, demand) =
            self.map_side(&request.demand, EntityType::Demand, &discovery, &mut events, &mut blocked);
        let (supply_mapping, supply) =
            self.map_side(&request.supply, EntityType::Supply, &discovery, &mut events, &mut blocked);
        report(&mut events, PipelineStage::Map);

        // Resolve
        events.emit("resolve", EventKind::StageStarted, "resolving missing domains", json!(null));
        let mut sides = Vec::with_capacity(2);
        for entities in [demand, supply] {
            let out = resolve_domains(entities, self.collaborators.enricher.as_ref(), max_in_flight);
            events.metrics.add("resolve.attempted", out.stats.attempted as u64);
            events.metrics.add("resolve.resolved", out.stats.resolved as u64);
            events.metrics.add("resolve.unresolved", out.stats.unresolved as u64);
            events.metrics.add("resolve.failed", out.stats.failed as u64);
            record_blocks(&mut events, &mut blocked, "resolve", out.blocks);
            sides.push(out.entities);
        }
        let supply = sides.pop().unwrap_or_default();
        let demand = sides.pop().unwrap_or_default();
        report(&mut events, PipelineStage::Resolve);

        // Match
        events.emit("match", EventKind::StageStarted, "matching demand to supply", json!(null));
        let matched = match_entities(
            &demand,
            &supply,
            self.settings.matching.strategy,
            Some(policy),
            self.collaborators.enhancer.as_ref(),
        );
        events.metrics.add("match.routable_demand", matched.routable_demand as u64);
        events.metrics.add("match.routable_supply", matched.routable_supply as u64);
        events.metrics.add("match.matches", matched.matches.len() as u64);
        events.metrics.add("match.supplemental", matched.supplemental.len() as u64);
        events.metrics.add("match.rescored", matched.rescored as u64);
        for m in &matched.matches {
            events.metrics.incr(&format!("match.{}", m.match_type));
        }
        let fatal: Vec<BlockReason> = matched.fatal().cloned().collect();
        record_blocks(&mut events, &mut blocked, "match", matched.blocks);
        report(&mut events, PipelineStage::Match);

        // Contact
        events.emit("contact", EventKind::StageStarted, "completing contacts", json!(null));
        let contact = ContactStage {
            cache: self.cache,
            verifier: self.collaborators.verifier.as_ref(),
            finder: self.collaborators.finder.as_ref(),
            default_titles: &policy.default_titles,
            max_in_flight,
        };
        let demand_ids: Vec<&str> = matched.matches.iter().map(|m| m.demand_id.as_str()).collect();
        let supply_ids: Vec<&str> = matched.matches.iter().map(|m| m.supply_id.as_str()).collect();
        let mut ready: Vec<CanonicalEntity> = Vec::new();
        for (entities, ids) in [(&demand, &demand_ids), (&supply, &supply_ids)] {
            let out = contact.complete(&select_in_order(entities, ids));
            let s = &out.stats;
            events.metrics.add("contact.processed", s.processed as u64);
            events.metrics.add("contact.cache_hits", s.cache_hits as u64);
            events.metrics.add("contact.invalid_dropped", s.invalid_dropped as u64);
            events.metrics.add("contact.verified", s.verified as u64);
            events.metrics.add("contact.discovery_attempts", s.discovery_attempts as u64);
            events.metrics.add("contact.discovered", s.discovered as u64);
            events.metrics.add("contact.ready", s.ready as u64);
            events.metrics.add("contact.blocked", s.blocked as u64);
            record_blocks(&mut events, &mut blocked, "contact", out.blocks);
            ready.extend(out.ready);
        }
        report(&mut events, PipelineStage::Contact);

        // Intro
        events.emit("intro", EventKind::StageStarted, "drafting intros", json!(null));
        let validator = CopyValidator::new(self.policies)
            .strict(self.settings.copy.strict_mode)
            .min_presignal_chars(self.settings.copy.min_presignal_chars);
        let generator = IntroGenerator {
            cache: self.intros,
            writer: self.collaborators.writer.as_ref(),
            validator: &validator,
            mode: &request.mode,
            presignal: request.presignal.as_deref(),
            evidence: &request.evidence,
        };
        let (ready_demand, ready_supply): (Vec<CanonicalEntity>, Vec<CanonicalEntity>) = ready
            .iter()
            .cloned()
            .partition(|e| e.entity_type == EntityType::Demand);
        let intro_out = generator.generate(&matched.matches, &ready_demand, &ready_supply);
        let st = &intro_out.stats;
        events.metrics.add("intro.drafted", intro_out.intros.len() as u64);
        events.metrics.add("intro.cached", st.cached as u64);
        events.metrics.add("intro.generated", st.generated as u64);
        events.metrics.add("intro.template", st.template as u64);
        events.metrics.add("intro.skipped", st.skipped as u64);
        events.metrics.add("intro.gate_blocked", st.gate_blocked as u64);
        if st.gate_fallbacks + st.writer_failures > 0 {
            events.emit(
                "intro",
                EventKind::Fallback,
                "writer output replaced by template",
                json!({"gateRejected": st.gate_fallbacks, "writerFailed": st.writer_failures}),
            );
        }
        record_blocks(&mut events, &mut blocked, "intro", intro_out.blocks);
        report(&mut events, PipelineStage::Intro);

        for f in &fatal {
            events.emit(
                f.stage.as_str(),
                EventKind::Fatal,
                format!("{}: {}", f.code, f.message),
                f.details.clone(),
            );
        }

        // Snapshot
        let mut entities = demand;
        entities.extend(supply);
        let readiness = readiness_map(&entities, &ready, &blocked);
        let mut snapshot = PipelineRunSnapshot {
            run_id: run_id.clone(),
            mode: request.mode.clone(),
            created_at: Utc::now(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            demand_mapping,
            supply_mapping,
            entities,
            matches: matched.matches,
            supplemental_matches: matched.supplemental,
            ready,
            blocked,
            intros: intro_out.intros,
            readiness,
            metrics: events.metrics.clone(),
            collaborators: self.collaborators.enabled().iter().map(|s| s.to_string()).collect(),
            parity: None,
        };

        let parity = reference.map(|r| {
            let report = compare_snapshots(r, &snapshot);
            let status = self.stability.lock().record(&report);
            events.emit(
                "parity",
                EventKind::Note,
                format!(
                    "parity {} ({} consecutive)",
                    if status.ok { "ok" } else { "diverged" },
                    status.consecutive_ok
                ),
                json!({"firstDivergence": report.first_divergence, "stable": status.stable}),
            );
            snapshot.parity = Some(status);
            report
        });
        // Events emitted after the snapshot was built still belong to the run.
        snapshot.metrics = events.metrics.clone();

        let snapshot = Arc::new(snapshot);
        self.history.write().push(Arc::clone(&snapshot));
        log::info!(
            "run {run_id} finished: {} matches, {} ready, {} intros, {} blocked",
            snapshot.matches.len(),
            snapshot.ready.len(),
            snapshot.intros.len(),
            snapshot.blocked.len()
        );

        Ok(RunOutcome {
            snapshot,
            events,
            fatal,
            parity,
        })
    }

    fn map_side(
        &self,
        input: &DatasetInput,
        entity_type: EntityType,
        discovery: &DiscoveryOptions,
        events: &mut EventLog,
        blocked: &mut Vec<BlockReason>,
    ) -> (MappingSpec, Vec<CanonicalEntity>) {
        let spec = match &input.mapping {
            Some(spec) => spec.clone(),
            None => {
                let report = discover(&input.items, discovery);
                let spec = draft_mapping(&report);
                events.emit(
                    "map",
                    EventKind::Note,
                    format!("drafted {entity_type} mapping"),
                    json!({"confidence": spec.confidence(), "sampledItems": report.sampled_items}),
                );
                spec
            }
        };
        let out = map_items(
            &input.items,
            &MapperContext {
                spec: &spec,
                entity_type,
                provider: &input.provider,
                dataset: &input.dataset,
            },
        );
        let side = entity_type.as_str();
        events.metrics.add(&format!("map.{side}_total"), out.stats.total as u64);
        events.metrics.add(&format!("map.{side}_mapped"), out.stats.mapped as u64);
        events.metrics.add("map.enrichment_ready", out.stats.enrichment_ready as u64);
        events.metrics.add("map.needs_enrichment", out.stats.needs_enrichment as u64);
        events.metrics.add("map.rejected", out.stats.rejected as u64);
        record_blocks(events, blocked, "map", out.blocks);
        (spec, out.entities)
    }
}

fn stage_index(stage: PipelineStage) -> usize {
    PipelineStage::ALL
        .iter()
        .position(|s| *s == stage)
        .map_or(0, |i| i + 1)
}

/// Append to the run's block list, with one event and one counter per code.
fn record_blocks(events: &mut EventLog, blocked: &mut Vec<BlockReason>, stage: &str, blocks: Vec<BlockReason>) {
    for b in blocks {
        events.metrics.incr(&format!("{stage}.blocked.{}", b.code));
        events.emit(stage, EventKind::Blocked, b.message.clone(), b.details.clone());
        blocked.push(b);
    }
}

/// Entities whose id appears in `ids`, deduplicated, in `ids` order.
fn select_in_order(entities: &[CanonicalEntity], ids: &[&str]) -> Vec<CanonicalEntity> {
    let mut seen: HashSet<&str> = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id))
        .filter_map(|id| entities.iter().find(|e| e.entity_id == *id).cloned())
        .collect()
}

fn readiness_map(
    entities: &[CanonicalEntity],
    ready: &[CanonicalEntity],
    blocked: &[BlockReason],
) -> BTreeMap<String, Readiness> {
    let ready_ids: HashSet<&str> = ready.iter().map(|e| e.entity_id.as_str()).collect();
    entities
        .iter()
        .map(|e| {
            let id = e.entity_id.as_str();
            let state = if ready_ids.contains(id) {
                Readiness::Ready
            } else if let Some(b) = blocked.iter().find(|b| b.entity_id() == Some(id)) {
                Readiness::Blocked { code: b.code }
            } else {
                Readiness::Unmatched
            };
            (id.to_string(), state)
        })
        .collect()
}
