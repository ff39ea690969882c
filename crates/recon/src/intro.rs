//! Intro drafts per `(demand, supply)` pair.
//!
//! The optional writer is tried first; its absence, failure, or a draft the
//! copy gate rejects falls back to a deterministic template. A ready match
//! always ends up with a draft. A draft that still fails the gate (a template
//! naming a company like "Scaling Talent") is kept and reported with a
//! `Copy` block.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use parking_lot::RwLock;
use routegrid_core::{
    BlockCode, BlockReason, CanonicalEntity, EntityType, EvidenceType, IntroDraft, IntroSource,
    MatchResult, Stage,
};
use routegrid_gate::{CopyContext, CopyValidator, ValidationResult};
use serde::Serialize;

use crate::collaborators::{GeneratedIntro, IntroRequest, IntroWriter};
use crate::error::CollaboratorError;

/// Evidence source paths carried on each draft.
pub const EVIDENCE_REFS: usize = 3;

const TEMPLATE_TONE: &str = "neutral";

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Drafts keyed strictly by `(demandEntityId, supplyEntityId)`.
#[derive(Debug, Default)]
pub struct IntroCache {
    entries: RwLock<HashMap<(String, String), IntroDraft>>,
}

impl IntroCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, demand_id: &str, supply_id: &str) -> Option<IntroDraft> {
        self.entries
            .read()
            .get(&(demand_id.to_string(), supply_id.to_string()))
            .cloned()
    }

    /// First writer wins; a later insert for the same pair returns the
    /// draft already held.
    pub fn insert(&self, draft: IntroDraft) -> IntroDraft {
        self.entries
            .write()
            .entry(draft.cache_key())
            .or_insert(draft)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All drafts, ordered by pair.
    pub fn drafts(&self) -> Vec<IntroDraft> {
        let entries = self.entries.read();
        let sorted: BTreeMap<&(String, String), &IntroDraft> = entries.iter().collect();
        sorted.into_values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroStats {
    pub cached: usize,
    pub generated: usize,
    pub template: usize,
    /// Writer output rejected by the copy gate.
    pub gate_fallbacks: usize,
    /// Writer errors (other than disabled).
    pub writer_failures: usize,
    /// Drafts kept despite failing the copy gate.
    pub gate_blocked: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IntroOutput {
    pub intros: Vec<IntroDraft>,
    pub blocks: Vec<BlockReason>,
    pub stats: IntroStats,
}

pub struct IntroGenerator<'a> {
    pub cache: &'a IntroCache,
    pub writer: &'a dyn IntroWriter,
    pub validator: &'a CopyValidator<'a>,
    pub mode: &'a str,
    pub presignal: Option<&'a str>,
    pub evidence: &'a [EvidenceType],
}

impl IntroGenerator<'_> {
    /// Drafts for every match whose demand and supply both completed contact
    /// resolution. Matches touching a blocked entity are skipped silently;
    /// they already carry a block reason from an earlier stage.
    pub fn generate(
        &self,
        matches: &[MatchResult],
        ready_demand: &[CanonicalEntity],
        ready_supply: &[CanonicalEntity],
    ) -> IntroOutput {
        let demand: HashMap<&str, &CanonicalEntity> =
            ready_demand.iter().map(|e| (e.entity_id.as_str(), e)).collect();
        let supply: HashMap<&str, &CanonicalEntity> =
            ready_supply.iter().map(|e| (e.entity_id.as_str(), e)).collect();

        let mut out = IntroOutput::default();
        for m in matches {
            let (Some(d), Some(s)) = (demand.get(m.demand_id.as_str()), supply.get(m.supply_id.as_str()))
            else {
                out.stats.skipped += 1;
                continue;
            };
            let draft = match self.cache.get(&m.demand_id, &m.supply_id) {
                Some(hit) => {
                    out.stats.cached += 1;
                    hit
                }
                None => match self.draft_for(m, d, s, &mut out.stats) {
                    Ok(draft) => self.cache.insert(draft),
                    Err(reason) => {
                        out.blocks.push(reason);
                        continue;
                    }
                },
            };
            if let Some(reason) = self.gate_block(&draft) {
                out.stats.gate_blocked += 1;
                out.blocks.push(reason);
            }
            out.intros.push(draft);
        }
        log::info!(
            "intros: {} drafted ({} generated, {} template, {} cached)",
            out.intros.len(),
            out.stats.generated,
            out.stats.template,
            out.stats.cached
        );
        out
    }

    fn draft_for(
        &self,
        m: &MatchResult,
        demand: &CanonicalEntity,
        supply: &CanonicalEntity,
        stats: &mut IntroStats,
    ) -> Result<IntroDraft, BlockReason> {
        if m.demand_id != demand.entity_id || m.supply_id != supply.entity_id {
            return Err(BlockReason::new(
                Stage::Intro,
                BlockCode::MatchFailed,
                "match does not reference the entities it was drafted for",
            )
            .with_detail("demandId", m.demand_id.as_str())
            .with_detail("supplyId", m.supply_id.as_str()));
        }

        if self.writer.is_enabled() {
            let request = IntroRequest {
                mode: self.mode,
                audience: EntityType::Demand,
                demand,
                supply,
                rationale: &m.reason,
            };
            match self.writer.write(&request) {
                Ok(generated) => {
                    let verdict = self.check(&generated.body);
                    if verdict.passed() {
                        stats.generated += 1;
                        return Ok(self.build(m, generated, IntroSource::Generated));
                    }
                    stats.gate_fallbacks += 1;
                    log::debug!(
                        "generated intro for ({}, {}) rejected: {}",
                        m.demand_id,
                        m.supply_id,
                        verdict.first_error().map_or("", |f| f.code.as_str())
                    );
                }
                Err(CollaboratorError::Disabled) => {}
                Err(e) => {
                    stats.writer_failures += 1;
                    log::warn!("intro writer failed for ({}, {}): {e}", m.demand_id, m.supply_id);
                }
            }
        }

        stats.template += 1;
        Ok(self.build(m, template(demand, supply), IntroSource::Template))
    }

    /// `Copy` block for a draft the gate rejects, carrying its first error.
    fn gate_block(&self, draft: &IntroDraft) -> Option<BlockReason> {
        let verdict = self.check(&draft.body);
        let failure = verdict.first_error()?;
        log::warn!(
            "intro for ({}, {}) fails the copy gate: {}",
            draft.demand_entity_id,
            draft.supply_entity_id,
            failure.code
        );
        Some(
            BlockReason::new(Stage::Copy, failure.code.block_code(), failure.message.clone())
                .with_detail("demandId", draft.demand_entity_id.as_str())
                .with_detail("supplyId", draft.supply_entity_id.as_str())
                .with_detail("failureCode", failure.code.as_str())
                .with_detail("source", draft.source.as_str()),
        )
    }

    fn check(&self, body: &str) -> ValidationResult {
        self.validator.validate(
            body,
            &CopyContext {
                mode: self.mode,
                audience: EntityType::Demand,
                presignal: self.presignal,
                evidence: self.evidence,
            },
        )
    }

    fn build(&self, m: &MatchResult, intro: GeneratedIntro, source: IntroSource) -> IntroDraft {
        IntroDraft {
            demand_entity_id: m.demand_id.clone(),
            supply_entity_id: m.supply_id.clone(),
            subject: intro.subject,
            body: intro.body,
            tone: intro.tone,
            generated_at: Utc::now(),
            source,
            match_rationale: m.reason.clone(),
            evidence_refs: evidence_refs(m),
        }
    }
}

/// First distinct evidence source paths from the match.
pub fn evidence_refs(m: &MatchResult) -> Vec<String> {
    let mut refs: Vec<String> = Vec::with_capacity(EVIDENCE_REFS);
    for ev in &m.evidence {
        if refs.len() == EVIDENCE_REFS {
            break;
        }
        if !refs.contains(&ev.source_path) {
            refs.push(ev.source_path.clone());
        }
    }
    refs
}

/// Deterministic fallback. The fixed wording is free of activity,
/// lane-specific and claim words; company and person names are interpolated
/// as-is and may still trip the gate.
pub fn template(demand: &CanonicalEntity, supply: &CanonicalEntity) -> GeneratedIntro {
    let greeting = demand
        .person
        .first_name
        .clone()
        .or_else(|| {
            demand
                .person
                .full_name
                .as_deref()
                .and_then(|n| n.split_whitespace().next())
                .map(String::from)
        })
        .unwrap_or_else(|| "there".to_string());
    let demand_name = demand.company.name.as_deref().unwrap_or_else(|| demand.label());
    let supply_name = supply.company.name.as_deref().unwrap_or_else(|| supply.label());

    GeneratedIntro {
        subject: format!("Intro: {demand_name} and {supply_name}"),
        body: format!(
            "Hi {greeting},\n\n{supply_name} works with teams like {demand_name}. \
             An introduction looked like it could be useful for both sides. \
             Open to a short intro?"
        ),
        tone: TEMPLATE_TONE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Disabled;
    use routegrid_config::ModePolicies;
    use routegrid_core::{CompanyInfo, Evidence, MatchType, PersonInfo, SourceInfo};

    fn entity(id: &str, kind: EntityType, name: &str, domain: &str) -> CanonicalEntity {
        CanonicalEntity {
            entity_id: id.into(),
            entity_type: kind,
            company: CompanyInfo {
                name: Some(name.into()),
                domain: Some(domain.into()),
                ..Default::default()
            },
            person: PersonInfo {
                full_name: Some("Ada Lovelace".into()),
                ..Default::default()
            },
            contacts: Default::default(),
            source: SourceInfo {
                provider: "test".into(),
                dataset_type: "t".into(),
                source_id: None,
                raw_index: 0,
            },
            confidence: Default::default(),
            evidence: Vec::new(),
            raw: serde_json::Value::Null,
            needs_enrichment: false,
        }
    }

    fn pair(d: &CanonicalEntity, s: &CanonicalEntity) -> MatchResult {
        MatchResult {
            demand_id: d.entity_id.clone(),
            supply_id: s.entity_id.clone(),
            demand_domain: d.domain().unwrap_or_default().into(),
            supply_domain: s.domain().unwrap_or_default().into(),
            confidence: 0.3,
            match_type: MatchType::FirstAvailable,
            reason: "first available".into(),
            evidence: vec![
                Evidence::new("company.domain", "acme.com", "$.website", "website", 0.9),
                Evidence::new("company.domain", "acme.com", "$.website", "website", 0.9),
                Evidence::new("company.domain", "r.io", "$.domain", "domain", 0.9),
                Evidence::new("company.industry", "staffing", "$.industry", "industry", 0.8),
                Evidence::new("company.industry", "saas", "$.sector", "industry", 0.8),
            ],
        }
    }

    struct Writer(&'static str);
    impl IntroWriter for Writer {
        fn write(&self, _req: &IntroRequest<'_>) -> Result<GeneratedIntro, CollaboratorError> {
            Ok(GeneratedIntro {
                subject: "s".into(),
                body: self.0.into(),
                tone: "warm".into(),
            })
        }
    }

    struct Broken;
    impl IntroWriter for Broken {
        fn write(&self, _req: &IntroRequest<'_>) -> Result<GeneratedIntro, CollaboratorError> {
            Err(CollaboratorError::Failed("503".into()))
        }
    }

    fn generator<'a>(
        cache: &'a IntroCache,
        writer: &'a dyn IntroWriter,
        validator: &'a CopyValidator<'a>,
    ) -> IntroGenerator<'a> {
        IntroGenerator {
            cache,
            writer,
            validator,
            mode: "recruiting",
            presignal: None,
            evidence: &[],
        }
    }

    #[test]
    fn template_passes_strict_gate() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "Recruiters Co", "recruiters.io");
        let body = template(&d, &s).body;
        let validator = CopyValidator::new(ModePolicies::builtin());
        for mode in ["recruiting", "partnerships"] {
            let ctx = CopyContext {
                mode,
                audience: EntityType::Demand,
                presignal: None,
                evidence: &[],
            };
            let result = validator.check_send(&body, &ctx);
            assert!(result.is_clean(), "{mode}: {result:?}");
        }
        assert!(body.starts_with("Hi Ada,"));
    }

    #[test]
    fn distinct_supply_gets_distinct_drafts() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s1 = entity("s1", EntityType::Supply, "One", "one.io");
        let s2 = entity("s2", EntityType::Supply, "Two", "two.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let out = generator(&cache, &Disabled, &validator).generate(
            &[pair(&d, &s1), pair(&d, &s2)],
            &[d.clone()],
            &[s1, s2],
        );
        assert_eq!(out.intros.len(), 2);
        assert_eq!(cache.len(), 2);
        assert_ne!(out.intros[0].body, out.intros[1].body);
        assert!(cache.get("d1", "s1").is_some());
        assert!(cache.get("d1", "s2").is_some());
    }

    #[test]
    fn second_run_hits_cache() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let g = generator(&cache, &Disabled, &validator);
        let first = g.generate(&[pair(&d, &s)], &[d.clone()], &[s.clone()]);
        let second = g.generate(&[pair(&d, &s)], &[d.clone()], &[s.clone()]);
        assert_eq!(second.stats.cached, 1);
        assert_eq!(first.intros, second.intros);
    }

    #[test]
    fn writer_output_used_when_it_passes() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let writer = Writer("Hi Ada, One places engineers at product teams. Happy to connect you both?");
        let out = generator(&cache, &writer, &validator).generate(&[pair(&d, &s)], &[d.clone()], &[s]);
        assert_eq!(out.intros[0].source, IntroSource::Generated);
        assert_eq!(out.intros[0].tone, "warm");
        assert_eq!(out.stats.generated, 1);
    }

    #[test]
    fn gate_rejection_falls_back_to_template() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let writer = Writer("Hi Ada, I saw Acme is hiring. One can help fill your roles fast.");
        let out = generator(&cache, &writer, &validator).generate(&[pair(&d, &s)], &[d.clone()], &[s]);
        assert_eq!(out.intros[0].source, IntroSource::Template);
        assert_eq!(out.stats.gate_fallbacks, 1);
    }

    #[test]
    fn writer_failure_falls_back_to_template() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let out = generator(&cache, &Broken, &validator).generate(&[pair(&d, &s)], &[d.clone()], &[s]);
        assert_eq!(out.intros.len(), 1);
        assert_eq!(out.intros[0].source, IntroSource::Template);
        assert_eq!(out.stats.writer_failures, 1);
        assert!(out.blocks.is_empty());
    }

    #[test]
    fn template_naming_activity_word_is_kept_and_blocked() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "Scaling Talent", "scalingtalent.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let g = generator(&cache, &Disabled, &validator);

        let out = g.generate(&[pair(&d, &s)], &[d.clone()], &[s.clone()]);
        assert_eq!(out.intros.len(), 1);
        assert_eq!(out.intros[0].source, IntroSource::Template);
        assert!(out.intros[0].body.contains("Scaling Talent"));
        assert_eq!(out.stats.gate_blocked, 1);
        assert_eq!(out.blocks.len(), 1);
        let block = &out.blocks[0];
        assert_eq!(block.stage, Stage::Copy);
        assert_eq!(block.code, BlockCode::PresignalRequired);
        assert_eq!(block.details["failureCode"], "PRESIGNAL_REQUIRED");
        assert_eq!(block.details["supplyId"], "s1");

        // Served from cache on the next run, still reported.
        let again = g.generate(&[pair(&d, &s)], &[d.clone()], &[s]);
        assert_eq!(again.stats.cached, 1);
        assert_eq!(again.blocks.len(), 1);
    }

    #[test]
    fn evidence_refs_are_distinct_and_capped() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let refs = evidence_refs(&pair(&d, &s));
        assert_eq!(refs, vec!["$.website", "$.domain", "$.industry"]);
    }

    #[test]
    fn unready_side_is_skipped() {
        let d = entity("d1", EntityType::Demand, "Acme", "acme.com");
        let s = entity("s1", EntityType::Supply, "One", "one.io");
        let cache = IntroCache::new();
        let validator = CopyValidator::new(ModePolicies::builtin());
        let out = generator(&cache, &Disabled, &validator).generate(&[pair(&d, &s)], &[d.clone()], &[]);
        assert!(out.intros.is_empty());
        assert_eq!(out.stats.skipped, 1);
    }
}
