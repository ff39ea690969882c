use std::collections::{BTreeSet, HashSet};

use routegrid_config::{MatchStrategy, ModePolicy};
use routegrid_core::normalize::normalize_key_text;
use routegrid_core::{
    BlockCode, BlockReason, CanonicalEntity, Evidence, MatchResult, MatchType, Stage,
};
use serde::Serialize;

use crate::collaborators::MatchEnhancer;
use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// Supply selection
// ---------------------------------------------------------------------------

/// A chosen supply, by index into the routable supply list.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub index: usize,
    pub confidence: f64,
    pub match_type: MatchType,
    pub reason: String,
}

pub trait SupplySelector {
    fn select(&self, demand: &CanonicalEntity, supply: &[&CanonicalEntity]) -> Option<Selection>;
}

/// Legacy fallback: the first routable supply, fit ignored. Supplies are
/// reused across demands.
pub struct FirstAvailable;

pub const FIRST_AVAILABLE_CONFIDENCE: f64 = 0.3;

impl SupplySelector for FirstAvailable {
    fn select(&self, _demand: &CanonicalEntity, supply: &[&CanonicalEntity]) -> Option<Selection> {
        let first = supply.first()?;
        Some(Selection {
            index: 0,
            confidence: FIRST_AVAILABLE_CONFIDENCE,
            match_type: MatchType::FirstAvailable,
            reason: format!("first available supply ({})", first.label()),
        })
    }
}

/// Industry overlap between demand and supply, plus a bonus for supplies in
/// the mode's allow list. Deny-listed supplies never win on fit.
pub struct CategoryFit<'p> {
    pub policy: Option<&'p ModePolicy>,
}

const ALLOW_BONUS: f64 = 0.25;

fn industry_tokens(s: &str) -> BTreeSet<String> {
    normalize_key_text(s)
        .split_whitespace()
        .filter(|t| t.len() > 2 && !matches!(*t, "and" | "the" | "for"))
        .map(String::from)
        .collect()
}

impl CategoryFit<'_> {
    pub fn score(&self, demand: &CanonicalEntity, supply: &CanonicalEntity) -> f64 {
        let Some(supply_industry) = supply.company.industry.as_deref() else {
            return 0.0;
        };
        if self.policy.is_some_and(|p| p.is_industry_denied(supply_industry)) {
            return 0.0;
        }
        let mut score = 0.0;
        if let Some(demand_industry) = demand.company.industry.as_deref() {
            let d = industry_tokens(demand_industry);
            let s = industry_tokens(supply_industry);
            let union = d.union(&s).count();
            if union > 0 {
                score += d.intersection(&s).count() as f64 / union as f64;
            }
        }
        if self.policy.is_some_and(|p| p.is_industry_allowed(supply_industry)) {
            score += ALLOW_BONUS;
        }
        score.min(1.0)
    }
}

impl SupplySelector for CategoryFit<'_> {
    fn select(&self, demand: &CanonicalEntity, supply: &[&CanonicalEntity]) -> Option<Selection> {
        let mut best: Option<(usize, f64)> = None;
        for (i, s) in supply.iter().enumerate() {
            let score = self.score(demand, s);
            // Strictly greater keeps the first-seen supply on ties.
            if score > 0.0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        let (index, score) = best?;
        Some(Selection {
            index,
            confidence: 0.5 + 0.5 * score,
            match_type: MatchType::CategoryFit,
            reason: format!(
                "industry fit {:.2} ({} -> {})",
                score,
                demand.company.industry.as_deref().unwrap_or("-"),
                supply[index].company.industry.as_deref().unwrap_or("-")
            ),
        })
    }
}

/// Ordered selector chain. The last link must always answer when any supply
/// exists.
pub fn selector_chain<'p>(
    strategy: MatchStrategy,
    policy: Option<&'p ModePolicy>,
) -> Vec<Box<dyn SupplySelector + 'p>> {
    match strategy {
        MatchStrategy::CategoryFit => vec![
            Box::new(CategoryFit { policy }) as Box<dyn SupplySelector + 'p>,
            Box::new(FirstAvailable),
        ],
        MatchStrategy::FirstAvailable => vec![Box::new(FirstAvailable) as Box<dyn SupplySelector + 'p>],
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutput {
    /// Exactly one per routable demand entity, in demand input order.
    pub matches: Vec<MatchResult>,
    /// Extra pairings proposed by the secondary matcher.
    pub supplemental: Vec<MatchResult>,
    pub blocks: Vec<BlockReason>,
    pub routable_demand: usize,
    pub routable_supply: usize,
    pub rescored: usize,
    pub cardinality_ok: bool,
}

impl MatchOutput {
    pub fn fatal(&self) -> impl Iterator<Item = &BlockReason> {
        self.blocks.iter().filter(|b| b.is_fatal())
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn not_routable(entity: &CanonicalEntity) -> BlockReason {
    BlockReason::new(
        Stage::Match,
        BlockCode::NoCompanyDomain,
        format!("{} {} has no usable company domain", entity.entity_type, entity.label()),
    )
    .with_detail("entityId", entity.entity_id.as_str())
    .with_detail("entityType", entity.entity_type.as_str())
    .with_detail("needsEnrichment", entity.needs_enrichment)
}

fn match_evidence(demand: &CanonicalEntity, supply: &CanonicalEntity) -> Vec<Evidence> {
    let mut out: Vec<Evidence> = Vec::new();
    for e in [demand, supply] {
        for field in ["company.domain", "company.industry"] {
            if let Some(ev) = e.evidence_for(field) {
                out.push(ev.clone());
            }
        }
    }
    out
}

fn build_match(demand: &CanonicalEntity, supply: &CanonicalEntity, sel: Selection) -> MatchResult {
    MatchResult {
        demand_id: demand.entity_id.clone(),
        supply_id: supply.entity_id.clone(),
        demand_domain: demand.domain().unwrap_or_default().to_string(),
        supply_domain: supply.domain().unwrap_or_default().to_string(),
        confidence: sel.confidence,
        match_type: sel.match_type,
        reason: sel.reason,
        evidence: match_evidence(demand, supply),
    }
}

/// Pair every routable demand entity with exactly one routable supply entity.
///
/// Domain equality is never required. Entities without a usable domain are
/// blocked with `NO_COMPANY_DOMAIN`; an empty routable supply side blocks every
/// routable demand with `NO_SUPPLY_AVAILABLE`. The match count is asserted
/// against the routable demand count afterwards.
pub fn match_entities(
    demand: &[CanonicalEntity],
    supply: &[CanonicalEntity],
    strategy: MatchStrategy,
    policy: Option<&ModePolicy>,
    enhancer: &dyn MatchEnhancer,
) -> MatchOutput {
    let mut out = MatchOutput {
        cardinality_ok: true,
        ..Default::default()
    };

    let mut routable_demand: Vec<&CanonicalEntity> = Vec::new();
    for d in demand {
        if d.is_routable() {
            routable_demand.push(d);
        } else {
            out.blocks.push(not_routable(d));
        }
    }
    let mut routable_supply: Vec<&CanonicalEntity> = Vec::new();
    for s in supply {
        if s.is_routable() {
            routable_supply.push(s);
        } else {
            out.blocks.push(not_routable(s));
        }
    }
    out.routable_demand = routable_demand.len();
    out.routable_supply = routable_supply.len();

    if routable_demand.is_empty() {
        out.blocks.push(
            BlockReason::new(Stage::Match, BlockCode::NoDemandAvailable, "no routable demand entities")
                .with_detail("demandTotal", demand.len()),
        );
        return out;
    }
    if routable_supply.is_empty() {
        for d in &routable_demand {
            out.blocks.push(
                BlockReason::new(
                    Stage::Match,
                    BlockCode::NoSupplyAvailable,
                    format!("no routable supply for {}", d.label()),
                )
                .with_detail("entityId", d.entity_id.as_str())
                .with_detail("supplyTotal", supply.len()),
            );
        }
        return out;
    }

    let chain = selector_chain(strategy, policy);
    for d in &routable_demand {
        let Some(sel) = chain.iter().find_map(|s| s.select(d, &routable_supply)) else {
            continue;
        };
        let s = routable_supply[sel.index];
        out.matches.push(build_match(d, s, sel));
    }

    if out.matches.len() != routable_demand.len() {
        out.cardinality_ok = false;
        log::error!(
            "cardinality violation: {} matches for {} routable demand entities",
            out.matches.len(),
            routable_demand.len()
        );
        out.blocks.push(
            BlockReason::new(
                Stage::Match,
                BlockCode::CardinalityViolation,
                format!(
                    "{} matches for {} routable demand entities",
                    out.matches.len(),
                    routable_demand.len()
                ),
            )
            .with_detail("matches", out.matches.len())
            .with_detail("routableDemand", routable_demand.len()),
        );
    }

    apply_enhancer(&mut out, &routable_demand, &routable_supply, enhancer);
    out
}

/// Secondary matcher: may re-score deterministic matches or add supplemental
/// ones. Never removes or retargets a deterministic match; any error becomes a
/// non-fatal `MATCH_FAILED` block.
fn apply_enhancer(
    out: &mut MatchOutput,
    demand: &[&CanonicalEntity],
    supply: &[&CanonicalEntity],
    enhancer: &dyn MatchEnhancer,
) {
    if !enhancer.is_enabled() {
        return;
    }
    let proposals = match enhancer.enhance(demand, supply, &out.matches) {
        Ok(p) => p,
        Err(CollaboratorError::Disabled) => return,
        Err(e) => {
            log::warn!("match enhancer failed: {e}");
            out.blocks.push(
                BlockReason::new(Stage::Match, BlockCode::MatchFailed, format!("secondary matcher failed: {e}"))
                    .with_detail("fatal", false),
            );
            return;
        }
    };

    let mut seen: HashSet<(String, String)> = out
        .supplemental
        .iter()
        .map(|m| (m.demand_id.clone(), m.supply_id.clone()))
        .collect();
    for p in proposals {
        if let Some(existing) = out
            .matches
            .iter_mut()
            .find(|m| m.demand_id == p.demand_id && m.supply_id == p.supply_id)
        {
            existing.confidence = p.confidence.clamp(0.0, 1.0);
            existing.reason = format!("{} | rescored: {}", existing.reason, p.reason);
            out.rescored += 1;
            continue;
        }
        let d = demand.iter().find(|e| e.entity_id == p.demand_id);
        let s = supply.iter().find(|e| e.entity_id == p.supply_id);
        let (Some(d), Some(s)) = (d, s) else {
            log::debug!("enhancer proposed unknown pair ({}, {})", p.demand_id, p.supply_id);
            continue;
        };
        if !seen.insert((p.demand_id.clone(), p.supply_id.clone())) {
            continue;
        }
        out.supplemental.push(build_match(
            d,
            s,
            Selection {
                index: 0,
                confidence: p.confidence.clamp(0.0, 1.0),
                match_type: MatchType::Enhanced,
                reason: p.reason,
            },
        ));
    }
    if out.rescored > 0 || !out.supplemental.is_empty() {
        log::info!(
            "match enhancer: {} rescored, {} supplemental",
            out.rescored,
            out.supplemental.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Disabled, EnhancedMatch};
    use routegrid_config::{ModePolicies, ModePolicySource};
    use routegrid_core::{
        CompanyInfo, Contacts, EntityConfidence, EntityType, PersonInfo, SourceInfo,
    };

    fn entity(id: &str, kind: EntityType, domain: Option<&str>, industry: Option<&str>) -> CanonicalEntity {
        CanonicalEntity {
            entity_id: id.into(),
            entity_type: kind,
            company: CompanyInfo {
                name: Some(format!("{id} Inc")),
                domain: domain.map(String::from),
                website: None,
                linkedin_company_url: None,
                industry: industry.map(String::from),
            },
            person: PersonInfo::default(),
            contacts: Contacts::default(),
            source: SourceInfo {
                provider: "test".into(),
                dataset_type: "t".into(),
                source_id: None,
                raw_index: 0,
            },
            confidence: EntityConfidence::default(),
            evidence: Vec::new(),
            raw: serde_json::Value::Null,
            needs_enrichment: domain.is_none(),
        }
    }

    fn d(id: &str, domain: &str, industry: Option<&str>) -> CanonicalEntity {
        entity(id, EntityType::Demand, Some(domain), industry)
    }

    fn s(id: &str, domain: &str, industry: Option<&str>) -> CanonicalEntity {
        entity(id, EntityType::Supply, Some(domain), industry)
    }

    struct Failing;
    impl MatchEnhancer for Failing {
        fn enhance(
            &self,
            _: &[&CanonicalEntity],
            _: &[&CanonicalEntity],
            _: &[MatchResult],
        ) -> Result<Vec<EnhancedMatch>, CollaboratorError> {
            Err(CollaboratorError::Timeout("30s".into()))
        }
    }

    struct Proposing(Vec<EnhancedMatch>);
    impl MatchEnhancer for Proposing {
        fn enhance(
            &self,
            _: &[&CanonicalEntity],
            _: &[&CanonicalEntity],
            _: &[MatchResult],
        ) -> Result<Vec<EnhancedMatch>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn every_routable_demand_gets_one_match() {
        let demand = vec![d("d1", "a.com", None), d("d2", "b.com", None), d("d3", "c.com", None)];
        let supply = vec![s("s1", "x.io", None)];
        let out = match_entities(&demand, &supply, MatchStrategy::CategoryFit, None, &Disabled);
        assert_eq!(out.matches.len(), 3);
        assert!(out.cardinality_ok);
        assert!(out.matches.iter().all(|m| m.supply_id == "s1"));
        assert_eq!(out.matches[0].match_type, MatchType::FirstAvailable);
        assert_eq!(out.matches[1].demand_domain, "b.com");
    }

    #[test]
    fn unroutable_entities_are_blocked() {
        let demand = vec![d("d1", "a.com", None), entity("d2", EntityType::Demand, None, None)];
        let supply = vec![s("s1", "x.io", None)];
        let out = match_entities(&demand, &supply, MatchStrategy::FirstAvailable, None, &Disabled);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.blocks.len(), 1);
        assert_eq!(out.blocks[0].code, BlockCode::NoCompanyDomain);
        assert_eq!(out.blocks[0].entity_id(), Some("d2"));
    }

    #[test]
    fn no_supply_blocks_all_demand() {
        let demand = vec![d("d1", "a.com", None), d("d2", "b.com", None)];
        let supply = vec![entity("s1", EntityType::Supply, None, None)];
        let out = match_entities(&demand, &supply, MatchStrategy::CategoryFit, None, &Disabled);
        assert!(out.matches.is_empty());
        let codes: Vec<BlockCode> = out.blocks.iter().map(|b| b.code).collect();
        assert_eq!(
            codes,
            vec![BlockCode::NoCompanyDomain, BlockCode::NoSupplyAvailable, BlockCode::NoSupplyAvailable]
        );
    }

    #[test]
    fn no_demand_is_reported() {
        let out = match_entities(&[], &[s("s1", "x.io", None)], MatchStrategy::CategoryFit, None, &Disabled);
        assert_eq!(out.blocks[0].code, BlockCode::NoDemandAvailable);
    }

    #[test]
    fn category_fit_prefers_overlapping_industry() {
        let demand = vec![d("d1", "a.com", Some("Software Engineering"))];
        let supply = vec![
            s("s1", "x.io", Some("Healthcare Staffing")),
            s("s2", "y.io", Some("Software Engineering Staffing")),
        ];
        let out = match_entities(&demand, &supply, MatchStrategy::CategoryFit, None, &Disabled);
        assert_eq!(out.matches[0].supply_id, "s2");
        assert_eq!(out.matches[0].match_type, MatchType::CategoryFit);
        assert!(out.matches[0].confidence > 0.5);

        let legacy = match_entities(&demand, &supply, MatchStrategy::FirstAvailable, None, &Disabled);
        assert_eq!(legacy.matches[0].supply_id, "s1");
    }

    #[test]
    fn deny_list_excludes_fit_but_not_fallback() {
        let policies = ModePolicies::from_toml("[modes.m]\nindustry_deny = [\"gambling\"]\n").unwrap();
        let policy = policies.policy("m").unwrap();
        let demand = vec![d("d1", "a.com", Some("Online Gambling"))];
        let supply = vec![s("s1", "x.io", Some("Online Gambling"))];
        let out = match_entities(&demand, &supply, MatchStrategy::CategoryFit, Some(policy), &Disabled);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].match_type, MatchType::FirstAvailable);
    }

    #[test]
    fn enhancer_failure_keeps_matches() {
        let demand = vec![d("d1", "a.com", None)];
        let supply = vec![s("s1", "x.io", None)];
        let out = match_entities(&demand, &supply, MatchStrategy::CategoryFit, None, &Failing);
        assert_eq!(out.matches.len(), 1);
        assert!(out.cardinality_ok);
        let failed = out.blocks.iter().find(|b| b.code == BlockCode::MatchFailed).unwrap();
        assert!(!failed.is_fatal());
        assert_eq!(out.fatal().count(), 0);
    }

    #[test]
    fn enhancer_rescores_and_supplements() {
        let demand = vec![d("d1", "a.com", None)];
        let supply = vec![s("s1", "x.io", None), s("s2", "y.io", None)];
        let enhancer = Proposing(vec![
            EnhancedMatch { demand_id: "d1".into(), supply_id: "s1".into(), confidence: 0.9, reason: "ranked".into() },
            EnhancedMatch { demand_id: "d1".into(), supply_id: "s2".into(), confidence: 0.7, reason: "alt".into() },
            EnhancedMatch { demand_id: "d1".into(), supply_id: "ghost".into(), confidence: 0.7, reason: "?".into() },
        ]);
        let out = match_entities(&demand, &supply, MatchStrategy::FirstAvailable, None, &enhancer);
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].supply_id, "s1");
        assert_eq!(out.matches[0].confidence, 0.9);
        assert_eq!(out.rescored, 1);
        assert_eq!(out.supplemental.len(), 1);
        assert_eq!(out.supplemental[0].match_type, MatchType::Enhanced);
    }
}
