//! Map-stage domain resolution for entities that arrived with a company name
//! but no usable domain.

use routegrid_core::normalize::{company_domain, is_valid_email, normalize_email, push_unique_email};
use routegrid_core::{BlockCode, BlockReason, CanonicalEntity, Evidence, Stage};
use serde::Serialize;

use crate::bounded::bounded_map;
use crate::collaborators::{Enricher, EnrichmentQuery, EnrichmentResult};
use crate::error::CollaboratorError;

const ENRICHMENT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveStats {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutput {
    /// Every input entity, in input order. Resolved ones are now routable.
    pub entities: Vec<CanonicalEntity>,
    pub blocks: Vec<BlockReason>,
    pub stats: ResolveStats,
}

enum Resolution {
    Skipped(CanonicalEntity),
    Resolved(CanonicalEntity),
    NoDomain(CanonicalEntity, Option<String>),
    Failed(CanonicalEntity, CollaboratorError),
}

/// Try `enrich(companyName)` for every entity flagged `needs_enrichment`.
///
/// Nothing happens when the enricher is disabled: the entities pass through
/// unchanged and the matcher reports them as `NO_COMPANY_DOMAIN`.
pub fn resolve_domains(
    entities: Vec<CanonicalEntity>,
    enricher: &dyn Enricher,
    max_in_flight: usize,
) -> ResolveOutput {
    let mut out = ResolveOutput::default();
    if !enricher.is_enabled() || !entities.iter().any(|e| e.needs_enrichment) {
        out.entities = entities;
        return out;
    }

    let results = bounded_map(
        &entities,
        max_in_flight,
        |e| resolve_one(e.clone(), enricher),
        |e| Resolution::Failed(e.clone(), CollaboratorError::Failed("worker panicked".into())),
    );

    for r in results {
        match r {
            Resolution::Skipped(e) => out.entities.push(e),
            Resolution::Resolved(e) => {
                out.stats.attempted += 1;
                out.stats.resolved += 1;
                out.entities.push(e);
            }
            Resolution::NoDomain(e, rejected) => {
                out.stats.attempted += 1;
                out.stats.unresolved += 1;
                let mut reason = BlockReason::new(
                    Stage::Map,
                    BlockCode::NoDomainFound,
                    format!("enrichment found no usable domain for {}", e.label()),
                )
                .with_detail("entityId", e.entity_id.as_str())
                .with_detail("entityType", e.entity_type.as_str());
                if let Some(r) = rejected {
                    reason = reason.with_detail("rejectedDomain", r);
                }
                out.blocks.push(reason);
                out.entities.push(e);
            }
            Resolution::Failed(e, err) => {
                out.stats.attempted += 1;
                out.stats.failed += 1;
                log::warn!("enrichment for {} failed: {err}", e.label());
                out.blocks.push(
                    BlockReason::new(
                        Stage::Enrich,
                        BlockCode::EnrichmentFailed,
                        format!("enrichment failed for {}: {err}", e.label()),
                    )
                    .with_detail("entityId", e.entity_id.as_str())
                    .with_detail("fatal", false),
                );
                out.entities.push(e);
            }
        }
    }

    log::info!(
        "domain resolution: {} attempted, {} resolved, {} unresolved, {} failed",
        out.stats.attempted,
        out.stats.resolved,
        out.stats.unresolved,
        out.stats.failed
    );
    out
}

fn resolve_one(mut entity: CanonicalEntity, enricher: &dyn Enricher) -> Resolution {
    if !entity.needs_enrichment {
        return Resolution::Skipped(entity);
    }
    let Some(name) = entity.company.name.clone() else {
        return Resolution::Skipped(entity);
    };
    let query = EnrichmentQuery {
        domain: None,
        company_name: Some(name.clone()),
    };
    let result = match enricher.enrich(&query) {
        Ok(r) => r,
        Err(CollaboratorError::NotFound) => return Resolution::NoDomain(entity, None),
        Err(e) => return Resolution::Failed(entity, e),
    };

    let source = format!("enrichment:{name}");
    let domain = match result.domain.as_deref().map(company_domain) {
        Some(Ok(d)) => d,
        Some(Err(rejection)) => {
            log::debug!("enriched domain for {name} rejected: {}", rejection.as_str());
            return Resolution::NoDomain(entity, result.domain);
        }
        None => return Resolution::NoDomain(entity, None),
    };

    entity
        .evidence
        .push(Evidence::new("company.domain", &domain, &source, "enrichment", ENRICHMENT_CONFIDENCE));
    entity.company.domain = Some(domain);
    entity.needs_enrichment = false;
    entity.confidence.domain = ENRICHMENT_CONFIDENCE;
    apply_person(&mut entity, &result, &source);
    Resolution::Resolved(entity)
}

/// Fill person and email fields the entity is missing. Never overwrites.
fn apply_person(entity: &mut CanonicalEntity, result: &EnrichmentResult, source: &str) {
    if entity.person.full_name.is_none() && entity.person.first_name.is_none() {
        if let Some(name) = result.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            entity.person.full_name = Some(name.to_string());
            entity
                .evidence
                .push(Evidence::new("person.fullName", name, source, "enrichment", ENRICHMENT_CONFIDENCE));
        }
    }
    if entity.person.title.is_none() {
        if let Some(title) = result.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            entity.person.title = Some(title.to_string());
            entity
                .evidence
                .push(Evidence::new("person.title", title, source, "enrichment", ENRICHMENT_CONFIDENCE));
        }
    }
    if let Some(email) = result.email.as_deref().map(normalize_email) {
        if is_valid_email(&email) && push_unique_email(&mut entity.contacts.emails, &email) {
            entity
                .evidence
                .push(Evidence::new("contacts.emails", &email, source, "enrichment", ENRICHMENT_CONFIDENCE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Disabled;
    use routegrid_core::{CompanyInfo, EntityType, SourceInfo};

    fn unresolved(id: &str, name: &str) -> CanonicalEntity {
        CanonicalEntity {
            entity_id: id.into(),
            entity_type: EntityType::Demand,
            company: CompanyInfo {
                name: Some(name.into()),
                ..Default::default()
            },
            person: Default::default(),
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
            needs_enrichment: true,
        }
    }

    struct Fixed(Result<EnrichmentResult, CollaboratorError>);
    impl Enricher for Fixed {
        fn enrich(&self, q: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError> {
            assert!(q.company_name.is_some());
            self.0.clone()
        }
    }

    fn found(domain: &str) -> Fixed {
        Fixed(Ok(EnrichmentResult {
            domain: Some(domain.into()),
            name: Some("Grace Hopper".into()),
            email: Some("Grace@Acme.com".into()),
            title: None,
        }))
    }

    #[test]
    fn disabled_passes_through() {
        let out = resolve_domains(vec![unresolved("e1", "Acme")], &Disabled, 1);
        assert!(out.blocks.is_empty());
        assert!(out.entities[0].needs_enrichment);
        assert_eq!(out.stats, ResolveStats::default());
    }

    #[test]
    fn resolved_entity_becomes_routable() {
        let out = resolve_domains(vec![unresolved("e1", "Acme")], &found("https://www.Acme.com/about"), 1);
        let e = &out.entities[0];
        assert!(e.is_routable());
        assert_eq!(e.domain(), Some("acme.com"));
        assert_eq!(e.evidence_for("company.domain").unwrap().extractor, "enrichment");
        assert_eq!(e.contacts.emails, vec!["grace@acme.com"]);
        assert_eq!(e.person.full_name.as_deref(), Some("Grace Hopper"));
        assert_eq!(out.stats.resolved, 1);
    }

    #[test]
    fn public_provider_domain_is_no_domain_found() {
        let out = resolve_domains(vec![unresolved("e1", "Acme")], &found("gmail.com"), 1);
        assert_eq!(out.blocks[0].code, BlockCode::NoDomainFound);
        assert_eq!(out.blocks[0].stage, Stage::Map);
        assert!(!out.entities[0].is_routable());
    }

    #[test]
    fn failure_is_non_fatal_enrichment_failed() {
        let out = resolve_domains(
            vec![unresolved("e1", "Acme")],
            &Fixed(Err(CollaboratorError::Timeout("30s".into()))),
            1,
        );
        assert_eq!(out.blocks[0].code, BlockCode::EnrichmentFailed);
        assert!(!out.blocks[0].is_fatal());
        assert_eq!(out.entities.len(), 1);
    }
}
