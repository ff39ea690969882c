//! Contact completion: cache merge, email validation, optional verification
//! and discovery, cache write-back, ready/blocked split.

use chrono::Utc;
use routegrid_core::normalize::{is_valid_email, normalize_email, push_unique_email};
use routegrid_core::{
    BlockCode, BlockReason, CachedDecisionMaker, CachedEmail, CanonicalEntity, EmailStatus,
    Evidence, Stage,
};
use serde::Serialize;

use crate::bounded::bounded_map;
use crate::cache::DecisionMakerCache;
use crate::collaborators::{EmailFinder, VerificationStatus, Verifier};
use crate::error::CollaboratorError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactStats {
    pub processed: usize,
    pub cache_hits: usize,
    pub invalid_dropped: usize,
    pub verified: usize,
    pub discovery_attempts: usize,
    pub discovered: usize,
    pub ready: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ContactOutcome {
    /// Entities with at least one usable email, in input order.
    pub ready: Vec<CanonicalEntity>,
    pub blocks: Vec<BlockReason>,
    pub stats: ContactStats,
}

pub struct ContactStage<'a> {
    pub cache: &'a DecisionMakerCache,
    pub verifier: &'a dyn Verifier,
    pub finder: &'a dyn EmailFinder,
    /// Role hint for discovery when the entity carries no title.
    pub default_titles: &'a [String],
    /// Entities processed concurrently. 1 means strictly sequential.
    pub max_in_flight: usize,
}

/// Per-entity result before aggregation.
struct Completed {
    entity: CanonicalEntity,
    usable: bool,
    cache_hit: bool,
    invalid_dropped: usize,
    verified: usize,
    attempted: bool,
    discovered: bool,
    discovery_error: Option<String>,
}

impl ContactStage<'_> {
    pub fn complete(&self, entities: &[CanonicalEntity]) -> ContactOutcome {
        let mut out = ContactOutcome::default();
        let results = bounded_map(
            entities,
            self.max_in_flight,
            |e| self.complete_one(e.clone()),
            |e| {
                log::error!("contact completion panicked for {}", e.entity_id);
                Completed::failed(e.clone(), "worker panicked")
            },
        );
        for c in results {
            out.absorb(c);
        }

        log::info!(
            "contact completion: {} ready, {} blocked ({} cache hits, {} discovery attempts)",
            out.stats.ready,
            out.stats.blocked,
            out.stats.cache_hits,
            out.stats.discovery_attempts
        );
        out
    }

    fn complete_one(&self, entity: CanonicalEntity) -> Completed {
        let mut c = Completed::new(entity);
        let entity = &mut c.entity;

        // 1. Cache lookup + additive merge.
        let mut emails: Vec<CachedEmail> = Vec::new();
        if let Some(hit) = self.cache.lookup_entity(&entity) {
            c.cache_hit = true;
            merge_person(entity, &hit);
            for cached in &hit.emails {
                if push_unique_email(&mut entity.contacts.emails, &cached.address) {
                    entity.evidence.push(Evidence::new(
                        "contacts.emails",
                        &cached.address,
                        format!("cache:{}", hit.entity_id),
                        "cache",
                        0.8,
                    ));
                }
            }
            emails.extend(hit.emails.iter().cloned());
        }

        // 2. Structural validation.
        let mut checked: Vec<CachedEmail> = Vec::new();
        for raw in &entity.contacts.emails {
            let address = normalize_email(raw);
            if !is_valid_email(&address) {
                c.invalid_dropped += 1;
                continue;
            }
            if checked.iter().any(|e| e.address.eq_ignore_ascii_case(&address)) {
                continue;
            }
            let status = emails
                .iter()
                .find(|e| e.address.eq_ignore_ascii_case(&address))
                .map(|e| e.status)
                .unwrap_or_default();
            checked.push(CachedEmail::new(address, status, entity.source.provider.clone()));
        }

        // Network verification, when configured.
        if self.verifier.is_enabled() {
            for email in checked.iter_mut().filter(|e| e.status == EmailStatus::Unknown) {
                match self.verifier.verify(&email.address) {
                    Ok(VerificationStatus::Verified) => {
                        email.status = EmailStatus::Verified;
                        c.verified += 1;
                    }
                    Ok(VerificationStatus::Risky) => email.status = EmailStatus::Risky,
                    Ok(VerificationStatus::Invalid) => email.status = EmailStatus::Invalid,
                    Ok(VerificationStatus::Error) => {}
                    Err(e) => log::warn!("verify {} failed: {e}", email.address),
                }
            }
        }

        // 3. Discovery when nothing usable remains.
        if !checked.iter().any(|e| e.status != EmailStatus::Invalid) {
            if let (true, Some(domain)) = (self.finder.is_enabled(), entity.domain().map(String::from)) {
                c.attempted = true;
                let role = entity
                    .person
                    .title
                    .clone()
                    .or_else(|| self.default_titles.first().cloned());
                match self.finder.find(&domain, role.as_deref()) {
                    Ok(found) => {
                        let address = normalize_email(&found.email);
                        if is_valid_email(&address) {
                            c.discovered = true;
                            entity.evidence.push(Evidence::new(
                                "contacts.emails",
                                &address,
                                format!("finder:{domain}"),
                                "finder",
                                0.6,
                            ));
                            if entity.person.full_name.is_none() {
                                entity.person.full_name = found.name;
                            }
                            if entity.person.title.is_none() {
                                entity.person.title = found.title;
                            }
                            checked.push(CachedEmail::new(address, EmailStatus::Unknown, "finder"));
                        }
                    }
                    Err(CollaboratorError::NotFound) => {}
                    Err(e) => {
                        log::warn!("email discovery for {domain} failed: {e}");
                        c.discovery_error = Some(e.to_string());
                    }
                }
            }
        }

        // 4. Persist, including invalid statuses so later runs remember them.
        if let Some(domain) = entity.domain() {
            let now = Utc::now();
            let record = CachedDecisionMaker {
                entity_id: entity.entity_id.clone(),
                linkedin_url: entity.person.linkedin_url.clone(),
                domain: domain.to_string(),
                full_name: entity.person.display_name(),
                title: entity.person.title.clone(),
                company_name: entity.company.name.clone(),
                emails: checked.clone(),
                phones: entity.contacts.phones.clone(),
                cached_at: now,
                updated_at: now,
                source: entity.source.provider.clone(),
                evidence: entity
                    .evidence
                    .iter()
                    .filter(|e| e.field.starts_with("contacts.") || e.field.starts_with("person."))
                    .cloned()
                    .collect(),
            };
            self.cache.store(&record);
        }

        // 5. Classify.
        entity.contacts.emails = checked
            .iter()
            .filter(|e| e.status != EmailStatus::Invalid)
            .map(|e| e.address.clone())
            .collect();
        c.invalid_dropped += checked.len() - entity.contacts.emails.len();
        c.usable = !entity.contacts.emails.is_empty();
        c
    }
}

fn merge_person(entity: &mut CanonicalEntity, hit: &CachedDecisionMaker) {
    let p = &mut entity.person;
    if p.full_name.is_none() && p.first_name.is_none() {
        p.full_name.clone_from(&hit.full_name);
    }
    if p.title.is_none() {
        p.title.clone_from(&hit.title);
    }
    if p.linkedin_url.is_none() {
        p.linkedin_url.clone_from(&hit.linkedin_url);
    }
    for phone in &hit.phones {
        if !entity.contacts.phones.contains(phone) {
            entity.contacts.phones.push(phone.clone());
        }
    }
}

impl Completed {
    fn new(entity: CanonicalEntity) -> Self {
        Self {
            entity,
            usable: false,
            cache_hit: false,
            invalid_dropped: 0,
            verified: 0,
            attempted: false,
            discovered: false,
            discovery_error: None,
        }
    }

    fn failed(entity: CanonicalEntity, error: &str) -> Self {
        Self {
            discovery_error: Some(error.to_string()),
            ..Self::new(entity)
        }
    }
}

impl ContactOutcome {
    fn absorb(&mut self, c: Completed) {
        let s = &mut self.stats;
        s.processed += 1;
        s.cache_hits += usize::from(c.cache_hit);
        s.invalid_dropped += c.invalid_dropped;
        s.verified += c.verified;
        s.discovery_attempts += usize::from(c.attempted);
        s.discovered += usize::from(c.discovered);

        if c.usable {
            s.ready += 1;
            self.ready.push(c.entity);
            return;
        }
        s.blocked += 1;
        let mut reason = BlockReason::new(
            Stage::Enrich,
            BlockCode::NoEmailFound,
            format!("no usable email for {} {}", c.entity.entity_type, c.entity.label()),
        )
        .with_detail("entityId", c.entity.entity_id.as_str())
        .with_detail("entityType", c.entity.entity_type.as_str())
        .with_detail("enrichmentAttempted", c.attempted);
        if let Some(err) = c.discovery_error {
            reason = reason.with_detail("enrichmentError", err);
        }
        self.blocks.push(reason);
    }
}
