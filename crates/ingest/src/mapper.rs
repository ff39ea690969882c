//! Raw item → [`CanonicalEntity`].
//!
//! Domain precedence is fixed and legacy-compatible: website/URL-shaped keys
//! first (top level, then under `raw`), then the mapping's website paths, then
//! domain-named keys, then the mapping's domain paths. Every candidate is
//! normalized and validated before acceptance; social hosts and consumer
//! mailbox providers are never a company domain. There is no fallback to the
//! company name or an email's domain.

use std::collections::{BTreeMap, HashMap};

use routegrid_core::normalize::{
    company_domain, is_linkedin_company_url, is_valid_email, linkedin_profile_slug,
    looks_like_url, normalize_email, normalize_key_text, push_unique_email, split_full_name,
    DomainRejection,
};
use routegrid_core::{
    entity_id, BlockCode, BlockReason, CanonicalEntity, CompanyInfo, Contacts, EntityConfidence,
    EntityType, Evidence, PersonInfo, SourceInfo, Stage,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::draft::{CanonicalField, MappingSpec};
use crate::path::JsonPath;

// ---------------------------------------------------------------------------
// Fixed key lists
// ---------------------------------------------------------------------------

pub const WEBSITE_KEYS: &[&str] = &[
    "company_website",
    "companyWebsite",
    "company_url",
    "companyUrl",
    "website",
    "website_url",
    "websiteUrl",
    "homepage",
    "homepage_url",
    "url",
    "company.website",
    "company.url",
];

pub const DOMAIN_KEYS: &[&str] = &[
    "company_domain",
    "companyDomain",
    "domain",
    "company.domain",
    "host",
    "hostname",
];

const COMPANY_NAME_KEYS: &[&str] = &[
    "company_name",
    "companyName",
    "company",
    "organization",
    "organization_name",
    "org_name",
    "employer",
    "employer_name",
    "company.name",
];
const FULL_NAME_KEYS: &[&str] = &[
    "full_name",
    "fullName",
    "contact_name",
    "person_name",
    "person.name",
    "person.full_name",
    "contact.name",
];
const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstName", "person.first_name"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastName", "person.last_name"];
const TITLE_KEYS: &[&str] = &[
    "person_title",
    "contact_title",
    "headline",
    "person.title",
    "contact.title",
];
const PERSON_LINKEDIN_KEYS: &[&str] = &[
    "linkedin_url",
    "linkedinUrl",
    "linkedin",
    "person_linkedin_url",
    "person.linkedin_url",
];
const COMPANY_LINKEDIN_KEYS: &[&str] = &[
    "company_linkedin_url",
    "companyLinkedinUrl",
    "company_linkedin",
    "linkedin_company_url",
    "company.linkedin_url",
];
const INDUSTRY_KEYS: &[&str] = &["industry", "company_industry", "sector", "vertical", "company.industry"];
const EMAIL_KEYS: &[&str] = &[
    "email",
    "emails",
    "work_email",
    "workEmail",
    "contact_email",
    "person.email",
    "contact.email",
    "contacts.emails",
];
const PHONE_KEYS: &[&str] = &[
    "phone",
    "phones",
    "phone_number",
    "phoneNumber",
    "mobile",
    "telephone",
    "contact.phone",
];
const SOURCE_ID_KEYS: &[&str] = &["id", "_id", "uuid", "source_id", "sourceId", "record_id"];

const DOMAIN_WEIGHT: f64 = 0.9;
const EMAIL_WEIGHT: f64 = 0.8;
const PERSON_WEIGHT: f64 = 0.7;

/// Confidence of a value found under a fixed key.
const FIXED_KEY_CONFIDENCE: f64 = 0.95;

// ---------------------------------------------------------------------------
// Context + output
// ---------------------------------------------------------------------------

pub struct MapperContext<'a> {
    pub spec: &'a MappingSpec,
    pub entity_type: EntityType,
    pub provider: &'a str,
    pub dataset: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapStats {
    pub total: usize,
    pub mapped: usize,
    pub enrichment_ready: usize,
    pub needs_enrichment: usize,
    pub rejected: usize,
    /// Domain candidates rejected during extraction, by reason.
    pub rejected_domains: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MapOutput {
    pub entities: Vec<CanonicalEntity>,
    pub blocks: Vec<BlockReason>,
    pub stats: MapStats,
}

// ---------------------------------------------------------------------------
// Candidate paths
// ---------------------------------------------------------------------------

struct Candidate {
    path: String,
    extractor: &'static str,
    confidence: f64,
}

fn push_candidate(out: &mut Vec<Candidate>, path: String, extractor: &'static str, confidence: f64) {
    if !out.iter().any(|c| c.path == path) {
        out.push(Candidate {
            path,
            extractor,
            confidence,
        });
    }
}

fn push_fixed(out: &mut Vec<Candidate>, keys: &[&str], extractor: &'static str) {
    for key in keys {
        push_candidate(out, format!("$.{key}"), extractor, FIXED_KEY_CONFIDENCE);
    }
    for key in keys {
        push_candidate(out, format!("$.raw.{key}"), extractor, FIXED_KEY_CONFIDENCE);
    }
}

fn push_mapped(out: &mut Vec<Candidate>, spec: &MappingSpec, field: CanonicalField) {
    for path in spec.paths(field) {
        push_candidate(out, JsonPath::parse(path).to_string(), "mapping", spec.confidence());
    }
}

/// Mapping paths first, fixed keys after.
fn field_candidates(spec: &MappingSpec, field: CanonicalField, keys: &[&str]) -> Vec<Candidate> {
    let mut out = Vec::new();
    push_mapped(&mut out, spec, field);
    push_fixed(&mut out, keys, "fixed_key");
    out
}

// ---------------------------------------------------------------------------
// Domain extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DomainExtraction {
    pub domain: Option<String>,
    pub website: Option<String>,
    pub evidence: Vec<Evidence>,
    pub rejected: Vec<(String, String, DomainRejection)>,
}

/// Candidate paths for the domain, in precedence order.
pub fn domain_candidate_paths(spec: &MappingSpec) -> Vec<String> {
    domain_candidates(spec).into_iter().map(|c| c.path).collect()
}

fn domain_candidates(spec: &MappingSpec) -> Vec<Candidate> {
    let mut out = Vec::new();
    if spec.transforms().domain_from_website {
        push_fixed(&mut out, WEBSITE_KEYS, "website");
        push_mapped(&mut out, spec, CanonicalField::CompanyWebsite);
    }
    push_fixed(&mut out, DOMAIN_KEYS, "domain_field");
    push_mapped(&mut out, spec, CanonicalField::CompanyDomain);
    out
}

/// Extract the company domain from one item following the fixed precedence.
pub fn extract_domain(item: &Value, spec: &MappingSpec) -> DomainExtraction {
    let mut out = DomainExtraction::default();
    let website_paths: Vec<String> = {
        let mut w = Vec::new();
        push_fixed(&mut w, WEBSITE_KEYS, "website");
        push_mapped(&mut w, spec, CanonicalField::CompanyWebsite);
        w.into_iter().map(|c| c.path).collect()
    };

    for cand in domain_candidates(spec) {
        let path = JsonPath::parse(&cand.path);
        for value in path.resolve_strings(item) {
            match company_domain(&value) {
                Ok(domain) if out.domain.is_none() => {
                    let alternatives = out
                        .rejected
                        .iter()
                        .map(|(_, v, why)| format!("{v} ({})", why.as_str()))
                        .collect();
                    out.evidence.push(
                        Evidence::new("company.domain", &domain, &cand.path, cand.extractor, cand.confidence)
                            .with_alternatives(alternatives),
                    );
                    if website_paths.contains(&cand.path) && looks_like_url(&value) {
                        out.evidence.push(Evidence::new(
                            "company.website",
                            &value,
                            &cand.path,
                            cand.extractor,
                            cand.confidence,
                        ));
                        out.website = Some(value.clone());
                    }
                    out.domain = Some(domain);
                }
                Ok(_) => {}
                Err(why) => out.rejected.push((cand.path.clone(), value, why)),
            }
        }
        if out.domain.is_some() {
            break;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn first_accepted(
    item: &Value,
    candidates: &[Candidate],
    field: &str,
    accept: impl Fn(&str) -> bool,
    evidence: &mut Vec<Evidence>,
) -> Option<String> {
    for cand in candidates {
        let path = JsonPath::parse(&cand.path);
        if let Some(value) = path.resolve_strings(item).into_iter().find(|v| accept(v.as_str())) {
            evidence.push(Evidence::new(field, &value, &cand.path, cand.extractor, cand.confidence));
            return Some(value);
        }
    }
    None
}

fn is_text(s: &str, max_len: usize) -> bool {
    s.len() <= max_len && !s.contains('@') && !looks_like_url(s) && s.chars().any(|c| c.is_alphabetic())
}

fn is_phone(s: &str) -> bool {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits)
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '(' | ')' | '-' | '.'))
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Map every item; items with neither domain nor company name become
/// `NO_COMPANY_NAME_OR_DOMAIN` block reasons. Input order is preserved.
pub fn map_items(items: &[Value], ctx: &MapperContext<'_>) -> MapOutput {
    let mut out = MapOutput::default();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    out.stats.total = items.len();

    for (index, item) in items.iter().enumerate() {
        match map_item(item, index, ctx, &mut occurrences, &mut out.stats) {
            Ok(entity) => {
                if entity.needs_enrichment {
                    out.stats.needs_enrichment += 1;
                } else {
                    out.stats.enrichment_ready += 1;
                }
                out.stats.mapped += 1;
                out.entities.push(entity);
            }
            Err(reason) => {
                out.stats.rejected += 1;
                out.blocks.push(reason);
            }
        }
    }

    log::info!(
        "mapped {} {} items: {} entities ({} need enrichment), {} rejected",
        out.stats.total,
        ctx.entity_type,
        out.stats.mapped,
        out.stats.needs_enrichment,
        out.stats.rejected
    );
    out
}

fn map_item(
    item: &Value,
    index: usize,
    ctx: &MapperContext<'_>,
    occurrences: &mut HashMap<String, usize>,
    stats: &mut MapStats,
) -> Result<CanonicalEntity, BlockReason> {
    let spec = ctx.spec;
    let mut evidence = Vec::new();

    let extraction = extract_domain(item, spec);
    for (_, _, why) in &extraction.rejected {
        *stats.rejected_domains.entry(why.as_str().to_string()).or_insert(0) += 1;
    }
    evidence.extend(extraction.evidence.iter().cloned());

    let company_name = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::CompanyName, COMPANY_NAME_KEYS),
        "company.name",
        |s| is_text(s, 200),
        &mut evidence,
    );

    if extraction.domain.is_none() && company_name.is_none() {
        let rejected: Vec<Value> = extraction
            .rejected
            .iter()
            .map(|(path, value, why)| {
                serde_json::json!({"path": path, "value": value, "reason": why.as_str()})
            })
            .collect();
        return Err(BlockReason::new(
            Stage::Ingest,
            BlockCode::NoCompanyNameOrDomain,
            format!("{} item #{index} has neither a usable domain nor a company name", ctx.entity_type),
        )
        .with_detail("entityType", ctx.entity_type.as_str())
        .with_detail("rawIndex", index)
        .with_detail("rejectedDomains", rejected));
    }

    let industry = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::CompanyIndustry, INDUSTRY_KEYS),
        "company.industry",
        |s| is_text(s, 100),
        &mut evidence,
    );

    // LinkedIn: company URLs found under person keys are routed to the company.
    let mut company_linkedin = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::CompanyLinkedinUrl, COMPANY_LINKEDIN_KEYS),
        "company.linkedinCompanyUrl",
        is_linkedin_company_url,
        &mut evidence,
    );
    let person_linkedin_candidates =
        field_candidates(spec, CanonicalField::PersonLinkedinUrl, PERSON_LINKEDIN_KEYS);
    let linkedin_url = first_accepted(
        item,
        &person_linkedin_candidates,
        "person.linkedinUrl",
        |s| linkedin_profile_slug(s).is_some(),
        &mut evidence,
    );
    if company_linkedin.is_none() {
        company_linkedin = first_accepted(
            item,
            &person_linkedin_candidates,
            "company.linkedinCompanyUrl",
            is_linkedin_company_url,
            &mut evidence,
        );
    }

    let full_name = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::PersonFullName, FULL_NAME_KEYS),
        "person.fullName",
        |s| is_text(s, 100),
        &mut evidence,
    );
    let mut first_name = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::PersonFirstName, FIRST_NAME_KEYS),
        "person.firstName",
        |s| is_text(s, 60),
        &mut evidence,
    );
    let mut last_name = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::PersonLastName, LAST_NAME_KEYS),
        "person.lastName",
        |s| is_text(s, 60),
        &mut evidence,
    );
    if spec.transforms().split_name {
        if let Some(full) = &full_name {
            let source_path = evidence
                .iter()
                .find(|e| e.field == "person.fullName")
                .map(|e| e.source_path.clone())
                .unwrap_or_default();
            let (first, last) = split_full_name(full);
            if first_name.is_none() {
                if let Some(f) = &first {
                    evidence.push(Evidence::new("person.firstName", f, &source_path, "split_name", 0.8));
                }
                first_name = first;
            }
            if last_name.is_none() {
                if let Some(l) = &last {
                    evidence.push(Evidence::new("person.lastName", l, &source_path, "split_name", 0.8));
                }
                last_name = last;
            }
        }
    }
    let title = first_accepted(
        item,
        &field_candidates(spec, CanonicalField::PersonTitle, TITLE_KEYS),
        "person.title",
        |s| is_text(s, 150),
        &mut evidence,
    );

    let mut emails: Vec<String> = Vec::new();
    for cand in field_candidates(spec, CanonicalField::ContactEmails, EMAIL_KEYS) {
        for raw in JsonPath::parse(&cand.path).resolve_strings(item) {
            let email = normalize_email(&raw);
            if !is_valid_email(&email) {
                continue;
            }
            let added = if spec.transforms().dedupe_emails {
                push_unique_email(&mut emails, &email)
            } else {
                emails.push(email.clone());
                true
            };
            if added {
                evidence.push(Evidence::new("contacts.emails", &email, &cand.path, cand.extractor, cand.confidence));
            }
        }
    }

    let mut phones: Vec<String> = Vec::new();
    for cand in field_candidates(spec, CanonicalField::ContactPhones, PHONE_KEYS) {
        for raw in JsonPath::parse(&cand.path).resolve_strings(item) {
            if is_phone(&raw) && !phones.contains(&raw) {
                evidence.push(Evidence::new("contacts.phones", &raw, &cand.path, cand.extractor, cand.confidence));
                phones.push(raw);
            }
        }
    }

    let source_id = SOURCE_ID_KEYS
        .iter()
        .find_map(|k| JsonPath::parse(k).resolve_strings(item).into_iter().next());

    let base_key = source_id.clone().unwrap_or_else(|| {
        extraction
            .domain
            .clone()
            .or_else(|| company_name.as_deref().map(normalize_key_text))
            .unwrap_or_else(|| format!("#{index}"))
    });
    let seen = occurrences.entry(base_key.clone()).or_insert(0);
    let key = if *seen == 0 {
        base_key
    } else {
        format!("{base_key}#{seen}")
    };
    *seen += 1;

    let person = PersonInfo {
        full_name,
        first_name,
        last_name,
        title,
        linkedin_url,
    };

    let mc = spec.confidence();
    let domain_conf = if extraction.domain.is_some() { DOMAIN_WEIGHT * mc } else { 0.0 };
    let email_conf = if !emails.is_empty() { EMAIL_WEIGHT * mc } else { 0.0 };
    let person_conf = if person.display_name().is_some() { PERSON_WEIGHT * mc } else { 0.0 };

    let needs_enrichment = extraction.domain.is_none() && company_name.is_some();

    Ok(CanonicalEntity {
        entity_id: entity_id(ctx.provider, ctx.dataset, &key),
        entity_type: ctx.entity_type,
        company: CompanyInfo {
            name: company_name,
            domain: extraction.domain,
            website: extraction.website,
            linkedin_company_url: company_linkedin,
            industry,
        },
        person,
        contacts: Contacts { emails, phones },
        source: SourceInfo {
            provider: ctx.provider.to_string(),
            dataset_type: ctx.dataset.to_string(),
            source_id,
            raw_index: index,
        },
        confidence: EntityConfidence {
            domain: domain_conf,
            email: email_conf,
            person: person_conf,
            overall: domain_conf.max(email_conf).max(person_conf),
        },
        evidence,
        raw: item.clone(),
        needs_enrichment,
    })
}
