use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use routegrid_core::normalize::is_linkedin_company_url;
use serde::{Deserialize, Serialize};

use crate::discover::{CandidatePath, DiscoveryReport};
use crate::scorers::FieldCategory;

/// Candidate paths kept per canonical field.
pub const PATHS_PER_FIELD: usize = 3;

const INDUSTRY_PATH_HINTS: &[&str] = &["industry", "sector", "vertical", "category"];

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalField {
    #[serde(rename = "company.name")]
    CompanyName,
    #[serde(rename = "company.domain")]
    CompanyDomain,
    #[serde(rename = "company.website")]
    CompanyWebsite,
    #[serde(rename = "company.linkedinCompanyUrl")]
    CompanyLinkedinUrl,
    #[serde(rename = "company.industry")]
    CompanyIndustry,
    #[serde(rename = "person.fullName")]
    PersonFullName,
    #[serde(rename = "person.firstName")]
    PersonFirstName,
    #[serde(rename = "person.lastName")]
    PersonLastName,
    #[serde(rename = "person.title")]
    PersonTitle,
    #[serde(rename = "person.linkedinUrl")]
    PersonLinkedinUrl,
    #[serde(rename = "contacts.emails")]
    ContactEmails,
    #[serde(rename = "contacts.phones")]
    ContactPhones,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::CompanyName => "company.name",
            CanonicalField::CompanyDomain => "company.domain",
            CanonicalField::CompanyWebsite => "company.website",
            CanonicalField::CompanyLinkedinUrl => "company.linkedinCompanyUrl",
            CanonicalField::CompanyIndustry => "company.industry",
            CanonicalField::PersonFullName => "person.fullName",
            CanonicalField::PersonFirstName => "person.firstName",
            CanonicalField::PersonLastName => "person.lastName",
            CanonicalField::PersonTitle => "person.title",
            CanonicalField::PersonLinkedinUrl => "person.linkedinUrl",
            CanonicalField::ContactEmails => "contacts.emails",
            CanonicalField::ContactPhones => "contacts.phones",
        }
    }

    /// List fields accumulate every valid value; scalar fields take the first.
    pub fn is_list(&self) -> bool {
        matches!(self, CanonicalField::ContactEmails | CanonicalField::ContactPhones)
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Mapping spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTransforms {
    pub domain_from_website: bool,
    pub split_name: bool,
    pub dedupe_emails: bool,
}

impl Default for MappingTransforms {
    fn default() -> Self {
        Self {
            domain_from_website: true,
            split_name: true,
            dedupe_emails: true,
        }
    }
}

/// Versioned field mapping for one ingestion batch.
///
/// Never mutated: every change goes through a method returning a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSpec {
    version: u32,
    is_draft: bool,
    fields: BTreeMap<CanonicalField, Vec<String>>,
    transforms: MappingTransforms,
    confidence: f64,
    created_at: DateTime<Utc>,
}

impl MappingSpec {
    pub fn new(
        fields: BTreeMap<CanonicalField, Vec<String>>,
        transforms: MappingTransforms,
        confidence: f64,
    ) -> Self {
        Self {
            version: 0,
            is_draft: true,
            fields,
            transforms,
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// A mapping with no paths; the mapper falls back to its fixed key lists.
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), MappingTransforms::default(), 0.0)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn transforms(&self) -> &MappingTransforms {
        &self.transforms
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn paths(&self, field: CanonicalField) -> &[String] {
        self.fields.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn fields(&self) -> &BTreeMap<CanonicalField, Vec<String>> {
        &self.fields
    }

    /// Durable copy of this mapping: next version, no longer a draft.
    pub fn promote(&self) -> MappingSpec {
        MappingSpec {
            version: self.version + 1,
            is_draft: false,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// New version with `field` pointing at `paths`. Draft state is kept.
    pub fn with_paths(&self, field: CanonicalField, paths: Vec<String>) -> MappingSpec {
        let mut fields = self.fields.clone();
        fields.insert(field, paths);
        MappingSpec {
            version: self.version + 1,
            fields,
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn with_transforms(&self, transforms: MappingTransforms) -> MappingSpec {
        MappingSpec {
            version: self.version + 1,
            transforms,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

fn top_paths<'a>(
    candidates: impl Iterator<Item = &'a CandidatePath>,
) -> Vec<String> {
    candidates
        .take(PATHS_PER_FIELD)
        .map(|c| c.path.clone())
        .collect()
}

fn leaf_contains(path: &str, needle: &str) -> bool {
    path.to_lowercase()
        .rsplit('.')
        .next()
        .map(|l| l.contains(needle))
        .unwrap_or(false)
}

/// Average of the top-3 scores, normalized to 0–1. `None` without candidates.
fn top3_mean(candidates: &[CandidatePath]) -> Option<f64> {
    let top: Vec<f64> = candidates.iter().take(PATHS_PER_FIELD).map(|c| c.score).collect();
    if top.is_empty() {
        None
    } else {
        Some(top.iter().sum::<f64>() / top.len() as f64 / 100.0)
    }
}

/// Build a draft mapping (`version 0`, `isDraft`) from a discovery report.
pub fn draft_mapping(report: &DiscoveryReport) -> MappingSpec {
    let mut fields: BTreeMap<CanonicalField, Vec<String>> = BTreeMap::new();
    let mut put = |field: CanonicalField, paths: Vec<String>| {
        if !paths.is_empty() {
            fields.insert(field, paths);
        }
    };

    put(
        CanonicalField::CompanyDomain,
        top_paths(report.candidates_for(FieldCategory::Domain).iter()),
    );
    put(
        CanonicalField::CompanyWebsite,
        top_paths(report.candidates_for(FieldCategory::Website).iter()),
    );
    put(
        CanonicalField::CompanyName,
        top_paths(report.candidates_for(FieldCategory::CompanyName).iter()),
    );
    put(
        CanonicalField::ContactEmails,
        top_paths(report.candidates_for(FieldCategory::Email).iter()),
    );
    put(
        CanonicalField::ContactPhones,
        top_paths(report.candidates_for(FieldCategory::Phone).iter()),
    );
    put(
        CanonicalField::PersonTitle,
        top_paths(report.candidates_for(FieldCategory::Title).iter()),
    );

    let names = report.candidates_for(FieldCategory::PersonName);
    put(
        CanonicalField::PersonFirstName,
        top_paths(names.iter().filter(|c| leaf_contains(&c.path, "first"))),
    );
    put(
        CanonicalField::PersonLastName,
        top_paths(names.iter().filter(|c| leaf_contains(&c.path, "last"))),
    );
    put(
        CanonicalField::PersonFullName,
        top_paths(
            names
                .iter()
                .filter(|c| !leaf_contains(&c.path, "first") && !leaf_contains(&c.path, "last")),
        ),
    );

    let linkedin = report.candidates_for(FieldCategory::LinkedinUrl);
    let is_company = |c: &&CandidatePath| c.samples.iter().any(|s| is_linkedin_company_url(s));
    put(
        CanonicalField::CompanyLinkedinUrl,
        top_paths(linkedin.iter().filter(is_company)),
    );
    put(
        CanonicalField::PersonLinkedinUrl,
        top_paths(linkedin.iter().filter(|c| !is_company(c))),
    );

    let industry: Vec<String> = report
        .paths
        .iter()
        .filter(|p| INDUSTRY_PATH_HINTS.iter().any(|h| leaf_contains(&p.path, h)))
        .take(PATHS_PER_FIELD)
        .map(|p| p.path.clone())
        .collect();
    put(CanonicalField::CompanyIndustry, industry);

    let core: Vec<f64> = [
        FieldCategory::Domain,
        FieldCategory::Email,
        FieldCategory::CompanyName,
        FieldCategory::PersonName,
    ]
    .iter()
    .filter_map(|c| top3_mean(report.candidates_for(*c)))
    .collect();
    let confidence = if core.is_empty() {
        0.0
    } else {
        core.iter().sum::<f64>() / core.len() as f64
    };

    log::debug!(
        "draft mapping: fields={} confidence={:.3}",
        fields.len(),
        confidence
    );

    MappingSpec::new(fields, MappingTransforms::default(), confidence)
}
