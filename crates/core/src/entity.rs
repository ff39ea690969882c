use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;

// ---------------------------------------------------------------------------
// Entity side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Demand,
    Supply,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Demand => "demand",
            EntityType::Supply => "supply",
        }
    }

    /// The side this one is matched against.
    pub fn opposite(&self) -> Self {
        match self {
            EntityType::Demand => EntityType::Supply,
            EntityType::Supply => EntityType::Demand,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub linkedin_company_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonInfo {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub linkedin_url: Option<String>,
}

impl PersonInfo {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.title.is_none()
            && self.linkedin_url.is_none()
    }

    /// Full name, or first + last when only the parts are known.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = &self.full_name {
            return Some(full.clone());
        }
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contacts {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub provider: String,
    pub dataset_type: String,
    pub source_id: Option<String>,
    pub raw_index: usize,
}

/// Per-field confidence, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityConfidence {
    pub domain: f64,
    pub email: f64,
    pub person: f64,
    pub overall: f64,
}

// ---------------------------------------------------------------------------
// Canonical entity
// ---------------------------------------------------------------------------

/// The pipeline's unit of currency.
///
/// Never constructed without either a domain or a company name; the mapper
/// rejects such items as `NO_COMPANY_NAME_OR_DOMAIN` before reaching here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntity {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub company: CompanyInfo,
    pub person: PersonInfo,
    pub contacts: Contacts,
    pub source: SourceInfo,
    pub confidence: EntityConfidence,
    pub evidence: Vec<Evidence>,
    pub raw: serde_json::Value,
    pub needs_enrichment: bool,
}

impl CanonicalEntity {
    pub fn domain(&self) -> Option<&str> {
        self.company.domain.as_deref()
    }

    /// Has a domain and is not waiting on enrichment.
    pub fn is_routable(&self) -> bool {
        self.company.domain.is_some() && !self.needs_enrichment
    }

    /// Short human label: domain, then company name, then id.
    pub fn label(&self) -> &str {
        self.company
            .domain
            .as_deref()
            .or(self.company.name.as_deref())
            .unwrap_or(&self.entity_id)
    }

    /// First evidence record for a canonical field.
    pub fn evidence_for(&self, field: &str) -> Option<&Evidence> {
        self.evidence.iter().find(|e| e.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(domain: Option<&str>, needs_enrichment: bool) -> CanonicalEntity {
        CanonicalEntity {
            entity_id: "ent_1".into(),
            entity_type: EntityType::Demand,
            company: CompanyInfo {
                name: Some("Acme".into()),
                domain: domain.map(String::from),
                ..Default::default()
            },
            person: PersonInfo::default(),
            contacts: Contacts::default(),
            source: SourceInfo {
                provider: "test".into(),
                dataset_type: "jobs".into(),
                source_id: None,
                raw_index: 0,
            },
            confidence: EntityConfidence::default(),
            evidence: Vec::new(),
            raw: serde_json::Value::Null,
            needs_enrichment,
        }
    }

    #[test]
    fn routable_requires_domain_and_no_enrichment() {
        assert!(entity(Some("acme.com"), false).is_routable());
        assert!(!entity(None, true).is_routable());
        assert!(!entity(Some("acme.com"), true).is_routable());
    }

    #[test]
    fn label_prefers_domain() {
        assert_eq!(entity(Some("acme.com"), false).label(), "acme.com");
        assert_eq!(entity(None, true).label(), "Acme");
    }

    #[test]
    fn display_name_joins_parts() {
        let p = PersonInfo {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..Default::default()
        };
        assert_eq!(p.display_name().as_deref(), Some("Ada Lovelace"));
        assert!(PersonInfo::default().is_empty());
    }
}
