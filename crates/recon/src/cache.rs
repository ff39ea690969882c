//! Decision-maker cache: one contact identity stored under every applicable
//! composite key.
//!
//! Key priority: LinkedIn profile slug > domain + full name > domain + title >
//! domain. Writes merge additively into whatever each key already holds, so
//! storing twice is a no-op and concurrent writers only interleave.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use routegrid_core::normalize::{linkedin_profile_slug, normalize_key_text};
use routegrid_core::{CachedDecisionMaker, CanonicalEntity};
use serde_json::Value;

use crate::error::ExportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    LinkedIn(String),
    DomainName(String, String),
    DomainTitle(String, String),
    Domain(String),
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkedIn(slug) => write!(f, "li:{slug}"),
            Self::DomainName(d, n) => write!(f, "dn:{d}:{n}"),
            Self::DomainTitle(d, t) => write!(f, "dt:{d}:{t}"),
            Self::Domain(d) => write!(f, "d:{d}"),
        }
    }
}

/// Keys in lookup priority order. Empty parts are skipped.
pub fn cache_keys(
    linkedin_url: Option<&str>,
    domain: Option<&str>,
    full_name: Option<&str>,
    title: Option<&str>,
) -> Vec<CacheKey> {
    let mut keys = Vec::with_capacity(4);
    if let Some(slug) = linkedin_url.and_then(linkedin_profile_slug) {
        keys.push(CacheKey::LinkedIn(slug));
    }
    let domain = domain.map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty());
    if let Some(domain) = domain {
        if let Some(name) = full_name.map(normalize_key_text).filter(|n| !n.is_empty()) {
            keys.push(CacheKey::DomainName(domain.clone(), name));
        }
        if let Some(title) = title.map(normalize_key_text).filter(|t| !t.is_empty()) {
            keys.push(CacheKey::DomainTitle(domain.clone(), title));
        }
        keys.push(CacheKey::Domain(domain));
    }
    keys
}

pub fn keys_for_entity(entity: &CanonicalEntity) -> Vec<CacheKey> {
    let name = entity.person.display_name();
    cache_keys(
        entity.person.linkedin_url.as_deref(),
        entity.domain(),
        name.as_deref(),
        entity.person.title.as_deref(),
    )
}

pub fn keys_for_record(record: &CachedDecisionMaker) -> Vec<CacheKey> {
    cache_keys(
        record.linkedin_url.as_deref(),
        Some(&record.domain),
        record.full_name.as_deref(),
        record.title.as_deref(),
    )
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Shared, run-spanning store. Construct one per process (or per run) and pass
/// it by reference to the stages that need it.
#[derive(Debug, Default)]
pub struct DecisionMakerCache {
    entries: RwLock<HashMap<String, CachedDecisionMaker>>,
}

impl DecisionMakerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First hit in key priority order.
    pub fn lookup(&self, keys: &[CacheKey]) -> Option<CachedDecisionMaker> {
        let entries = self.entries.read();
        keys.iter().find_map(|k| entries.get(&k.to_string()).cloned())
    }

    pub fn lookup_entity(&self, entity: &CanonicalEntity) -> Option<CachedDecisionMaker> {
        self.lookup(&keys_for_entity(entity))
    }

    /// Merge `record` into every key it derives. Returns the number of keys
    /// written. The write lock is held across all keys so no reader sees a
    /// half-stored identity.
    pub fn store(&self, record: &CachedDecisionMaker) -> usize {
        let keys = keys_for_record(record);
        let mut entries = self.entries.write();
        for key in &keys {
            entries
                .entry(key.to_string())
                .and_modify(|existing| existing.merge_from(record))
                .or_insert_with(|| record.clone());
        }
        keys.len()
    }

    /// Distinct keys held.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Key → record, sorted by key.
    pub fn export(&self) -> Result<Value, ExportError> {
        let entries = self.entries.read();
        let sorted: BTreeMap<&String, &CachedDecisionMaker> = entries.iter().collect();
        Ok(serde_json::to_value(sorted)?)
    }

    /// Merge an exported map into this cache. Returns the number of keys read.
    pub fn import(&self, value: &Value) -> Result<usize, ExportError> {
        let incoming: BTreeMap<String, CachedDecisionMaker> =
            serde_json::from_value(value.clone())?;
        let mut entries = self.entries.write();
        for (key, record) in &incoming {
            entries
                .entry(key.clone())
                .and_modify(|existing| existing.merge_from(record))
                .or_insert_with(|| record.clone());
        }
        log::debug!("imported {} decision-maker cache keys", incoming.len());
        Ok(incoming.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use routegrid_core::{CachedEmail, EmailStatus};

    fn record(emails: &[&str]) -> CachedDecisionMaker {
        let now = Utc::now();
        CachedDecisionMaker {
            entity_id: "ent_1".into(),
            linkedin_url: Some("https://www.linkedin.com/in/ada-l/".into()),
            domain: "acme.com".into(),
            full_name: Some("Ada Lovelace".into()),
            title: Some("CTO".into()),
            company_name: Some("Acme".into()),
            emails: emails
                .iter()
                .map(|e| CachedEmail::new(*e, EmailStatus::Unknown, "test"))
                .collect(),
            phones: Vec::new(),
            cached_at: now,
            updated_at: now,
            source: "test".into(),
            evidence: Vec::new(),
        }
    }

    #[test]
    fn keys_follow_priority() {
        let keys = keys_for_record(&record(&[]));
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["li:ada-l", "dn:acme.com:ada lovelace", "dt:acme.com:cto", "d:acme.com"]
        );
    }

    #[test]
    fn any_key_hits_after_store() {
        let cache = DecisionMakerCache::new();
        assert_eq!(cache.store(&record(&["ada@acme.com"])), 4);
        for key in [
            CacheKey::LinkedIn("ada-l".into()),
            CacheKey::DomainTitle("acme.com".into(), "cto".into()),
            CacheKey::Domain("acme.com".into()),
        ] {
            assert!(cache.lookup(&[key]).is_some());
        }
        assert!(cache.lookup(&[CacheKey::Domain("other.com".into())]).is_none());
    }

    #[test]
    fn store_is_idempotent() {
        let cache = DecisionMakerCache::new();
        let r = record(&["ada@acme.com"]);
        cache.store(&r);
        let first = cache.lookup(&keys_for_record(&r));
        cache.store(&r);
        assert_eq!(cache.lookup(&keys_for_record(&r)), first);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn updated_emails_union() {
        let cache = DecisionMakerCache::new();
        cache.store(&record(&["ada@acme.com"]));
        cache.store(&record(&["ADA@acme.com", "cto@acme.com"]));
        let hit = cache.lookup(&[CacheKey::Domain("acme.com".into())]).unwrap();
        let addrs: Vec<&str> = hit.emails.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addrs, vec!["ada@acme.com", "cto@acme.com"]);
    }

    #[test]
    fn export_import_round_trip() {
        let cache = DecisionMakerCache::new();
        cache.store(&record(&["ada@acme.com"]));
        let exported = cache.export().unwrap();
        assert!(exported.get("d:acme.com").is_some());

        let restored = DecisionMakerCache::new();
        assert_eq!(restored.import(&exported).unwrap(), 4);
        assert_eq!(
            restored.lookup(&[CacheKey::LinkedIn("ada-l".into())]),
            cache.lookup(&[CacheKey::LinkedIn("ada-l".into())])
        );
    }

    #[test]
    fn empty_cache_exports_an_empty_object() {
        let exported = DecisionMakerCache::new().export().unwrap();
        assert_eq!(exported, serde_json::json!({}));
    }

    #[test]
    fn import_rejects_garbage() {
        let cache = DecisionMakerCache::new();
        assert!(cache.import(&serde_json::json!({"d:x.com": 42})).is_err());
    }
}
