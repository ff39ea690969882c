use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Verified,
    Risky,
    Invalid,
    /// Structurally valid, not (yet) checked by a verifier.
    #[default]
    Unknown,
}

impl EmailStatus {
    /// Rank used when two records disagree: a stronger status wins on merge.
    fn rank(&self) -> u8 {
        match self {
            EmailStatus::Unknown => 0,
            EmailStatus::Risky => 1,
            EmailStatus::Verified => 2,
            EmailStatus::Invalid => 3,
        }
    }

    pub fn strongest(self, other: EmailStatus) -> EmailStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEmail {
    pub address: String,
    #[serde(default)]
    pub status: EmailStatus,
    pub source: String,
}

impl CachedEmail {
    pub fn new(address: impl Into<String>, status: EmailStatus, source: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            status,
            source: source.into(),
        }
    }
}

/// A resolved contact identity, stored under every applicable composite key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDecisionMaker {
    pub entity_id: String,
    pub linkedin_url: Option<String>,
    pub domain: String,
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub emails: Vec<CachedEmail>,
    pub phones: Vec<String>,
    pub cached_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: String,
    pub evidence: Vec<Evidence>,
}

impl CachedDecisionMaker {
    /// Additive merge: missing scalar fields are filled, emails/phones/evidence
    /// are unioned. Nothing already present is overwritten.
    pub fn merge_from(&mut self, other: &CachedDecisionMaker) {
        fill(&mut self.linkedin_url, &other.linkedin_url);
        fill(&mut self.full_name, &other.full_name);
        fill(&mut self.title, &other.title);
        fill(&mut self.company_name, &other.company_name);

        for email in &other.emails {
            match self
                .emails
                .iter_mut()
                .find(|e| e.address.eq_ignore_ascii_case(&email.address))
            {
                Some(existing) => existing.status = existing.status.strongest(email.status),
                None => self.emails.push(email.clone()),
            }
        }
        for phone in &other.phones {
            if !self.phones.contains(phone) {
                self.phones.push(phone.clone());
            }
        }
        for ev in &other.evidence {
            if !self.evidence.contains(ev) {
                self.evidence.push(ev.clone());
            }
        }
        if other.updated_at > self.updated_at {
            self.updated_at = other.updated_at;
        }
        if other.cached_at < self.cached_at {
            self.cached_at = other.cached_at;
        }
    }

    /// Addresses that have not been marked invalid.
    pub fn usable_emails(&self) -> impl Iterator<Item = &str> {
        self.emails
            .iter()
            .filter(|e| e.status != EmailStatus::Invalid)
            .map(|e| e.address.as_str())
    }
}

fn fill(slot: &mut Option<String>, other: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(other);
    }
}
