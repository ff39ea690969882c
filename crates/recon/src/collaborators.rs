//! Contracts for external services. Implementations live outside this crate;
//! every capability has a [`Disabled`] stand-in chosen at construction time.

use std::sync::Arc;
use std::time::Duration;

use routegrid_core::{CanonicalEntity, EntityType, MatchResult};
use serde::{Deserialize, Serialize};

pub use routegrid_gate::{SendReceipt, Sender};

use crate::deadline::Deadline;
use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentQuery {
    pub domain: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub domain: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
}

/// Company/person enrichment. Must be safe to retry with the same query.
pub trait Enricher: Send + Sync {
    fn enrich(&self, query: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Risky,
    Invalid,
    Error,
}

pub trait Verifier: Send + Sync {
    fn verify(&self, email: &str) -> Result<VerificationStatus, CollaboratorError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Email discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundContact {
    pub email: String,
    pub name: Option<String>,
    pub title: Option<String>,
}

/// `find(domain, role?)`. Nothing found is `Err(NotFound)`.
pub trait EmailFinder: Send + Sync {
    fn find(&self, domain: &str, role: Option<&str>) -> Result<FoundContact, CollaboratorError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Secondary matcher
// ---------------------------------------------------------------------------

/// A re-score of an existing pairing or a supplemental pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedMatch {
    pub demand_id: String,
    pub supply_id: String,
    pub confidence: f64,
    pub reason: String,
}

pub trait MatchEnhancer: Send + Sync {
    fn enhance(
        &self,
        demand: &[&CanonicalEntity],
        supply: &[&CanonicalEntity],
        matches: &[MatchResult],
    ) -> Result<Vec<EnhancedMatch>, CollaboratorError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Intro writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroRequest<'a> {
    pub mode: &'a str,
    pub audience: EntityType,
    pub demand: &'a CanonicalEntity,
    pub supply: &'a CanonicalEntity,
    pub rationale: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedIntro {
    pub subject: String,
    pub body: String,
    pub tone: String,
}

pub trait IntroWriter: Send + Sync {
    fn write(&self, request: &IntroRequest<'_>) -> Result<GeneratedIntro, CollaboratorError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Disabled
// ---------------------------------------------------------------------------

/// Every capability, switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl Enricher for Disabled {
    fn enrich(&self, _query: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl Verifier for Disabled {
    fn verify(&self, _email: &str) -> Result<VerificationStatus, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl EmailFinder for Disabled {
    fn find(&self, _domain: &str, _role: Option<&str>) -> Result<FoundContact, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl MatchEnhancer for Disabled {
    fn enhance(
        &self,
        _demand: &[&CanonicalEntity],
        _supply: &[&CanonicalEntity],
        _matches: &[MatchResult],
    ) -> Result<Vec<EnhancedMatch>, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl IntroWriter for Disabled {
    fn write(&self, _request: &IntroRequest<'_>) -> Result<GeneratedIntro, CollaboratorError> {
        Err(CollaboratorError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl Sender for Disabled {
    fn send(&self, _intro: &routegrid_core::IntroDraft, _recipient: &str) -> SendReceipt {
        SendReceipt {
            sent: false,
            error: Some("sender disabled".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// The capabilities a pipeline run may call.
#[derive(Clone)]
pub struct Collaborators {
    pub enricher: Arc<dyn Enricher>,
    pub verifier: Arc<dyn Verifier>,
    pub finder: Arc<dyn EmailFinder>,
    pub enhancer: Arc<dyn MatchEnhancer>,
    pub writer: Arc<dyn IntroWriter>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Collaborators {
    pub fn disabled() -> Self {
        Self {
            enricher: Arc::new(Disabled),
            verifier: Arc::new(Disabled),
            finder: Arc::new(Disabled),
            enhancer: Arc::new(Disabled),
            writer: Arc::new(Disabled),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_finder(mut self, finder: Arc<dyn EmailFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn MatchEnhancer>) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn IntroWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Wrap every enabled capability with a per-call deadline. Each one also
    /// gets its own cap of `max_in_flight` concurrent calls, counting calls
    /// that already timed out but have not returned.
    pub fn with_deadline(self, limit: Duration, max_in_flight: usize) -> Self {
        fn wrap<T: ?Sized>(inner: Arc<T>, limit: Duration, cap: usize, enabled: bool) -> Option<Deadline<T>> {
            enabled.then(|| Deadline::new(inner, limit, cap))
        }
        let mut out = self.clone();
        if let Some(d) = wrap(self.enricher.clone(), limit, max_in_flight, self.enricher.is_enabled()) {
            out.enricher = Arc::new(d);
        }
        if let Some(d) = wrap(self.verifier.clone(), limit, max_in_flight, self.verifier.is_enabled()) {
            out.verifier = Arc::new(d);
        }
        if let Some(d) = wrap(self.finder.clone(), limit, max_in_flight, self.finder.is_enabled()) {
            out.finder = Arc::new(d);
        }
        if let Some(d) = wrap(self.enhancer.clone(), limit, max_in_flight, self.enhancer.is_enabled()) {
            out.enhancer = Arc::new(d);
        }
        if let Some(d) = wrap(self.writer.clone(), limit, max_in_flight, self.writer.is_enabled()) {
            out.writer = Arc::new(d);
        }
        out
    }

    /// Names of enabled capabilities, for run metadata.
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.enricher.is_enabled() {
            out.push("enricher");
        }
        if self.verifier.is_enabled() {
            out.push("verifier");
        }
        if self.finder.is_enabled() {
            out.push("finder");
        }
        if self.enhancer.is_enabled() {
            out.push("enhancer");
        }
        if self.writer.is_enabled() {
            out.push("writer");
        }
        out
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("enabled", &self.enabled())
            .finish()
    }
}
