//! Per-call deadlines for collaborators.
//!
//! A late answer becomes `CollaboratorError::Timeout` for that call only. The
//! worker thread is left to finish on its own; nothing is cancelled mid-call.
//! Abandoned workers keep their in-flight slot until the collaborator returns,
//! so a slow service never sees more than `max_in_flight` concurrent calls.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use routegrid_core::{CanonicalEntity, EntityType, MatchResult};

use crate::collaborators::{
    EmailFinder, EnhancedMatch, Enricher, EnrichmentQuery, EnrichmentResult, FoundContact,
    GeneratedIntro, IntroRequest, IntroWriter, MatchEnhancer, VerificationStatus, Verifier,
};
use crate::error::CollaboratorError;

// ---------------------------------------------------------------------------
// In-flight slots
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct InFlight {
    live: Mutex<usize>,
    freed: Condvar,
    cap: usize,
}

/// Held by a worker until its collaborator call returns.
struct Slot(Arc<InFlight>);

impl Drop for Slot {
    fn drop(&mut self) {
        *self.0.live.lock() -= 1;
        self.0.freed.notify_one();
    }
}

impl InFlight {
    pub(crate) fn new(cap: usize) -> Arc<Self> {
        Arc::new(Self { live: Mutex::new(0), freed: Condvar::new(), cap: cap.max(1) })
    }

    fn acquire(self: &Arc<Self>, until: Instant) -> Option<Slot> {
        let mut live = self.live.lock();
        while *live >= self.cap {
            if self.freed.wait_until(&mut live, until).timed_out() && *live >= self.cap {
                return None;
            }
        }
        *live += 1;
        Some(Slot(Arc::clone(self)))
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        *self.live.lock()
    }
}

pub(crate) fn call_with_deadline<R, F>(
    slots: &Arc<InFlight>,
    limit: Duration,
    f: F,
) -> Result<R, CollaboratorError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, CollaboratorError> + Send + 'static,
{
    let until = Instant::now() + limit;
    let timeout = || CollaboratorError::Timeout(format!("no answer within {}s", limit.as_secs_f64()));

    let Some(slot) = slots.acquire(until) else {
        log::debug!("collaborator busy: {} call(s) still in flight", slots.cap);
        return Err(timeout());
    };
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let result = f();
        drop(slot);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(timeout()),
        Err(RecvTimeoutError::Disconnected) => {
            Err(CollaboratorError::Failed("collaborator call panicked".into()))
        }
    }
}

/// Wraps one collaborator with a per-call deadline and an in-flight cap.
pub struct Deadline<T: ?Sized> {
    inner: Arc<T>,
    limit: Duration,
    slots: Arc<InFlight>,
}

impl<T: ?Sized> Deadline<T> {
    pub fn new(inner: Arc<T>, limit: Duration, max_in_flight: usize) -> Self {
        Self { inner, limit, slots: InFlight::new(max_in_flight) }
    }
}

impl Enricher for Deadline<dyn Enricher> {
    fn enrich(&self, query: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError> {
        let inner = Arc::clone(&self.inner);
        let query = query.clone();
        call_with_deadline(&self.slots, self.limit, move || inner.enrich(&query))
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

impl Verifier for Deadline<dyn Verifier> {
    fn verify(&self, email: &str) -> Result<VerificationStatus, CollaboratorError> {
        let inner = Arc::clone(&self.inner);
        let email = email.to_string();
        call_with_deadline(&self.slots, self.limit, move || inner.verify(&email))
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

impl EmailFinder for Deadline<dyn EmailFinder> {
    fn find(&self, domain: &str, role: Option<&str>) -> Result<FoundContact, CollaboratorError> {
        let inner = Arc::clone(&self.inner);
        let domain = domain.to_string();
        let role = role.map(String::from);
        call_with_deadline(&self.slots, self.limit, move || inner.find(&domain, role.as_deref()))
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

impl MatchEnhancer for Deadline<dyn MatchEnhancer> {
    fn enhance(
        &self,
        demand: &[&CanonicalEntity],
        supply: &[&CanonicalEntity],
        matches: &[MatchResult],
    ) -> Result<Vec<EnhancedMatch>, CollaboratorError> {
        let inner = Arc::clone(&self.inner);
        let demand: Vec<CanonicalEntity> = demand.iter().map(|e| (*e).clone()).collect();
        let supply: Vec<CanonicalEntity> = supply.iter().map(|e| (*e).clone()).collect();
        let matches = matches.to_vec();
        call_with_deadline(&self.slots, self.limit, move || {
            let d: Vec<&CanonicalEntity> = demand.iter().collect();
            let s: Vec<&CanonicalEntity> = supply.iter().collect();
            inner.enhance(&d, &s, &matches)
        })
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

impl IntroWriter for Deadline<dyn IntroWriter> {
    fn write(&self, request: &IntroRequest<'_>) -> Result<GeneratedIntro, CollaboratorError> {
        let inner = Arc::clone(&self.inner);
        let mode = request.mode.to_string();
        let audience: EntityType = request.audience;
        let demand = request.demand.clone();
        let supply = request.supply.clone();
        let rationale = request.rationale.to_string();
        call_with_deadline(&self.slots, self.limit, move || {
            inner.write(&IntroRequest {
                mode: &mode,
                audience,
                demand: &demand,
                supply: &supply,
                rationale: &rationale,
            })
        })
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounded::bounded_map;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Slow(Duration);
    impl Verifier for Slow {
        fn verify(&self, _email: &str) -> Result<VerificationStatus, CollaboratorError> {
            std::thread::sleep(self.0);
            Ok(VerificationStatus::Verified)
        }
    }

    #[test]
    fn late_answer_is_a_timeout() {
        let v = Deadline::<dyn Verifier>::new(Arc::new(Slow(Duration::from_millis(200))), Duration::from_millis(10), 1);
        assert!(matches!(v.verify("a@b.com"), Err(CollaboratorError::Timeout(_))));
    }

    #[test]
    fn prompt_answer_passes_through() {
        let v = Deadline::<dyn Verifier>::new(Arc::new(Slow(Duration::ZERO)), Duration::from_secs(5), 1);
        assert_eq!(v.verify("a@b.com"), Ok(VerificationStatus::Verified));
    }

    #[test]
    fn panicking_call_is_a_failure() {
        struct Boom;
        impl Enricher for Boom {
            fn enrich(&self, _q: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError> {
                panic!("boom")
            }
        }
        let e = Deadline::<dyn Enricher>::new(Arc::new(Boom), Duration::from_secs(5), 1);
        assert!(matches!(e.enrich(&EnrichmentQuery::default()), Err(CollaboratorError::Failed(_))));
    }

    struct Counting {
        delay: Duration,
        live: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Verifier for Counting {
        fn verify(&self, _email: &str) -> Result<VerificationStatus, CollaboratorError> {
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.live.fetch_sub(1, Ordering::SeqCst);
            Ok(VerificationStatus::Verified)
        }
    }

    #[test]
    fn timed_out_calls_still_count_against_the_cap() {
        let inner = Arc::new(Counting {
            delay: Duration::from_millis(400),
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let v = Deadline::<dyn Verifier>::new(inner.clone(), Duration::from_millis(20), 2);
        let emails: Vec<String> = (0..12).map(|i| format!("p{i}@acme.com")).collect();

        let out = bounded_map(&emails, 2, |e| v.verify(e), |_| Err(CollaboratorError::Disabled));

        assert_eq!(out.len(), 12);
        assert!(out.iter().all(|r| matches!(r, Err(CollaboratorError::Timeout(_)))));
        assert!(inner.peak.load(Ordering::SeqCst) <= 2, "peak {}", inner.peak.load(Ordering::SeqCst));
    }

    #[test]
    fn slot_frees_once_the_late_call_returns() {
        let v = Deadline::<dyn Verifier>::new(Arc::new(Slow(Duration::from_millis(50))), Duration::from_millis(5), 1);
        assert!(matches!(v.verify("a@b.com"), Err(CollaboratorError::Timeout(_))));
        std::thread::sleep(Duration::from_millis(200));
        assert_eq!(v.slots.live(), 0);
    }
}
