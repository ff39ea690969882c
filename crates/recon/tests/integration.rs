use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use routegrid_config::{ModePolicies, Settings};
use routegrid_core::{BlockCode, EntityType, IntroDraft, MatchType};
use routegrid_gate::{CopyContext, CopyValidator, SendGate, SendOutcome, SendReceipt, Sender};
use routegrid_ingest::MappingSpec;
use routegrid_recon::collaborators::{Enricher, EnrichmentQuery, EnrichmentResult};
use routegrid_recon::export::{debug_bundle, read_snapshot, write_debug_bundle, write_snapshot};
use routegrid_recon::{
    compare, CollaboratorError, Collaborators, DatasetInput, DecisionMakerCache, IntroCache, ParityStage,
    ParityView, Pipeline, Readiness, RunOutcome, RunRequest,
};
use serde_json::{json, Value};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> Value {
    let path = fixtures_dir().join(name);
    let raw = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&raw).unwrap()
}

fn run_once(settings: &Settings, request: &RunRequest) -> RunOutcome {
    let cache = DecisionMakerCache::new();
    let intros = IntroCache::new();
    let pipeline = Pipeline::new(settings, ModePolicies::builtin(), &cache, &intros);
    pipeline.run(request, None, |_| {}).unwrap()
}

fn fixture_request() -> RunRequest {
    RunRequest::new(
        "recruiting",
        DatasetInput::from_payload("apify", "jobs", fixture("demand.json")).with_mapping(MappingSpec::empty()),
        DatasetInput::from_payload("apify", "agencies", fixture("supply.json")).with_mapping(MappingSpec::empty()),
    )
}

fn codes(outcome: &RunOutcome) -> Vec<BlockCode> {
    outcome.snapshot.blocked.iter().map(|b| b.code).collect()
}

// -------------------------------------------------------------------------
// End to end
// -------------------------------------------------------------------------

#[test]
fn website_and_domain_pair_without_contacts() {
    let request = RunRequest::new(
        "recruiting",
        DatasetInput::from_payload(
            "apify",
            "jobs",
            json!([{"website": "https://Acme.COM/jobs", "company_name": "Acme"}]),
        ),
        DatasetInput::from_payload(
            "apify",
            "agencies",
            json!([{"domain": "recruiters.io", "company_name": "Recruiters Co"}]),
        ),
    );
    let outcome = run_once(&Settings::default(), &request);
    let snap = &outcome.snapshot;

    let domains: Vec<&str> = snap.entities.iter().filter_map(|e| e.domain()).collect();
    assert_eq!(domains, vec!["acme.com", "recruiters.io"]);

    assert_eq!(snap.matches.len(), 1);
    assert_eq!(snap.matches[0].demand_domain, "acme.com");
    assert_eq!(snap.matches[0].supply_domain, "recruiters.io");

    assert_eq!(codes(&outcome), vec![BlockCode::NoEmailFound, BlockCode::NoEmailFound]);
    assert!(snap.intros.is_empty());
    assert!(snap.ready.is_empty());
    assert!(!outcome.is_fatal());
}

#[test]
fn fixture_run_routes_by_category() {
    let outcome = run_once(&Settings::default(), &fixture_request());
    let snap = &outcome.snapshot;

    let pairs: Vec<(&str, &str)> = snap
        .matches
        .iter()
        .map(|m| (m.demand_domain.as_str(), m.supply_domain.as_str()))
        .collect();
    assert_eq!(pairs, vec![("acme.com", "talentbridge.co"), ("globex.io", "freightpeople.com")]);
    assert!(snap.matches.iter().all(|m| m.match_type == MatchType::CategoryFit));

    let blocked = codes(&outcome);
    assert!(blocked.contains(&BlockCode::NoCompanyNameOrDomain));
    assert!(blocked.contains(&BlockCode::NoCompanyDomain));
    assert!(!blocked.contains(&BlockCode::NoEmailFound));

    assert_eq!(snap.ready.len(), 4);
    assert_eq!(snap.intros.len(), 2);
    for intro in &snap.intros {
        assert!(intro.body.starts_with("Hi "), "{}", intro.body);
        assert!(!intro.evidence_refs.is_empty());
    }

    let initech = snap.entities.iter().find(|e| e.company.name.as_deref() == Some("Initech")).unwrap();
    assert_eq!(
        snap.readiness[&initech.entity_id],
        Readiness::Blocked { code: BlockCode::NoCompanyDomain }
    );
}

#[test]
fn fixture_run_is_deterministic() {
    let settings = Settings::default();
    let a = run_once(&settings, &fixture_request());
    let b = run_once(&settings, &fixture_request());
    let ids = |o: &RunOutcome| o.snapshot.entities.iter().map(|e| e.entity_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(a.snapshot.matches, b.snapshot.matches);
    assert!(routegrid_recon::compare_snapshots(&a.snapshot, &b.snapshot).ok());
}

// -------------------------------------------------------------------------
// Caches
// -------------------------------------------------------------------------

#[test]
fn intros_are_keyed_by_pair() {
    let settings = Settings::default();
    let cache = DecisionMakerCache::new();
    let intros = IntroCache::new();
    let pipeline = Pipeline::new(&settings, ModePolicies::builtin(), &cache, &intros);
    let request = RunRequest::new(
        "recruiting",
        DatasetInput::from_payload(
            "apify",
            "jobs",
            json!([
                {"domain": "acme.com", "company_name": "Acme", "email": "ada@acme.com"},
                {"domain": "acme.com", "company_name": "Acme", "email": "ada@acme.com"},
            ]),
        ),
        DatasetInput::from_payload(
            "apify",
            "agencies",
            json!([{"domain": "recruiters.io", "company_name": "Recruiters Co", "email": "bo@recruiters.io"}]),
        ),
    );
    let first = pipeline.run(&request, None, |_| {}).unwrap();
    assert_eq!(first.snapshot.intros.len(), 2);
    assert_eq!(intros.len(), 2);

    let second = pipeline.run(&request, None, |_| {}).unwrap();
    assert_eq!(second.snapshot.metrics.get("intro.cached"), 2);
    assert_eq!(intros.len(), 2);
    assert_eq!(first.snapshot.intros, second.snapshot.intros);
}

#[test]
fn decision_makers_survive_export_and_import() {
    let settings = Settings::default();
    let with_email = RunRequest::new(
        "recruiting",
        DatasetInput::from_payload(
            "apify",
            "jobs",
            json!([{"domain": "acme.com", "company_name": "Acme", "email": "ada@acme.com"}]),
        ),
        DatasetInput::from_payload(
            "apify",
            "agencies",
            json!([{"domain": "recruiters.io", "company_name": "Recruiters Co", "email": "bo@recruiters.io"}]),
        ),
    );
    let first_cache = DecisionMakerCache::new();
    let intros = IntroCache::new();
    Pipeline::new(&settings, ModePolicies::builtin(), &first_cache, &intros)
        .run(&with_email, None, |_| {})
        .unwrap();
    assert!(!first_cache.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, serde_json::to_string(&first_cache.export().unwrap()).unwrap()).unwrap();

    let second_cache = DecisionMakerCache::new();
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(second_cache.import(&raw).unwrap(), first_cache.len());

    // Same companies, no emails in the input: the imported cache fills them.
    let without_email = RunRequest::new(
        "recruiting",
        DatasetInput::from_payload("apify", "jobs", json!([{"domain": "acme.com", "company_name": "Acme"}])),
        DatasetInput::from_payload(
            "apify",
            "agencies",
            json!([{"domain": "recruiters.io", "company_name": "Recruiters Co"}]),
        ),
    );
    let fresh_intros = IntroCache::new();
    let outcome = Pipeline::new(&settings, ModePolicies::builtin(), &second_cache, &fresh_intros)
        .run(&without_email, None, |_| {})
        .unwrap();
    assert_eq!(outcome.snapshot.ready.len(), 2);
    assert_eq!(outcome.snapshot.metrics.get("contact.cache_hits"), 2);
    assert_eq!(outcome.snapshot.intros.len(), 1);
}

// -------------------------------------------------------------------------
// Collaborators
// -------------------------------------------------------------------------

struct Directory;

impl Enricher for Directory {
    fn enrich(&self, query: &EnrichmentQuery) -> Result<EnrichmentResult, CollaboratorError> {
        match query.company_name.as_deref() {
            Some("Initech") => Ok(EnrichmentResult {
                domain: Some("https://initech.com".into()),
                name: Some("Peter Gibbons".into()),
                email: Some("peter@initech.com".into()),
                title: Some("Engineering Manager".into()),
            }),
            _ => Err(CollaboratorError::NotFound),
        }
    }
}

#[test]
fn enricher_resolves_missing_domain() {
    let settings = Settings::default();
    let cache = DecisionMakerCache::new();
    let intros = IntroCache::new();
    let pipeline = Pipeline::new(&settings, ModePolicies::builtin(), &cache, &intros)
        .with_collaborators(Collaborators::disabled().with_enricher(Arc::new(Directory)));
    let outcome = pipeline.run(&fixture_request(), None, |_| {}).unwrap();
    let snap = &outcome.snapshot;

    let initech = snap.entities.iter().find(|e| e.company.name.as_deref() == Some("Initech")).unwrap();
    assert_eq!(initech.domain(), Some("initech.com"));
    assert!(!initech.needs_enrichment);
    assert!(initech.evidence.iter().any(|e| e.extractor == "enrichment"));
    assert!(snap.matches.iter().any(|m| m.demand_domain == "initech.com"));
    assert_eq!(snap.readiness[&initech.entity_id], Readiness::Ready);
    assert_eq!(snap.collaborators, vec!["enricher".to_string()]);
    assert!(!codes(&outcome).contains(&BlockCode::NoCompanyDomain));
}

// -------------------------------------------------------------------------
// Send gate
// -------------------------------------------------------------------------

#[derive(Default)]
struct CountingSender {
    calls: AtomicUsize,
}

impl Sender for CountingSender {
    fn send(&self, _intro: &IntroDraft, _recipient: &str) -> SendReceipt {
        self.calls.fetch_add(1, Ordering::SeqCst);
        SendReceipt { sent: true, error: None }
    }
}

#[test]
fn only_clean_copy_reaches_the_sender() {
    let outcome = run_once(&Settings::default(), &fixture_request());
    let validator = CopyValidator::new(ModePolicies::builtin());
    let sender = CountingSender::default();
    let gate = SendGate::new(&validator, &sender);
    let ctx = CopyContext {
        mode: "recruiting",
        audience: EntityType::Demand,
        presignal: None,
        evidence: &[],
    };

    for intro in &outcome.snapshot.intros {
        assert!(gate.send(intro, "ada@acme.com", &ctx).is_sent());
    }
    assert_eq!(sender.calls.load(Ordering::SeqCst), outcome.snapshot.intros.len());

    let mut bad = outcome.snapshot.intros[0].clone();
    bad.body = "Buy now.".into();
    assert!(matches!(gate.send(&bad, "ada@acme.com", &ctx), SendOutcome::Rejected(_)));
    assert_eq!(sender.calls.load(Ordering::SeqCst), outcome.snapshot.intros.len());
}

// -------------------------------------------------------------------------
// Parity
// -------------------------------------------------------------------------

fn view(entities: &[&str]) -> ParityView {
    ParityView {
        entities: entities.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn parity_tolerates_reference_only_keys() {
    let reference = view(&["a", "b", "c"]);

    let subset = compare(&reference, &view(&["a", "b"]));
    assert!(subset.ok());
    let entities = subset.stage(ParityStage::Entities).unwrap();
    assert_eq!(entities.reference_only, vec!["c".to_string()]);
    assert!(entities.pipeline_only.is_empty());

    let extra = compare(&reference, &view(&["a", "b", "d"]));
    assert!(!extra.ok());
    assert_eq!(extra.first_divergence, Some(ParityStage::Entities));
    let entities = extra.stage(ParityStage::Entities).unwrap();
    assert_eq!(entities.pipeline_only, vec!["d".to_string()]);
    assert_eq!(entities.reference_only, vec!["c".to_string()]);
}

// -------------------------------------------------------------------------
// Export
// -------------------------------------------------------------------------

#[test]
fn snapshot_and_bundle_land_on_disk() {
    let settings = Settings::default();
    let outcome = run_once(&settings, &fixture_request());
    let dir = tempfile::tempdir().unwrap();

    let snap_path = dir.path().join("run.json");
    write_snapshot(&outcome.snapshot, &snap_path).unwrap();
    assert_eq!(read_snapshot(&snap_path).unwrap(), *outcome.snapshot);

    let bundle = debug_bundle(
        &outcome.snapshot,
        &settings,
        &outcome.events,
        json!({"enricher": {"apiKey": "live_0123456789abcdef"}}),
    )
    .unwrap();
    let bundle_path = dir.path().join("bundle.json");
    write_debug_bundle(&bundle, &bundle_path).unwrap();

    let raw = std::fs::read_to_string(&bundle_path).unwrap();
    assert!(!raw.contains("live_0123456789abcdef"));
    let back: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(back["runId"], outcome.snapshot.run_id.as_str());
    assert_eq!(back["context"]["enricher"]["apiKey"], "live...cdef");
    assert_eq!(back["snapshot"]["matches"].as_array().unwrap().len(), 2);
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn one_match_per_routable_demand(demand in 0usize..6, supply in 1usize..4) {
        let demand_items: Vec<Value> = (0..demand)
            .map(|i| json!({"domain": format!("d{i}.com"), "company_name": format!("Demand {i}")}))
            .collect();
        let supply_items: Vec<Value> = (0..supply)
            .map(|i| json!({"domain": format!("s{i}.io"), "company_name": format!("Supply {i}")}))
            .collect();
        let request = RunRequest::new(
            "recruiting",
            DatasetInput::from_items("apify", "jobs", demand_items).with_mapping(MappingSpec::empty()),
            DatasetInput::from_items("apify", "agencies", supply_items).with_mapping(MappingSpec::empty()),
        );
        let outcome = run_once(&Settings::default(), &request);
        prop_assert_eq!(outcome.snapshot.matches.len(), demand);
        prop_assert!(!outcome.is_fatal());
        let mut seen = std::collections::HashSet::new();
        for m in &outcome.snapshot.matches {
            prop_assert!(seen.insert(m.demand_id.clone()));
        }
    }
}
