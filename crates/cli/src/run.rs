//! `rgrid run` and `rgrid parity`.

use std::path::{Path, PathBuf};

use clap::Args;
use routegrid_core::EvidenceType;
use routegrid_recon::export::{debug_bundle, read_snapshot, write_debug_bundle, write_snapshot};
use routegrid_recon::{
    compare_snapshots, DatasetInput, DecisionMakerCache, ExportError, IntroCache, ParityReport, Pipeline,
    RunRequest, StageProgress,
};
use serde_json::{json, Value};

use crate::exit_codes::{
    EXIT_PARITY_DIVERGED, EXIT_PARITY_SNAPSHOT, EXIT_RUN_FATAL, EXIT_RUN_IO, EXIT_RUN_NOTHING_READY,
};
use crate::input::{read_payload, InputFormat};
use crate::{load_policies, load_settings, CliError};

#[derive(Args)]
pub struct RunArgs {
    /// Demand dataset (JSON payload or CSV)
    #[arg(long)]
    demand: String,

    /// Supply dataset (JSON payload or CSV)
    #[arg(long)]
    supply: String,

    /// Demand input format (inferred from extension if omitted)
    #[arg(long)]
    demand_format: Option<InputFormat>,

    /// Supply input format (inferred from extension if omitted)
    #[arg(long)]
    supply_format: Option<InputFormat>,

    /// Mode policy id
    #[arg(long, short = 'm', default_value = "recruiting")]
    mode: String,

    /// Provider label recorded on every entity
    #[arg(long, default_value = "file")]
    provider: String,

    /// Settings file (defaults to the user config location)
    #[arg(long, env = "ROUTEGRID_SETTINGS")]
    settings: Option<PathBuf>,

    /// Extra mode policy file, overlaid on the built-in modes
    #[arg(long, env = "ROUTEGRID_POLICIES")]
    policies: Option<PathBuf>,

    /// Decision-maker cache file; read before the run, rewritten after
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Operator context backing timing claims in intro copy
    #[arg(long)]
    presignal: Option<String>,

    /// Evidence type the operator attests to. Repeatable.
    #[arg(long, value_name = "TYPE")]
    evidence: Vec<String>,

    /// Reference snapshot to compare the run against
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Write the run snapshot to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Write a redacted debug bundle to this file
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Print the snapshot as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Exit non-zero when no entity reaches readiness
    #[arg(long)]
    fail_on_empty: bool,

    /// Suppress per-stage progress lines
    #[arg(long, short = 'q')]
    quiet: bool,
}

fn export_err(e: ExportError) -> CliError {
    CliError::new(EXIT_RUN_IO, e.to_string())
}

pub(crate) fn parse_evidence(raw: &[String]) -> Result<Vec<EvidenceType>, CliError> {
    raw.iter()
        .flat_map(|s| s.split(','))
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            EvidenceType::parse(s).ok_or_else(|| {
                let known: Vec<&str> = EvidenceType::ALL.iter().map(|t| t.as_str()).collect();
                CliError::args(format!("unknown evidence type: {s}"))
                    .with_hint(format!("expected one of: {}", known.join(", ")))
            })
        })
        .collect()
}

fn dataset_name(input: &str, fallback: &str) -> String {
    Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| *s != "-")
        .unwrap_or(fallback)
        .to_string()
}

fn load_cache(path: &Path) -> Result<DecisionMakerCache, CliError> {
    let cache = DecisionMakerCache::new();
    if !path.exists() {
        return Ok(cache);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read cache {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| CliError::parse(format!("cache {}: {e}", path.display())))?;
    let n = cache.import(&value).map_err(export_err)?;
    log::info!("loaded {n} cache keys from {}", path.display());
    Ok(cache)
}

/// Serialize first, then write beside the target and rename over it, so a
/// failure never leaves a truncated or `null` cache behind.
fn save_cache(cache: &DecisionMakerCache, path: &Path) -> Result<(), CliError> {
    let value = cache.export().map_err(export_err)?;
    let text = serde_json::to_string_pretty(&value).map_err(|e| CliError::general(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    let write_err = |e: std::io::Error| CliError::io(format!("cannot write cache {}: {e}", path.display()));
    std::fs::write(&tmp, text).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

fn print_progress(p: &StageProgress) {
    let counts: Vec<String> = p.counts.iter().map(|(k, v)| format!("{k}={v}")).collect();
    eprintln!("  [{}/{}] {}: {}", p.index, p.total, p.stage, counts.join(" "));
}

fn print_parity(report: &ParityReport) {
    for s in &report.stages {
        let mark = if s.ok() { "ok" } else { "DIVERGED" };
        eprintln!(
            "  {:<9} {:>5} ref / {:>5} pipeline  {mark}",
            s.stage.as_str(),
            s.reference_count,
            s.pipeline_count
        );
        for key in s.reference_only.iter().take(5) {
            eprintln!("      - {key}");
        }
        for key in s.pipeline_only.iter().take(5) {
            eprintln!("      + {key}");
        }
    }
    match report.first_divergence {
        Some(stage) => eprintln!("parity: first divergence at {stage}"),
        None => eprintln!("parity: ok"),
    }
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let settings = load_settings(args.settings.as_deref())?;
    let policies = load_policies(args.policies.as_deref())?;

    let demand = read_payload(&args.demand, args.demand_format)?;
    let supply = read_payload(&args.supply, args.supply_format)?;
    let mut request = RunRequest::new(
        args.mode.clone(),
        DatasetInput::from_payload(&args.provider, dataset_name(&args.demand, "demand"), demand),
        DatasetInput::from_payload(&args.provider, dataset_name(&args.supply, "supply"), supply),
    );
    request.presignal = args.presignal.clone();
    request.evidence = parse_evidence(&args.evidence)?;

    let reference = args
        .reference
        .as_deref()
        .map(|p| read_snapshot(p).map_err(|e| CliError::new(EXIT_PARITY_SNAPSHOT, format!("{}: {e}", p.display()))))
        .transpose()?;

    let cache = match args.cache.as_deref() {
        Some(path) => load_cache(path)?,
        None => DecisionMakerCache::new(),
    };
    let intros = IntroCache::new();
    let pipeline = Pipeline::new(&settings, &policies, &cache, &intros);

    let quiet = args.quiet;
    let outcome = pipeline
        .run(&request, reference.as_ref(), |p| {
            if !quiet {
                print_progress(p);
            }
        })
        .map_err(CliError::config)?;
    let snap = &outcome.snapshot;

    if let Some(path) = args.cache.as_deref() {
        save_cache(&cache, path)?;
    }
    if let Some(path) = args.output.as_deref() {
        write_snapshot(snap, path).map_err(export_err)?;
        eprintln!("wrote {}", path.display());
    }
    if let Some(path) = args.bundle.as_deref() {
        let context = json!({
            "demand": args.demand,
            "supply": args.supply,
            "settingsPath": args.settings,
            "policiesPath": args.policies,
        });
        let bundle = debug_bundle(snap, &settings, &outcome.events, context).map_err(export_err)?;
        write_debug_bundle(&bundle, path).map_err(export_err)?;
        eprintln!("wrote {}", path.display());
    }
    if args.json {
        let text = serde_json::to_string_pretty(snap.as_ref()).map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
    }

    eprintln!(
        "run {} ({}): {} entities, {} matches, {} ready, {} intros, {} blocked",
        snap.run_id,
        snap.mode,
        snap.entities.len(),
        snap.matches.len(),
        snap.ready.len(),
        snap.intros.len(),
        snap.blocked.len()
    );
    if let Some(report) = &outcome.parity {
        print_parity(report);
    }

    if outcome.is_fatal() {
        let first = &outcome.fatal[0];
        return Err(CliError::new(EXIT_RUN_FATAL, format!("{}: {}", first.code, first.message)));
    }
    if outcome.parity.as_ref().is_some_and(|r| !r.ok()) {
        return Err(CliError::new(EXIT_PARITY_DIVERGED, "run diverged from reference"));
    }
    if args.fail_on_empty && snap.ready.is_empty() {
        return Err(CliError::new(EXIT_RUN_NOTHING_READY, "no entity reached readiness"));
    }
    Ok(())
}

pub fn cmd_parity(reference: &Path, pipeline: &Path, json_output: bool) -> Result<(), CliError> {
    let load = |p: &Path| {
        read_snapshot(p).map_err(|e| CliError::new(EXIT_PARITY_SNAPSHOT, format!("{}: {e}", p.display())))
    };
    let report = compare_snapshots(&load(reference)?, &load(pipeline)?);

    if json_output {
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
    }
    print_parity(&report);

    if !report.ok() {
        return Err(CliError::new(EXIT_PARITY_DIVERGED, ""));
    }
    Ok(())
}
