//! `rgrid itemize` and `rgrid discover`: look at a dataset before running it.

use std::path::Path;

use routegrid_ingest::{discover, draft_mapping, itemize, DiscoveryOptions};
use serde_json::json;

use crate::input::{read_payload, InputFormat};
use crate::{load_settings, CliError};

pub fn cmd_itemize(input: &str, format: Option<InputFormat>, json_output: bool) -> Result<(), CliError> {
    let payload = read_payload(input, format)?;
    let (items, meta) = itemize(&payload);

    if json_output {
        let out = json!({ "meta": meta, "items": items });
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::general(e.to_string()))?;
        println!("{text}");
    }

    match &meta.wrapper_key {
        Some(key) => eprintln!(
            "{} items via {:?} (wrapper key \"{key}\", {} keys inspected)",
            meta.item_count, meta.itemization_method, meta.wrapper_keys_inspected
        ),
        None => eprintln!("{} items via {:?}", meta.item_count, meta.itemization_method),
    }
    Ok(())
}

pub fn cmd_discover(input: &str, format: Option<InputFormat>, settings: Option<&Path>) -> Result<(), CliError> {
    let settings = load_settings(settings)?;
    let payload = read_payload(input, format)?;
    let (items, _) = itemize(&payload);

    let opts = DiscoveryOptions {
        sample_size: settings.discovery.sample_size,
        max_depth: settings.discovery.max_depth,
        max_samples_per_path: settings.discovery.max_samples_per_path,
        top_candidates: settings.discovery.top_candidates,
    };
    let report = discover(&items, &opts);
    let mapping = draft_mapping(&report);

    let out = json!({ "report": report, "mapping": mapping });
    let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::general(e.to_string()))?;
    println!("{text}");

    eprintln!(
        "sampled {} of {} items, {} paths, draft confidence {:.2}",
        report.sampled_items,
        items.len(),
        report.paths.len(),
        mapping.confidence()
    );
    if report.is_empty() {
        eprintln!("no candidate paths found; the mapper will rely on its fixed key lists");
    }
    Ok(())
}
