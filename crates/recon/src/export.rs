//! Snapshot export and the redacted debug bundle.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use routegrid_config::Settings;
use serde_json::{json, Value};

use crate::error::ExportError;
use crate::events::EventLog;
use crate::snapshot::PipelineRunSnapshot;

pub const BUNDLE_VERSION: u32 = 1;

/// Nesting depth the redactor walks. Deeper values are replaced wholesale.
const REDACT_DEPTH: usize = 32;

const REDACTED: &str = "[REDACTED]";

fn secret_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(api[_-]?key|secret|token|password|passwd|authorization|credential|private[_-]?key)")
            .expect("secret key regex")
    })
}

pub fn is_secret_key(key: &str) -> bool {
    secret_key_re().is_match(key)
}

/// First and last 4 characters of values longer than 8, else `[REDACTED]`.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return REDACTED.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Mask every value whose object key looks like a secret. Non-string
/// secrets (objects, numbers) are replaced with `[REDACTED]`.
pub fn redact_value(value: &mut Value, depth: usize) {
    if depth == 0 {
        if value.is_object() || value.is_array() {
            *value = Value::String(REDACTED.to_string());
        }
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                redact_value(item, depth - 1);
            }
        }
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if !is_secret_key(key) {
                    redact_value(v, depth - 1);
                    continue;
                }
                let masked = match &*v {
                    Value::String(s) => Value::String(mask_secret(s)),
                    Value::Null => Value::Null,
                    _ => Value::String(REDACTED.to_string()),
                };
                *v = masked;
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

pub fn snapshot_json(snapshot: &PipelineRunSnapshot) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn write_snapshot(snapshot: &PipelineRunSnapshot, path: &Path) -> Result<(), ExportError> {
    fs::write(path, snapshot_json(snapshot)?)?;
    log::info!("wrote snapshot {} to {}", snapshot.run_id, path.display());
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<PipelineRunSnapshot, ExportError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

// ---------------------------------------------------------------------------
// Debug bundle
// ---------------------------------------------------------------------------

/// Snapshot, settings, event stream and caller-supplied context in one
/// redacted JSON document.
pub fn debug_bundle(
    snapshot: &PipelineRunSnapshot,
    settings: &Settings,
    events: &EventLog,
    context: Value,
) -> Result<Value, ExportError> {
    let mut bundle = json!({
        "bundleVersion": BUNDLE_VERSION,
        "exportedAt": Utc::now().to_rfc3339(),
        "engineVersion": env!("CARGO_PKG_VERSION"),
        "runId": snapshot.run_id,
        "snapshot": serde_json::to_value(snapshot)?,
        "settings": serde_json::to_value(settings)?,
        "events": serde_json::to_value(events.events())?,
        "context": context,
    });
    redact_value(&mut bundle, REDACT_DEPTH);
    Ok(bundle)
}

pub fn write_debug_bundle(bundle: &Value, path: &Path) -> Result<(), ExportError> {
    fs::write(path, serde_json::to_string_pretty(bundle)?)?;
    log::info!("wrote debug bundle to {}", path.display());
    Ok(())
}
