//! Structured run events and counters.
//!
//! Every event is mirrored to the `log` facade, so a human tailing the log and
//! the snapshot/parity consumers read the same stream.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StageStarted,
    StageFinished,
    Blocked,
    Fatal,
    Fallback,
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub stage: String,
    pub kind: EventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub fields: Value,
}

/// Counters keyed `stage.outcome` (e.g. `match.category_fit`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
}

impl Metrics {
    pub fn incr(&mut self, key: &str) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: &str, n: u64) {
        *self.counters.entry(key.to_string()).or_insert(0) += n;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }

    /// Counters whose key starts with `stage.`.
    pub fn for_stage(&self, stage: &str) -> BTreeMap<&str, u64> {
        let prefix = format!("{stage}.");
        self.counters
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest, *v)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<RunEvent>,
    pub metrics: Metrics,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, stage: &str, kind: EventKind, message: impl Into<String>, fields: Value) {
        let message = message.into();
        match kind {
            EventKind::Fatal => log::error!("[{stage}] {message}"),
            EventKind::Blocked | EventKind::Fallback => log::debug!("[{stage}] {message}"),
            _ => log::info!("[{stage}] {message}"),
        }
        self.events.push(RunEvent {
            seq: self.events.len() as u64,
            stage: stage.to_string(),
            kind,
            message,
            fields,
        });
    }

    pub fn note(&mut self, stage: &str, message: impl Into<String>) {
        self.emit(stage, EventKind::Note, message, Value::Null);
    }

    pub fn events(&self) -> &[RunEvent] {
        &self.events
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &RunEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}
