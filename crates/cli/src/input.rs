//! Dataset files: JSON payloads, or CSV with a header row.

use std::io::Read;
use std::path::Path;

use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Json,
    Csv,
    Tsv,
}

impl InputFormat {
    fn infer(input: &str) -> Option<Self> {
        let ext = Path::new(input).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            _ => None,
        }
    }
}

pub fn read_text(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::io(format!("cannot read stdin: {e}")))?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).map_err(|e| CliError::io(format!("cannot read {input}: {e}")))
}

/// Read `input` into a JSON payload. CSV rows become objects keyed by header.
pub fn read_payload(input: &str, format: Option<InputFormat>) -> Result<Value, CliError> {
    let format = match format.or_else(|| InputFormat::infer(input)) {
        Some(f) => f,
        None if input == "-" => {
            return Err(CliError::args("reading stdin requires --format"));
        }
        None => InputFormat::Json,
    };
    let text = read_text(input)?;
    match format {
        InputFormat::Json => serde_json::from_str(&text)
            .map_err(|e| CliError::parse(format!("{input}: invalid JSON: {e}"))),
        InputFormat::Csv => csv_rows(&text, b',').map(Value::Array),
        InputFormat::Tsv => csv_rows(&text, b'\t').map(Value::Array),
    }
}

/// Header row → object keys. Empty cells are left out so the mapper treats
/// them as missing.
pub fn csv_rows(data: &str, delimiter: u8) -> Result<Vec<Value>, CliError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CliError::parse(format!("CSV header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CliError::parse(format!("CSV row {}: {e}", i + 2)))?;
        let mut obj = Map::new();
        for (key, cell) in headers.iter().zip(record.iter()) {
            let cell = cell.trim();
            if key.is_empty() || cell.is_empty() {
                continue;
            }
            obj.insert(key.clone(), Value::String(cell.to_string()));
        }
        rows.push(Value::Object(obj));
    }
    Ok(rows)
}
