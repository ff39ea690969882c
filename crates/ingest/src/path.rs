//! Structural paths over `serde_json::Value`.
//!
//! Rendered as `$.company.domain`; `[]` fans out over array elements
//! (`$.emails[]`, `$.people[].email`). Keys containing `.` are not addressable.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Each,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `$.a.b[].c`. A missing `$` prefix is accepted.
    pub fn parse(s: &str) -> Self {
        let body = s.trim().trim_start_matches('$');
        let mut segments = Vec::new();
        for part in body.split('.').filter(|p| !p.is_empty()) {
            let mut key = part;
            let mut each = 0;
            while let Some(stripped) = key.strip_suffix("[]") {
                key = stripped;
                each += 1;
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            for _ in 0..each {
                segments.push(Segment::Each);
            }
        }
        Self { segments }
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    pub fn each(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Each);
        Self { segments }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last key segment, lowercased; `""` for the root.
    pub fn leaf_name(&self) -> String {
        self.segments
            .iter()
            .rev()
            .find_map(|s| match s {
                Segment::Key(k) => Some(k.to_lowercase()),
                Segment::Each => None,
            })
            .unwrap_or_default()
    }

    /// Resolve to every value reachable along the path.
    pub fn resolve<'a>(&self, item: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![item];
        for seg in &self.segments {
            let mut next = Vec::new();
            for v in current {
                match seg {
                    Segment::Key(k) => {
                        if let Some(child) = v.get(k.as_str()) {
                            next.push(child);
                        }
                    }
                    Segment::Each => {
                        if let Value::Array(arr) = v {
                            next.extend(arr.iter());
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// Non-empty leaf strings along the path, in document order. A terminal
    /// array of scalars is flattened.
    pub fn resolve_strings(&self, item: &Value) -> Vec<String> {
        let mut out = Vec::new();
        for v in self.resolve(item) {
            match v {
                Value::Array(arr) => out.extend(arr.iter().filter_map(leaf_text)),
                other => out.extend(leaf_text(other)),
            }
        }
        out
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("$")?;
        for seg in &self.segments {
            match seg {
                Segment::Key(k) => write!(f, ".{k}")?,
                Segment::Each => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// Trimmed text of a scalar leaf. Strings and numbers only; empty → `None`.
pub fn leaf_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
