use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{leaf_text, JsonPath};
use crate::scorers::FieldCategory;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Items sampled from the head of the batch.
    pub sample_size: usize,
    /// Maximum number of object keys followed from the item root.
    /// Array fan-out (`[]`) does not count towards depth.
    pub max_depth: usize,
    /// Distinct sample values kept per path.
    pub max_samples_per_path: usize,
    /// Candidates kept per category.
    pub top_candidates: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            sample_size: 20,
            max_depth: 4,
            max_samples_per_path: 5,
            top_candidates: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Every structural path seen in the sample, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStats {
    pub path: String,
    pub samples: Vec<String>,
    /// Share of sampled items carrying a non-empty value at this path.
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePath {
    pub path: String,
    pub category: FieldCategory,
    pub samples: Vec<String>,
    pub frequency: f64,
    /// Category score (0–100) multiplied by frequency.
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub sampled_items: usize,
    pub paths: Vec<PathStats>,
    pub candidates: BTreeMap<FieldCategory, Vec<CandidatePath>>,
}

impl DiscoveryReport {
    pub fn candidates_for(&self, category: FieldCategory) -> &[CandidatePath] {
        self.candidates
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.values().all(|v| v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

struct PathAcc {
    path: String,
    samples: Vec<String>,
    items_seen: usize,
}

struct Walker<'a> {
    opts: &'a DiscoveryOptions,
    order: Vec<PathAcc>,
    index: HashMap<String, usize>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, value: &Value, path: &JsonPath, depth: usize, seen: &mut HashSet<usize>) {
        match value {
            Value::Object(map) => {
                if depth >= self.opts.max_depth {
                    return;
                }
                for (key, child) in map {
                    self.walk(child, &path.child(key), depth + 1, seen);
                }
            }
            Value::Array(arr) => {
                let each = path.each();
                for el in arr.iter().take(self.opts.max_samples_per_path) {
                    self.walk(el, &each, depth, seen);
                }
            }
            leaf => {
                if path.depth() == 0 {
                    return;
                }
                if let Some(text) = leaf_text(leaf) {
                    self.record(path.to_string(), text, seen);
                }
            }
        }
    }

    fn record(&mut self, path: String, text: String, seen: &mut HashSet<usize>) {
        let idx = match self.index.get(&path) {
            Some(i) => *i,
            None => {
                let i = self.order.len();
                self.index.insert(path.clone(), i);
                self.order.push(PathAcc {
                    path,
                    samples: Vec::new(),
                    items_seen: 0,
                });
                i
            }
        };
        let acc = &mut self.order[idx];
        if seen.insert(idx) {
            acc.items_seen += 1;
        }
        if acc.samples.len() < self.opts.max_samples_per_path && !acc.samples.contains(&text) {
            acc.samples.push(text);
        }
    }
}

/// Enumerate structural paths over a head sample and rank them per category.
///
/// Ties keep first-seen path order (stable sort), so the same payload always
/// yields the same ranking.
pub fn discover(items: &[Value], opts: &DiscoveryOptions) -> DiscoveryReport {
    let sample: Vec<&Value> = items.iter().take(opts.sample_size).collect();
    let mut walker = Walker {
        opts,
        order: Vec::new(),
        index: HashMap::new(),
    };

    for item in &sample {
        let mut seen = HashSet::new();
        walker.walk(item, &JsonPath::root(), 0, &mut seen);
    }

    let sampled = sample.len();
    let paths: Vec<PathStats> = walker
        .order
        .into_iter()
        .map(|acc| PathStats {
            frequency: if sampled == 0 {
                0.0
            } else {
                acc.items_seen as f64 / sampled as f64
            },
            path: acc.path,
            samples: acc.samples,
        })
        .collect();

    let mut candidates = BTreeMap::new();
    for category in FieldCategory::ALL {
        let mut ranked: Vec<CandidatePath> = paths
            .iter()
            .filter_map(|p| {
                let score = category.score(&p.path, &p.samples) * p.frequency;
                (score > 0.0).then(|| CandidatePath {
                    path: p.path.clone(),
                    category,
                    samples: p.samples.clone(),
                    frequency: p.frequency,
                    score,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(opts.top_candidates);
        candidates.insert(category, ranked);
    }

    log::debug!(
        "schema discovery: sampled={} paths={} categories_with_candidates={}",
        sampled,
        paths.len(),
        candidates.values().filter(|v| !v.is_empty()).count()
    );

    DiscoveryReport {
        sampled_items: sampled,
        paths,
        candidates,
    }
}
