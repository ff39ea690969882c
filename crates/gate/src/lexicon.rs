//! Fixed word and phrase lists used by the validator.

use std::sync::OnceLock;

use regex::Regex;

/// Activity / timing language. Needs a presignal to appear in copy.
pub const ACTIVITY_WORDS: &[&str] = &[
    "hiring",
    "scaling",
    "recently",
    "currently",
    "expanding",
    "growing",
    "raising",
    "raised",
    "launching",
    "launched",
    "actively",
    "right now",
    "this quarter",
    "this month",
    "ramping",
];

/// Phrases that only make sense addressed to the demand side.
pub const DEMAND_ONLY_PHRASES: &[&str] = &[
    "your open roles",
    "your hiring needs",
    "fill your roles",
    "candidates for your team",
    "your team is growing",
    "roles you are trying to fill",
];

/// Phrases that only make sense addressed to the supply side.
pub const SUPPLY_ONLY_PHRASES: &[&str] = &[
    "your clients",
    "your candidates",
    "your talent pool",
    "your placements",
    "your bench",
    "companies you work with",
];

/// Extra forbidden words under the `strict` vocabulary profile.
pub const STRICT_HYPE_WORDS: &[&str] = &[
    "best-in-class",
    "world-class",
    "revolutionary",
    "game-changing",
    "no-brainer",
];

/// Neutral rewrites used by `neutralize_intro`. Words with no entry here are
/// left in place and block the draft.
pub const NEUTRAL_REWRITES: &[(&str, &str)] = &[
    ("actively hiring", "building the team"),
    ("hiring", "building the team"),
    ("scaling", "developing"),
    ("expanding", "developing"),
    ("growing", "developing"),
    ("launching", "working on"),
    ("launched", "released"),
    ("recently", ""),
    ("currently", ""),
    ("right now", ""),
    ("this quarter", ""),
    ("this month", ""),
];

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn activity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternation(ACTIVITY_WORDS))).expect("activity regex")
    })
}

pub fn greeting_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:hi|hey|hello|dear|good (?:morning|afternoon|evening))\b")
            .expect("greeting regex")
    })
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("sentence regex"))
}

/// Activity words present in `text`, lowercased, in order of appearance.
pub fn activity_hits(text: &str) -> Vec<String> {
    activity_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Phrase sets
// ---------------------------------------------------------------------------

/// Case-insensitive whole-word/phrase matcher over a fixed list, compiled once.
#[derive(Debug, Default)]
pub struct PhraseSet {
    phrases: Vec<(String, Regex)>,
}

impl PhraseSet {
    pub fn new<S: AsRef<str>>(phrases: impl IntoIterator<Item = S>) -> Self {
        let mut out = Vec::new();
        for phrase in phrases {
            let phrase = phrase.as_ref().trim();
            if phrase.is_empty() || out.iter().any(|(p, _): &(String, Regex)| p == phrase) {
                continue;
            }
            match Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(phrase))) {
                Ok(re) => out.push((phrase.to_string(), re)),
                Err(e) => log::warn!("skipping phrase '{phrase}': {e}"),
            }
        }
        Self { phrases: out }
    }

    /// Phrases present in `text`, in list order.
    pub fn hits<'s>(&'s self, text: &'s str) -> impl Iterator<Item = &'s str> + 's {
        self.phrases
            .iter()
            .filter(move |(_, re)| re.is_match(text))
            .map(|(p, _)| p.as_str())
    }

    pub fn first_hit<'s>(&'s self, text: &'s str) -> Option<&'s str> {
        self.hits(text).next()
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

pub fn demand_only_phrases() -> &'static PhraseSet {
    static SET: OnceLock<PhraseSet> = OnceLock::new();
    SET.get_or_init(|| PhraseSet::new(DEMAND_ONLY_PHRASES))
}

pub fn supply_only_phrases() -> &'static PhraseSet {
    static SET: OnceLock<PhraseSet> = OnceLock::new();
    SET.get_or_init(|| PhraseSet::new(SUPPLY_ONLY_PHRASES))
}

/// `NEUTRAL_REWRITES` as compiled whole-word patterns, in rewrite order.
pub fn neutral_rewrites() -> &'static [(Regex, &'static str)] {
    static RES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RES.get_or_init(|| {
        NEUTRAL_REWRITES
            .iter()
            .map(|(word, neutral)| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).expect("rewrite regex");
                (re, *neutral)
            })
            .collect()
    })
}

/// Sentences with at least one letter. A greeting line ending in a comma is
/// part of the first sentence.
pub fn sentence_count(text: &str) -> usize {
    sentence_end_re()
        .split(text.trim())
        .filter(|s| s.chars().any(|c| c.is_alphabetic()))
        .count()
}
