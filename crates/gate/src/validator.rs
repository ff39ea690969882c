use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use routegrid_config::{ModePolicy, ModePolicySource, VocabularyProfile};
use routegrid_core::{EntityType, EvidenceType, FailureCode, ValidationFailure};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::lexicon::{
    activity_hits, demand_only_phrases, greeting_re, sentence_count, supply_only_phrases,
    PhraseSet, STRICT_HYPE_WORDS,
};

pub const MIN_CHARS: usize = 30;
pub const MAX_CHARS: usize = 500;
pub const MIN_SENTENCES: usize = 2;
pub const MAX_SENTENCES: usize = 4;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// What the copy is for and what backs it.
#[derive(Debug, Clone, Copy)]
pub struct CopyContext<'a> {
    pub mode: &'a str,
    /// Side the copy is addressed to.
    pub audience: EntityType,
    /// Operator-supplied justification for timing/activity claims.
    pub presignal: Option<&'a str>,
    pub evidence: &'a [EvidenceType],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationFailure>,
    pub warnings: Vec<ValidationFailure>,
}

impl ValidationResult {
    /// No errors. Warnings allowed.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// No errors and no warnings.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn first_error(&self) -> Option<&ValidationFailure> {
        self.errors.first()
    }

    pub fn has_code(&self, code: FailureCode) -> bool {
        self.errors.iter().chain(&self.warnings).any(|f| f.code == code)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// A mode's vocabulary compiled for matching.
#[derive(Debug)]
struct ModeLexicon {
    forbidden: PhraseSet,
    /// One set per `evidence_rules` entry, same order.
    claims: Vec<PhraseSet>,
}

impl ModeLexicon {
    fn compile(policy: &ModePolicy) -> Self {
        let mut forbidden = policy.effective_forbidden();
        if policy.vocabulary_profile == VocabularyProfile::Strict {
            forbidden.extend(STRICT_HYPE_WORDS.iter().copied());
        }
        Self {
            forbidden: PhraseSet::new(forbidden),
            claims: policy.evidence_rules.iter().map(|r| PhraseSet::new(&r.words)).collect(),
        }
    }
}

pub struct CopyValidator<'p> {
    policies: &'p dyn ModePolicySource,
    strict_mode: bool,
    min_presignal_chars: usize,
    lexicons: RwLock<HashMap<String, Arc<ModeLexicon>>>,
}

impl<'p> CopyValidator<'p> {
    pub fn new(policies: &'p dyn ModePolicySource) -> Self {
        Self {
            policies,
            strict_mode: false,
            min_presignal_chars: 20,
            lexicons: RwLock::new(HashMap::new()),
        }
    }

    pub fn strict(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    pub fn min_presignal_chars(mut self, chars: usize) -> Self {
        self.min_presignal_chars = chars;
        self
    }

    pub fn policies(&self) -> &'p dyn ModePolicySource {
        self.policies
    }

    pub fn validate(&self, text: &str, ctx: &CopyContext<'_>) -> ValidationResult {
        self.run(text, ctx, self.strict_mode)
    }

    /// Strict re-validation. Only a result with neither errors nor warnings
    /// authorizes a send.
    pub fn can_send(&self, text: &str, ctx: &CopyContext<'_>) -> bool {
        self.check_send(text, ctx).is_clean()
    }

    pub fn check_send(&self, text: &str, ctx: &CopyContext<'_>) -> ValidationResult {
        self.run(text, ctx, true)
    }

    fn run(&self, text: &str, ctx: &CopyContext<'_>, strict: bool) -> ValidationResult {
        let mut result = ValidationResult::default();

        // 1. Presignal: runs first and ends validation on failure.
        if let Some(failure) = self.presignal_gate(text, ctx) {
            result.errors.push(failure);
            return result;
        }

        // 2. Structure.
        for failure in structural_failures(text) {
            if strict {
                result.errors.push(failure);
            } else {
                result.warnings.push(failure);
            }
        }
        if !result.errors.is_empty() {
            return result;
        }

        // 3. Lane crossing.
        result.errors.extend(lane_failures(text, ctx.audience));
        if !result.errors.is_empty() {
            return result;
        }

        // 4. Mode vocabulary and evidence-gated claims.
        result.errors.extend(self.mode_failures(text, ctx));
        result
    }

    /// Policies are read-only, so each mode is compiled on first use.
    fn lexicon(&self, policy: &ModePolicy) -> Arc<ModeLexicon> {
        if let Some(hit) = self.lexicons.read().get(&policy.id) {
            return Arc::clone(hit);
        }
        let compiled = Arc::new(ModeLexicon::compile(policy));
        Arc::clone(self.lexicons.write().entry(policy.id.clone()).or_insert(compiled))
    }

    fn presignal_gate(&self, text: &str, ctx: &CopyContext<'_>) -> Option<ValidationFailure> {
        let presignal_chars = ctx.presignal.map_or(0, |p| p.trim().chars().count());
        if presignal_chars >= self.min_presignal_chars {
            return None;
        }
        let hits = activity_hits(text);
        if hits.is_empty() {
            return None;
        }
        Some(
            ValidationFailure::new(
                FailureCode::PresignalRequired,
                format!("Timing language without a presignal: {}", hits.join(", ")),
                "Activity or timing words make a claim about what the recipient is doing now. \
                 Those claims need operator-supplied context.",
                format!(
                    "Add a presignal of at least {} characters, or remove the timing words.",
                    self.min_presignal_chars
                ),
            )
            .with_meta(json!({
                "activityWords": hits,
                "presignalChars": presignal_chars,
                "requiredChars": self.min_presignal_chars,
            })),
        )
    }

    fn mode_failures(&self, text: &str, ctx: &CopyContext<'_>) -> Vec<ValidationFailure> {
        let Some(policy) = self.policies.policy(ctx.mode) else {
            return vec![ValidationFailure::new(
                FailureCode::UnknownMode,
                format!("Unknown mode '{}'", ctx.mode),
                "Copy is checked against the vocabulary of a configured mode.",
                format!("Use one of: {}", self.policies.mode_ids().join(", ")),
            )
            .with_meta(json!({"mode": ctx.mode}))];
        };

        let lexicon = self.lexicon(policy);
        let mut out = Vec::new();
        for word in lexicon.forbidden.hits(text) {
            out.push(
                ValidationFailure::new(
                    FailureCode::ForbiddenWord,
                    format!("'{word}' is not allowed in {} copy", policy.id),
                    format!(
                        "The {} mode ({} vocabulary) forbids this word.",
                        policy.id, policy.vocabulary_profile
                    ),
                    format!("Remove or rephrase '{word}'."),
                )
                .with_meta(json!({"word": word, "mode": policy.id})),
            );
        }

        for (rule, words) in policy.evidence_rules.iter().zip(&lexicon.claims) {
            let Some(word) = words.first_hit(text) else {
                continue;
            };
            if rule.requires.iter().any(|t| ctx.evidence.contains(t)) {
                continue;
            }
            let requires: Vec<&str> = rule.requires.iter().map(|t| t.as_str()).collect();
            out.push(
                ValidationFailure::new(
                    FailureCode::EvidenceRequired,
                    format!("'{word}' claims {} without evidence", rule.claim),
                    format!("A {} claim needs supporting evidence.", rule.claim),
                    format!("Attach one of: {}, or drop the claim.", requires.join(", ")),
                )
                .with_meta(json!({
                    "claim": rule.claim,
                    "word": word,
                    "requires": requires,
                })),
            );
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Rule groups
// ---------------------------------------------------------------------------

fn structural_failures(text: &str) -> Vec<ValidationFailure> {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    let mut out = Vec::new();

    if chars < MIN_CHARS {
        out.push(
            ValidationFailure::new(
                FailureCode::TooShort,
                format!("Copy is {chars} characters"),
                format!("Intros under {MIN_CHARS} characters read as spam."),
                "Add one sentence of context.",
            )
            .with_meta(json!({"chars": chars, "min": MIN_CHARS})),
        );
    } else if chars > MAX_CHARS {
        out.push(
            ValidationFailure::new(
                FailureCode::TooLong,
                format!("Copy is {chars} characters"),
                format!("Intros over {MAX_CHARS} characters are rarely read."),
                "Cut it down to the match and the ask.",
            )
            .with_meta(json!({"chars": chars, "max": MAX_CHARS})),
        );
    }

    if !greeting_re().is_match(trimmed) {
        out.push(ValidationFailure::new(
            FailureCode::MissingGreeting,
            "Copy does not open with a greeting",
            "Intros start by addressing the recipient.",
            "Start with \"Hi <name>,\".",
        ));
    }

    let sentences = sentence_count(trimmed);
    if sentences < MIN_SENTENCES {
        out.push(
            ValidationFailure::new(
                FailureCode::TooFewSentences,
                format!("{sentences} sentence(s)"),
                format!("Intros need {MIN_SENTENCES}-{MAX_SENTENCES} sentences."),
                "Say who the match is and what you are asking.",
            )
            .with_meta(json!({"sentences": sentences})),
        );
    } else if sentences > MAX_SENTENCES {
        out.push(
            ValidationFailure::new(
                FailureCode::TooManySentences,
                format!("{sentences} sentences"),
                format!("Intros need {MIN_SENTENCES}-{MAX_SENTENCES} sentences."),
                "Merge or drop sentences.",
            )
            .with_meta(json!({"sentences": sentences})),
        );
    }
    out
}

fn lane_failures(text: &str, audience: EntityType) -> Vec<ValidationFailure> {
    // Copy to one side must not use the other side's phrases.
    let foreign = match audience {
        EntityType::Demand => supply_only_phrases(),
        EntityType::Supply => demand_only_phrases(),
    };
    foreign
        .hits(text)
        .map(|phrase| {
            ValidationFailure::new(
                FailureCode::LaneCrossing,
                format!("'{phrase}' does not belong in {audience} copy"),
                format!(
                    "This phrase is written for the {} side.",
                    audience.opposite()
                ),
                "Rewrite the sentence from the recipient's side of the match.",
            )
            .with_meta(json!({"phrase": phrase, "audience": audience.as_str()}))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
