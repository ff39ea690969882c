use regex::Captures;
use routegrid_core::{FailureCode, ValidationFailure};
use serde::Serialize;
use serde_json::json;

use crate::lexicon::{activity_hits, neutral_rewrites};
use crate::validator::{CopyContext, CopyValidator, ValidationResult};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeutralizeOutcome {
    pub text: String,
    /// `(original, replacement)` in order applied.
    pub rewrites: Vec<(String, String)>,
    pub result: ValidationResult,
    pub blocked: bool,
}

fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn tidy(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .replace(" ,", ",")
        .replace(" .", ".")
        .replace(" !", "!")
        .replace(" ?", "?")
}

/// Rewrite activity/timing words to neutral equivalents and re-validate.
///
/// Words with no neutral form stay in place; any activity language left after
/// rewriting blocks the text with `ACTIVITY_LANGUAGE`.
pub fn neutralize_intro(
    validator: &CopyValidator<'_>,
    text: &str,
    ctx: &CopyContext<'_>,
) -> NeutralizeOutcome {
    let mut out = text.to_string();
    let mut rewrites = Vec::new();

    for (re, neutral) in neutral_rewrites() {
        if !re.is_match(&out) {
            continue;
        }
        out = re
            .replace_all(&out, |caps: &Captures| {
                let found = &caps[0];
                rewrites.push((found.to_string(), neutral.to_string()));
                match_case(found, neutral)
            })
            .into_owned();
    }
    let out = tidy(&out);

    let residual = activity_hits(&out);
    let mut result = validator.validate(&out, ctx);
    if !residual.is_empty() {
        result.errors.insert(
            0,
            ValidationFailure::new(
                FailureCode::ActivityLanguage,
                format!("Activity language remains: {}", residual.join(", ")),
                "These words have no neutral rewrite.",
                "Rephrase by hand or supply a presignal.",
            )
            .with_meta(json!({"residual": residual})),
        );
    }
    let blocked = !result.passed();
    if blocked {
        log::debug!(
            "neutralized intro still blocked: {}",
            result
                .errors
                .iter()
                .map(|f| f.code.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );
    }

    NeutralizeOutcome {
        text: out,
        rewrites,
        result,
        blocked,
    }
}
