//! `rgrid check-copy`: run intro copy through the evidence gate.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use routegrid_config::ModePolicySource;
use routegrid_core::{EntityType, ValidationFailure};
use routegrid_gate::{neutralize_intro, CopyContext, CopyValidator, ValidationResult};
use serde_json::json;

use crate::exit_codes::{EXIT_COPY_NEUTRALIZE_BLOCKED, EXIT_COPY_REJECTED, EXIT_COPY_WARNINGS};
use crate::input::read_text;
use crate::run::parse_evidence;
use crate::{load_policies, load_settings, CliError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Audience {
    Demand,
    Supply,
}

impl From<Audience> for EntityType {
    fn from(a: Audience) -> Self {
        match a {
            Audience::Demand => EntityType::Demand,
            Audience::Supply => EntityType::Supply,
        }
    }
}

#[derive(Args)]
pub struct CheckCopyArgs {
    /// Copy file (- for stdin)
    input: String,

    /// Mode policy id
    #[arg(long, short = 'm', default_value = "recruiting")]
    mode: String,

    /// Side the copy is addressed to
    #[arg(long, value_enum, default_value_t = Audience::Demand)]
    audience: Audience,

    /// Operator context backing timing claims
    #[arg(long)]
    presignal: Option<String>,

    /// Evidence type backing claims in the copy. Repeatable.
    #[arg(long, value_name = "TYPE")]
    evidence: Vec<String>,

    /// Apply send-time rules: structure failures are errors and warnings fail
    #[arg(long)]
    send: bool,

    /// Rewrite activity words to neutral forms before validating
    #[arg(long)]
    neutralize: bool,

    /// Settings file (defaults to the user config location)
    #[arg(long, env = "ROUTEGRID_SETTINGS")]
    settings: Option<PathBuf>,

    /// Extra mode policy file, overlaid on the built-in modes
    #[arg(long, env = "ROUTEGRID_POLICIES")]
    policies: Option<PathBuf>,

    /// Print the result as JSON to stdout
    #[arg(long)]
    json: bool,
}

fn print_failures(label: &str, failures: &[ValidationFailure]) {
    for f in failures {
        eprintln!("{label} {}: {}", f.code, f.message);
        if !f.how_to_fix.is_empty() {
            eprintln!("      fix: {}", f.how_to_fix);
        }
    }
}

fn exit_for(result: &ValidationResult, send: bool) -> Result<(), CliError> {
    if !result.passed() {
        let n = result.errors.len();
        return Err(CliError::new(EXIT_COPY_REJECTED, format!("copy rejected ({n} error(s))")));
    }
    if send && !result.is_clean() {
        let n = result.warnings.len();
        return Err(CliError::new(EXIT_COPY_WARNINGS, format!("copy not sendable ({n} warning(s))")));
    }
    Ok(())
}

pub fn cmd_check_copy(args: CheckCopyArgs) -> Result<(), CliError> {
    let settings = load_settings(args.settings.as_deref())?;
    let policies = load_policies(args.policies.as_deref())?;
    policies.require(&args.mode).map_err(CliError::config)?;

    let evidence = parse_evidence(&args.evidence)?;

    let text = read_text(&args.input)?;
    let validator = CopyValidator::new(&policies)
        .strict(settings.copy.strict_mode)
        .min_presignal_chars(settings.copy.min_presignal_chars);
    let ctx = CopyContext {
        mode: &args.mode,
        audience: args.audience.into(),
        presignal: args.presignal.as_deref(),
        evidence: &evidence,
    };

    if args.neutralize {
        let outcome = neutralize_intro(&validator, text.trim(), &ctx);
        if args.json {
            let out = serde_json::to_string_pretty(&outcome).map_err(|e| CliError::general(e.to_string()))?;
            println!("{out}");
        } else {
            println!("{}", outcome.text);
        }
        for (from, to) in &outcome.rewrites {
            eprintln!("rewrote \"{from}\" -> \"{to}\"");
        }
        print_failures("error", &outcome.result.errors);
        print_failures("warn ", &outcome.result.warnings);
        if outcome.blocked {
            return Err(CliError::new(EXIT_COPY_NEUTRALIZE_BLOCKED, "copy still blocked after neutralizing"));
        }
        return exit_for(&outcome.result, args.send);
    }

    let result = if args.send {
        validator.check_send(text.trim(), &ctx)
    } else {
        validator.validate(text.trim(), &ctx)
    };
    if args.json {
        let out = json!({
            "mode": args.mode,
            "send": args.send,
            "passed": result.passed(),
            "clean": result.is_clean(),
            "errors": result.errors,
            "warnings": result.warnings,
        });
        let out = serde_json::to_string_pretty(&out).map_err(|e| CliError::general(e.to_string()))?;
        println!("{out}");
    }
    print_failures("error", &result.errors);
    print_failures("warn ", &result.warnings);
    if result.is_clean() {
        eprintln!("copy ok");
    }
    exit_for(&result, args.send)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_only_fail_in_send_mode() {
        let mut result = ValidationResult::default();
        result.warnings.push(ValidationFailure::new(
            routegrid_core::FailureCode::TooShort,
            "short",
            "",
            "",
        ));
        assert!(exit_for(&result, false).is_ok());
        assert_eq!(exit_for(&result, true).unwrap_err().code, EXIT_COPY_WARNINGS);
    }
}
