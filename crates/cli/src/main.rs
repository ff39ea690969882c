// routegrid CLI - headless matching runs over demand/supply datasets

mod copy;
mod exit_codes;
mod input;
mod inspect;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use routegrid_config::{ConfigError, ModePolicies, ModePolicySource, Settings};

use exit_codes::{config_exit_code, EXIT_ERROR, EXIT_RUN_IO, EXIT_RUN_PARSE, EXIT_SUCCESS, EXIT_USAGE};
use input::InputFormat;

#[derive(Parser)]
#[command(name = "rgrid")]
#[command(about = "Deterministic demand/supply matching (CLI, headless)")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a payload into a flat item list
    #[command(after_help = "\
Examples:
  rgrid itemize jobs.json
  rgrid itemize agencies.csv --json
  cat payload.json | rgrid itemize - -f json")]
    Itemize {
        /// Input file (- for stdin)
        input: String,

        /// Input format (inferred from extension if omitted)
        #[arg(long, short = 'f')]
        format: Option<InputFormat>,

        /// Print the items as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Sample items, score structural paths and draft a field mapping
    #[command(after_help = "\
Examples:
  rgrid discover jobs.json
  rgrid discover agencies.csv --settings routegrid.toml")]
    Discover {
        /// Input file (- for stdin)
        input: String,

        /// Input format (inferred from extension if omitted)
        #[arg(long, short = 'f')]
        format: Option<InputFormat>,

        /// Settings file (defaults to the user config location)
        #[arg(long, env = "ROUTEGRID_SETTINGS")]
        settings: Option<PathBuf>,
    },

    /// Run map, resolve, match, contact and intro stages
    #[command(after_help = "\
Exit code 7 means the run hit a pipeline-fatal block. Exit code 20 means a
--reference was given and the run diverged from it.

Examples:
  rgrid run --demand jobs.json --supply agencies.csv
  rgrid run --demand jobs.json --supply agencies.json --mode partnerships --json
  rgrid run --demand jobs.json --supply agencies.json --cache dm-cache.json -o run.json
  rgrid run --demand jobs.json --supply agencies.json --reference legacy-run.json")]
    Run(run::RunArgs),

    /// Compare a pipeline snapshot against a reference snapshot
    #[command(after_help = "\
Examples:
  rgrid parity legacy-run.json run.json
  rgrid parity legacy-run.json run.json --json")]
    Parity {
        /// Reference snapshot
        reference: PathBuf,

        /// Pipeline snapshot
        pipeline: PathBuf,

        /// Print the report as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Validate intro copy against a mode's evidence gate
    #[command(after_help = "\
Examples:
  rgrid check-copy intro.txt --mode recruiting
  echo 'Hi Ada, ...' | rgrid check-copy - --mode partnerships --send
  rgrid check-copy intro.txt --mode recruiting --neutralize --evidence job_postings")]
    CheckCopy(copy::CheckCopyArgs),

    /// List mode policies or print one as TOML
    #[command(after_help = "\
Examples:
  rgrid policies
  rgrid policies --mode recruiting
  rgrid policies --policies modes.toml")]
    Policies {
        /// Extra mode policy file, overlaid on the built-in modes
        #[arg(long, env = "ROUTEGRID_POLICIES")]
        policies: Option<PathBuf>,

        /// Print this mode as TOML
        #[arg(long)]
        mode: Option<String>,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  routegrid-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
            "\nsnapshot_version: 1",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  routegrid-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
            "\nsnapshot_version: 1",
        )
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            eprintln!("Usage: rgrid <command> [options]");
            eprintln!("       rgrid --help for more information");
            Ok(())
        }
        Some(Commands::Itemize { input, format, json }) => inspect::cmd_itemize(&input, format, json),
        Some(Commands::Discover { input, format, settings }) => {
            inspect::cmd_discover(&input, format, settings.as_deref())
        }
        Some(Commands::Run(args)) => run::cmd_run(args),
        Some(Commands::Parity { reference, pipeline, json }) => run::cmd_parity(&reference, &pipeline, json),
        Some(Commands::CheckCopy(args)) => copy::cmd_check_copy(args),
        Some(Commands::Policies { policies, mode }) => cmd_policies(policies.as_deref(), mode.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUN_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUN_PARSE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Create error from config error with proper exit code.
    pub fn config(err: ConfigError) -> Self {
        let code = config_exit_code(&err);
        let hint = match &err {
            ConfigError::UnknownMode(_) => Some("run `rgrid policies` to list known modes".to_string()),
            ConfigError::Parse(_) => Some("check the TOML syntax of the settings or policy file".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// shared loading
// ============================================================================

pub fn load_settings(path: Option<&std::path::Path>) -> Result<Settings, CliError> {
    let settings = Settings::load(path).map_err(CliError::config)?;
    settings.validate().map_err(CliError::config)?;
    Ok(settings)
}

/// Built-in modes, overlaid with `path` when given.
pub fn load_policies(path: Option<&std::path::Path>) -> Result<ModePolicies, CliError> {
    match path {
        Some(p) => {
            let extra = ModePolicies::load(p).map_err(CliError::config)?;
            Ok(ModePolicies::with_overrides(extra))
        }
        None => Ok(ModePolicies::builtin().clone()),
    }
}

// ============================================================================
// policies
// ============================================================================

fn cmd_policies(path: Option<&std::path::Path>, mode: Option<&str>) -> Result<(), CliError> {
    let policies = load_policies(path)?;
    let Some(mode) = mode else {
        for id in policies.mode_ids() {
            println!("{id}");
        }
        return Ok(());
    };

    let single = policies
        .subset(mode)
        .ok_or_else(|| CliError::config(ConfigError::UnknownMode(mode.to_string())))?;
    print!("{}", single.to_toml().map_err(CliError::config)?);
    Ok(())
}
