// fieldmerge CLI - reconcile field-survey GeoPackages into one layer

mod diagnose;
mod exit_codes;
mod logging;
mod pipeline;
mod report;
mod snapshot;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use fieldmerge_config::Settings;
use fieldmerge_recon::ReconConfig;

use diagnose::{append_error_log, DiagnoseTargets, ERROR_LOG_FILE};
use exit_codes::{
    EXIT_ERROR, EXIT_FATAL_INPUT, EXIT_INVALID_CONFIG, EXIT_OUTPUT_WRITE, EXIT_PARTIAL,
    EXIT_SUCCESS, EXIT_USAGE,
};
use pipeline::{PipelineError, RunPlan};
use snapshot::SnapshotSources;

#[derive(Parser)]
#[command(name = "fieldmerge")]
#[command(about = "Merge field-survey GeoPackages, enrich them from lookups, drop duplicates")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (off, error, warn, info, debug, trace). Defaults to RUST_LOG, then warn
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write a rotating log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile survey files into the output GeoPackage
    #[command(after_help = "\
Examples:
  fieldmerge run --input-dir uploads/ --species species.csv --output combined.gpkg
  fieldmerge run a.gpkg b.gpkg --species species.csv --metadata form.xlsx --output combined.gpkg
  fieldmerge run --config survey.toml --json
  fieldmerge run                      # reuse the paths saved by the last run

Paths not given on the command line come from the settings file
(see `fieldmerge settings path`). Successful runs save them back.")]
    Run {
        /// Survey GeoPackages to load, in order
        inputs: Vec<PathBuf>,

        /// Folder of *.gpkg uploads; also searched for the metadata spreadsheet
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Species lookup CSV
        #[arg(long)]
        species: Option<PathBuf>,

        /// Submission form export (.xlsx or .csv). Default: the single *.xlsx in --input-dir
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Consolidated GeoPackage to write
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Reconciliation config (TOML). Defaults apply when omitted
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Also write the merged table, before duplicate removal, here
        #[arg(long)]
        merged_copy: Option<PathBuf>,

        /// Folder for timestamped merged copies when --merged-copy is not given
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Do not update log.xlsx next to the output
        #[arg(long)]
        no_run_log: bool,

        /// Ignore the rows already in the output file
        #[arg(long)]
        no_merge_existing: bool,

        /// On a fatal error, copy all inputs and a report into a snapshot folder here
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Exit with code 6 when any input file was skipped
        #[arg(long)]
        strict: bool,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Do not save the paths used to the settings file
        #[arg(long)]
        no_save_settings: bool,
    },

    /// Check a reconciliation config without running
    #[command(after_help = "\
Examples:
  fieldmerge validate survey.toml")]
    Validate {
        /// Path to the TOML config
        config: PathBuf,
    },

    /// Inspect the species CSV, spreadsheets, survey files and output
    #[command(after_help = "\
Examples:
  fieldmerge diagnose --input-dir uploads/ --species species.csv --output combined.gpkg
  fieldmerge diagnose --json
  fieldmerge diagnose --error-log /tmp/fieldmerge-errors.txt

Exits 1 when a problem is found. The text report is also appended to
error_log.txt next to the output (or in the input folder).")]
    Diagnose {
        #[arg(long)]
        input_dir: Option<PathBuf>,

        #[arg(long)]
        species: Option<PathBuf>,

        #[arg(long)]
        metadata: Option<PathBuf>,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Reconciliation config (TOML), for column names
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Error log to append to
        #[arg(long, conflicts_with = "no_error_log")]
        error_log: Option<PathBuf>,

        /// Do not append to the error log
        #[arg(long)]
        no_error_log: bool,
    },

    /// Show or reset the saved paths
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the saved settings as JSON
    #[command(after_help = "\
Examples:
  fieldmerge settings show")]
    Show,

    /// Print the settings file location
    #[command(after_help = "\
Examples:
  fieldmerge settings path
  FIELDMERGE_SETTINGS=./settings.json fieldmerge settings path")]
    Path,

    /// Delete the settings file
    #[command(after_help = "\
Examples:
  fieldmerge settings clear")]
    Clear,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logger = match logging::init_logging(cli.log_level.as_deref(), cli.log_dir.as_deref()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let result = match cli.command {
        Commands::Run {
            inputs,
            input_dir,
            species,
            metadata,
            output,
            config,
            merged_copy,
            backup_dir,
            no_run_log,
            no_merge_existing,
            snapshot_dir,
            strict,
            json,
            no_save_settings,
        } => cmd_run(RunArgs {
            inputs,
            paths: Settings {
                input_dir,
                species_csv: species,
                output_gpkg: output,
                backup_dir,
            },
            metadata,
            config,
            merged_copy,
            no_run_log,
            no_merge_existing,
            snapshot_dir,
            strict,
            json,
            no_save_settings,
        }),
        Commands::Validate { config } => cmd_validate(config),
        Commands::Diagnose {
            input_dir,
            species,
            metadata,
            output,
            config,
            json,
            error_log,
            no_error_log,
        } => cmd_diagnose(
            Settings {
                input_dir,
                species_csv: species,
                output_gpkg: output,
                backup_dir: None,
            },
            metadata,
            config,
            json,
            if no_error_log { None } else { Some(error_log) },
        ),
        Commands::Settings(cmd) => cmd_settings(cmd),
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

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_CONFIG, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        let code = match &err {
            PipelineError::FatalInput(_) => EXIT_FATAL_INPUT,
            PipelineError::Config(_) => EXIT_INVALID_CONFIG,
            PipelineError::Output(_) => EXIT_OUTPUT_WRITE,
        };
        Self::new(code, err.to_string())
    }
}

/// Parse and validate a config file; defaults when no path is given.
fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("cannot read config {}: {e}", path.display())))?;
    ReconConfig::from_toml(&text).map_err(|e| CliError::config(format!("{}: {e}", path.display())))
}

// ============================================================================
// run
// ============================================================================

struct RunArgs {
    inputs: Vec<PathBuf>,
    /// Paths given on the command line, in settings shape.
    paths: Settings,
    metadata: Option<PathBuf>,
    config: Option<PathBuf>,
    merged_copy: Option<PathBuf>,
    no_run_log: bool,
    no_merge_existing: bool,
    snapshot_dir: Option<PathBuf>,
    strict: bool,
    json: bool,
    no_save_settings: bool,
}

const SAVED_HINT: &str = "pass it once; later runs reuse it from the settings file";

fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let saved = Settings::load();
    let paths = args.paths.clone().or(&saved);

    let mut config = load_config(args.config.as_deref())?;
    if args.no_merge_existing {
        config.output.merge_existing = false;
    }

    let species_csv = paths
        .species_csv
        .clone()
        .ok_or_else(|| CliError::usage("no species CSV given (--species)").with_hint(SAVED_HINT))?;
    let output = paths
        .output_gpkg
        .clone()
        .ok_or_else(|| CliError::usage("no output file given (--output)").with_hint(SAVED_HINT))?;

    // Listed files replace the saved folder; only an explicit --input-dir
    // adds to them.
    let input_dir = match (&args.paths.input_dir, args.inputs.is_empty()) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => saved.input_dir.clone(),
        (None, false) => None,
    };

    let mut inputs = args.inputs.clone();
    if let Some(dir) = &input_dir {
        let found = pipeline::discover_inputs(dir, &[output.as_path()])
            .map_err(|e| CliError::new(EXIT_FATAL_INPUT, e))?;
        let new: Vec<PathBuf> = found.into_iter().filter(|p| !inputs.contains(p)).collect();
        inputs.extend(new);
    }
    if inputs.is_empty() {
        return Err(CliError::usage("no input GeoPackages")
            .with_hint("list them, or pass --input-dir to pick up every *.gpkg in a folder"));
    }

    let metadata = match (&args.metadata, &input_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => pipeline::discover_metadata(dir)
            .map_err(|e| CliError::new(EXIT_FATAL_INPUT, e).with_hint("pass --metadata explicitly"))?,
        (None, None) => {
            return Err(CliError::usage("no metadata spreadsheet given (--metadata)")
                .with_hint("or pass --input-dir containing exactly one *.xlsx"))
        }
    };

    let merged_copy = args.merged_copy.clone().or_else(|| {
        paths.backup_dir.as_ref().map(|dir| {
            let stem = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "survey".into());
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("{stem}_merged_{stamp}.gpkg"))
        })
    });

    let plan = RunPlan {
        config,
        inputs,
        species_csv,
        metadata,
        output,
        merged_copy,
        write_run_log: !args.no_run_log,
    };

    let report = match pipeline::execute(&plan) {
        Ok(report) => report,
        Err(err) => {
            if let Some(dir) = &args.snapshot_dir {
                take_snapshot(dir, &plan, &err);
            }
            return Err(err.into());
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json}");
    } else {
        report.print_human();
    }

    if !args.no_save_settings && paths != saved {
        match paths.save() {
            Ok(()) => log::info!("saved paths to {}", Settings::config_path_display()),
            Err(e) => log::warn!("settings not saved: {e}"),
        }
    }

    let skipped = report.files.len() - report.loaded();
    if args.strict && skipped > 0 {
        return Err(CliError::new(
            EXIT_PARTIAL,
            format!("{skipped} input file(s) skipped: {}", report.note()),
        ));
    }
    Ok(())
}

/// Best effort: a failed snapshot is logged, the run error is what the user sees.
fn take_snapshot(dir: &Path, plan: &RunPlan, err: &PipelineError) {
    let targets = DiagnoseTargets {
        species_csv: Some(plan.species_csv.clone()),
        input_dir: None,
        metadata: Some(plan.metadata.clone()),
        output: Some(plan.output.clone()),
    };
    let diagnosis = diagnose::diagnose(&targets, &plan.config);
    let report = format!(
        "fieldmerge run failed at {}\nerror: {err}\n\ninputs:\n{}\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        plan.inputs
            .iter()
            .map(|p| format!("  {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n"),
        diagnosis.render_text()
    );
    let sources = SnapshotSources {
        species_csv: Some(plan.species_csv.clone()),
        metadata: Some(plan.metadata.clone()),
        inputs: plan.inputs.clone(),
        output: Some(plan.output.clone()),
    };
    match snapshot::write_snapshot(dir, &sources, &report) {
        Ok(folder) => {
            eprintln!("snapshot: {}", folder.display());
            if let Err(e) = append_error_log(&dir.join(ERROR_LOG_FILE), &format!("run failed: {err}")) {
                log::warn!("error log not updated: {e}");
            }
        }
        Err(e) => log::warn!("snapshot not written: {e}"),
    }
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(path: PathBuf) -> Result<(), CliError> {
    let config = load_config(Some(&path))?;
    println!(
        "ok: {} (dedup key: {}; target srs: EPSG:{})",
        path.display(),
        config.dedup.key.join(", "),
        config.output.target_srs
    );
    Ok(())
}

// ============================================================================
// diagnose
// ============================================================================

fn cmd_diagnose(
    flags: Settings,
    metadata: Option<PathBuf>,
    config: Option<PathBuf>,
    json: bool,
    // None: no error log. Some(None): default location.
    error_log: Option<Option<PathBuf>>,
) -> Result<(), CliError> {
    let paths = flags.or(&Settings::load());
    let config = load_config(config.as_deref())?;

    let targets = DiagnoseTargets {
        species_csv: paths.species_csv.clone(),
        input_dir: paths.input_dir.clone(),
        metadata,
        output: paths.output_gpkg.clone(),
    };
    if targets.species_csv.is_none() && targets.input_dir.is_none() && targets.output.is_none() {
        return Err(CliError::usage("nothing to check")
            .with_hint("pass --species, --input-dir or --output (or save them with a run)"));
    }

    let report = diagnose::diagnose(&targets, &config);
    let text = report.render_text();
    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{out}");
    } else {
        print!("{text}");
    }

    if let Some(explicit) = error_log {
        let log_path = explicit.unwrap_or_else(|| {
            let dir = paths
                .output_gpkg
                .as_deref()
                .and_then(Path::parent)
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .or_else(|| paths.input_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            dir.join(ERROR_LOG_FILE)
        });
        if let Err(e) = append_error_log(&log_path, &text) {
            log::warn!("cannot append to {}: {e}", log_path.display());
        }
    }

    if report.problems.is_empty() {
        Ok(())
    } else {
        Err(CliError::new(
            EXIT_ERROR,
            format!("{} problem(s) found", report.problems.len()),
        ))
    }
}

// ============================================================================
// settings
// ============================================================================

fn cmd_settings(cmd: SettingsCommands) -> Result<(), CliError> {
    match cmd {
        SettingsCommands::Show => {
            let settings = Settings::load();
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
            println!("{json}");
        }
        SettingsCommands::Path => println!("{}", Settings::config_path_display()),
        SettingsCommands::Clear => {
            let removed = Settings::clear().map_err(|e| CliError::new(EXIT_ERROR, e))?;
            if removed {
                eprintln!("removed {}", Settings::config_path_display());
            } else {
                eprintln!("no settings file at {}", Settings::config_path_display());
            }
        }
    }
    Ok(())
}
