//! `tucheck` front-end binary.
//!
//! Owns no preprocessing logic: `spec.md` §1 places the preprocessor out of
//! scope and specifies only its output interface. This binary stands in for
//! that interface by recursively reading every `tu.json` file under its
//! input directory, each deserializing to
//! [`tucheck::preprocessor::TranslationUnit`] — the boundary between core
//! and front-end stays exactly where the spec draws it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use tucheck::cache::Cache;
use tucheck::config::Settings;
use tucheck::diagnostics::{Diagnostic, Severity};
use tucheck::driver::{Driver, EXIT_CONFIG_ERROR, EXIT_FINDINGS, EXIT_SUCCESS};
use tucheck::library_config::LibraryConfig;
use tucheck::preprocessor::TranslationUnit;
use tucheck::suppressions::SuppressionSet;

#[derive(Parser, Debug)]
#[command(name = "tucheck")]
#[command(about = "Static analysis engine for C/C++ translation units")]
#[command(version)]
struct Args {
    /// Directory walked recursively for `tu.json` files, one per
    /// translation unit (the preprocessor's output interface, `spec.md`
    /// §1).
    input: PathBuf,

    /// Override the number of parallel TU workers (default: `Settings::jobs`,
    /// which is `std::thread::available_parallelism`).
    #[arg(long)]
    jobs: Option<usize>,

    /// Severities to report, comma-separated (error, warning, style,
    /// performance, portability, information, debug). Overrides whatever
    /// `tucheck.toml` under `input` would otherwise select.
    #[arg(long = "enable", value_delimiter = ',')]
    enable: Vec<String>,

    /// Also run checks whose only findings are inconclusive.
    #[arg(long)]
    inconclusive: bool,

    /// Persistent cache directory override (default: platform cache dir).
    #[arg(long)]
    cache_dir: Option<String>,

    /// Disable the persistent cache for this run.
    #[arg(long)]
    no_cache: bool,

    /// Log level (trace, debug, info, warn, error); overridden by `RUST_LOG`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_severity(s: &str) -> Result<Severity> {
    match s.trim() {
        "error" => Ok(Severity::Error),
        "warning" => Ok(Severity::Warning),
        "style" => Ok(Severity::Style),
        "performance" => Ok(Severity::Performance),
        "portability" => Ok(Severity::Portability),
        "information" => Ok(Severity::Information),
        "debug" => Ok(Severity::Debug),
        other => anyhow::bail!("unknown severity '{other}' (expected one of: error, warning, style, performance, portability, information, debug)"),
    }
}

/// Walks every `tu.json` under `input`, at any depth, and deserializes each
/// into a [`TranslationUnit`]. Recursing (rather than only scanning
/// immediate subdirectories) lets a project group its TUs into nested
/// directories without the binary caring about the layout.
fn load_translation_units(input: &Path) -> Result<Vec<TranslationUnit>> {
    anyhow::ensure!(input.is_dir(), "input directory '{}' does not exist", input.display());

    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == "tu.json")
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let mut tus = Vec::with_capacity(paths.len());
    for tu_path in paths {
        let content = std::fs::read_to_string(&tu_path).with_context(|| format!("reading '{}'", tu_path.display()))?;
        let tu: TranslationUnit = serde_json::from_str(&content).with_context(|| format!("parsing '{}' as a translation unit", tu_path.display()))?;
        tus.push(tu);
    }
    Ok(tus)
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Style => "style",
        Severity::Performance => "performance",
        Severity::Portability => "portability",
        Severity::Information => "information",
        Severity::Debug => "debug",
        Severity::Internal => "internal",
    }
}

fn print_diagnostic(d: &Diagnostic) {
    println!(
        "file#{}:{}:{}: {} [{}]: {}",
        d.file_index.0,
        d.line,
        d.column,
        severity_label(d.severity),
        d.id,
        d.short_message
    );
    for frame in &d.call_stack {
        let symbol = frame.symbol.as_deref().unwrap_or("?");
        println!("  from file#{}:{}:{}: {symbol}", frame.file_index.0, frame.line, frame.column);
    }
}

fn run(args: &Args) -> Result<i32> {
    let mut settings = Settings::load(&args.input);
    if let Some(jobs) = args.jobs {
        settings.jobs = jobs;
    }
    if !args.enable.is_empty() {
        settings.enable = args.enable.iter().map(|s| parse_severity(s)).collect::<Result<Vec<_>>>()?;
    }
    if args.inconclusive {
        settings.inconclusive = true;
    }
    if let Some(dir) = &args.cache_dir {
        settings.cache_dir = Some(dir.clone());
    }

    let tus = load_translation_units(&args.input)?;
    if tus.is_empty() {
        tracing::warn!(input = %args.input.display(), "no translation units found (expected a tu.json somewhere under this directory)");
    }

    let suppressions = SuppressionSet::load(&args.input);
    let library = Some(LibraryConfig::with_libc_defaults());
    let driver = Driver::new(settings.clone(), library);
    let cache = if args.no_cache {
        None
    } else {
        Some(Cache::new(Cache::resolve_dir(settings.cache_dir.as_deref())))
    };

    let report = driver.run(&tus, &suppressions, cache.as_ref());
    for diag in &report.diagnostics {
        print_diagnostic(diag);
    }
    tracing::info!(diagnostics = report.diagnostics.len(), exit_code = report.exit_code, "analysis complete");
    Ok(report.exit_code)
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logging goes to stderr; stdout is reserved for the diagnostic stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    match run(&args) {
        Ok(code) if code == EXIT_SUCCESS || code == EXIT_FINDINGS => {
            ExitCode::from(code as u8)
        }
        Ok(code) => {
            eprintln!("tucheck: unexpected exit code {code} from driver");
            ExitCode::from(EXIT_CONFIG_ERROR as u8)
        }
        Err(e) => {
            eprintln!("tucheck: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR as u8)
        }
    }
}
