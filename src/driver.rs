//! Analysis driver (C11, `spec.md` §4.10).
//!
//! Owns the full pipeline: lex (C1/C2) -> simplify (C4) -> symbols + AST
//! (C5) -> value-flow (C6) -> checks (C7), run once per translation unit,
//! followed by a cross-TU pass (C8) over every TU's CTU summary, then
//! suppression filtering (C9) and final ordering through the diagnostic bus
//! (C10). TUs run in parallel across a `rayon` pool sized by
//! `Settings::jobs` (`spec.md` §5 "Concurrency & Resource Model"); each TU
//! and its value-flow stage carry their own wall-clock deadline, enforced
//! by racing the stage against a timer on a separate thread since nothing
//! in this pipeline is cancellable mid-pass.
//!
//! Per-check isolation from a panicking check is handled inside C7 itself
//! (`checks::run_all` catches the unwind); this driver doesn't duplicate
//! that. A per-check wall-clock deadline would need each check to own its
//! view rather than borrow one, which none of C2/C5/C6 support today — the
//! per-TU deadline below is the coarser substitute `spec.md` §4.10 leaves
//! room for ("the offending stage yields current partial results").

use std::path::Path;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use rayon::prelude::*;

use crate::cache::{self, Cache, CacheFingerprintInput, CacheRecord};
use crate::checks::{self, AnalysisView, CheckRegistry, RunOutcome};
use crate::config::Settings;
use crate::ctu::{self, CtuSummary};
use crate::diagnostics::bus::DiagnosticBus;
use crate::diagnostics::{Certainty, Diagnostic, Severity};
use crate::ids::FileIndex;
use crate::library_config::LibraryConfig;
use crate::preprocessor::{self, TranslationUnit};
use crate::simplify::{self, SimplifyLimits};
use crate::suppressions::{InlineSuppressionComment, SuppressionSet};
use crate::symbols::{self, ast};
use crate::valueflow::{self, ValueFlowLimits};

/// `spec.md` §4.10 "Output: an exit code ... default: nonzero iff any
/// non-suppressed error-severity diagnostic was emitted". The three codes
/// below are what the demo binary maps onto `std::process::exit`.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
/// Reserved for configuration/IO failures the driver never reaches analysis
/// from (`spec.md` §6 "reserved internal codes for configuration errors"),
/// distinct from `EXIT_FINDINGS` so a caller can tell "we looked and found
/// nothing wrong" from "we couldn't look".
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// One run of the driver over however many translation units it was given.
#[derive(Debug)]
pub struct RunReport {
    pub diagnostics: Vec<Diagnostic>,
    pub exit_code: i32,
}

/// Orchestrates the full pipeline. Holds the long-lived pieces that don't
/// change between TUs in one run: the check catalogue and the optional
/// library description of well-known functions (`spec.md` §4.6, §4.7).
pub struct Driver {
    registry: CheckRegistry,
    settings: Settings,
    library: Option<LibraryConfig>,
}

impl Driver {
    pub fn new(settings: Settings, library: Option<LibraryConfig>) -> Self {
        Self { registry: CheckRegistry::with_builtin_checks(), settings, library }
    }

    /// Runs every TU, merges CTU findings, applies suppressions, and
    /// returns the deduplicated, deterministically ordered result plus the
    /// exit code it implies.
    ///
    /// `cache` is consulted per-TU when present: a hit skips the whole
    /// per-TU pipeline and reuses the stored diagnostics and CTU summary
    /// (`spec.md` §6 "optional persistent cache keyed by a fingerprint of
    /// inputs"); a miss runs the pipeline and writes the result back.
    pub fn run(&self, tus: &[TranslationUnit], suppressions: &SuppressionSet, cache: Option<&Cache>) -> RunReport {
        let per_tu: Vec<TuResult> = if self.settings.jobs <= 1 {
            tus.iter().map(|tu| self.analyze_tu_cached(tu, suppressions, cache)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.jobs)
                .build()
                .unwrap_or_else(|_| rayon::ThreadPoolBuilder::new().build().expect("default rayon pool"));
            pool.install(|| tus.par_iter().map(|tu| self.analyze_tu_cached(tu, suppressions, cache)).collect())
        };

        let mut accepted: Vec<Diagnostic> = Vec::new();
        let mut any_error = false;
        let mut ctu_summaries: Vec<CtuSummary> = Vec::with_capacity(per_tu.len());

        for result in per_tu {
            // Each TU's own recovered inline comments are attached to a
            // per-TU copy of the shared suppression set rather than mutating
            // `suppressions` itself, since a comment's `file_index` is only
            // meaningful against the TU it was lexed from.
            let tu_suppressions = suppressions.clone().with_inline(result.inline);
            let filtered = tu_suppressions.apply(result.diagnostics, &result.files);
            for f in filtered {
                if f.counts_toward_exit_code && f.diagnostic.severity == Severity::Error {
                    any_error = true;
                }
                accepted.push(f.diagnostic);
            }
            ctu_summaries.push(result.ctu_summary);
        }

        // Cross-TU pass (C8). A CTU diagnostic's `file_index` is local to
        // whichever TU contributed the callee, so file-restricted global
        // suppressions can't be resolved against it here; only
        // file-unrestricted suppressions apply. That only under-suppresses
        // (a diagnostic that should have been hidden stays visible), never
        // the reverse, so it errs toward showing real findings.
        let ctu_diagnostics = ctu::merge(&ctu_summaries, self.settings.ctu_max_depth);
        let ctu_filtered = suppressions.apply(ctu_diagnostics, &[]);
        for f in ctu_filtered {
            if f.counts_toward_exit_code && f.diagnostic.severity == Severity::Error {
                any_error = true;
            }
            accepted.push(f.diagnostic);
        }

        let (sender, bus) = DiagnosticBus::new(accepted.len().max(1));
        for diag in accepted {
            // The bus is only full if `capacity` diagnostics are already
            // queued with nobody draining; we size it to the exact count
            // we're about to push, so this can never block.
            let _ = sender.publish(diag);
        }
        drop(sender);
        let diagnostics = bus.drain_sorted();

        let exit_code = if any_error { EXIT_FINDINGS } else { EXIT_SUCCESS };
        RunReport { diagnostics, exit_code }
    }

    fn analyze_tu_cached(&self, tu: &TranslationUnit, suppressions: &SuppressionSet, cache: Option<&Cache>) -> TuResult {
        let files = tu.file_paths();
        if let Some(cache) = cache {
            if let Some(key) = self.cache_key(tu) {
                if let Some(record) = cache.load(&key) {
                    return TuResult {
                        diagnostics: record.diagnostics,
                        ctu_summary: record.ctu_summary,
                        inline: record.inline,
                        files,
                    };
                }
                let result = self.analyze_tu(tu, suppressions);
                let record = CacheRecord::new(result.diagnostics.clone(), result.ctu_summary.clone(), result.inline.clone());
                if let Err(e) = cache.store(&key, &record) {
                    tracing::warn!(error = %e, "failed to write cache entry, continuing without it");
                }
                return result;
            }
        }
        self.analyze_tu(tu, suppressions)
    }

    fn cache_key(&self, tu: &TranslationUnit) -> Option<String> {
        let primary = tu.files.first()?;
        let content_hash = cache::content_hash(&primary.content);
        let rule_ids: Vec<&str> = self.registry.checks().flat_map(|c| c.rule_ids().iter().copied()).collect();
        let digest = cache::config_digest(&rule_ids, self.settings.inconclusive, self.settings.ctu_max_depth);
        let input = CacheFingerprintInput {
            source_path: &primary.path,
            content_hash: &content_hash,
            config_digest: &digest,
            tool_version: env!("CARGO_PKG_VERSION"),
        };
        Some(cache::fingerprint(&input))
    }

    /// Runs the full per-TU pipeline under `Settings::tu_timeout`. On
    /// timeout the TU contributes a single `internalError` diagnostic
    /// instead of whatever partial work was in flight (`spec.md` §4.10).
    fn analyze_tu(&self, tu: &TranslationUnit, suppressions: &SuppressionSet) -> TuResult {
        let files = tu.file_paths();
        let deadline = self.settings.tu_timeout();
        let library = self.library.clone();
        let settings = self.settings.clone();
        let tu = tu.clone();
        // `CheckRegistry` and `SuppressionSet` are shared across the
        // deadline-watcher thread by reference through a scope, rather
        // than cloned, since both are read-only for the duration of one
        // TU's analysis.
        let registry = &self.registry;

        let outcome = std::thread::scope(|scope| {
            let (tx, rx) = std::sync::mpsc::channel();
            let handle = scope.spawn(move || {
                let result = run_tu_pipeline(&tu, registry, &settings, library.as_ref(), suppressions);
                let _ = tx.send(result);
            });
            match rx.recv_timeout(deadline) {
                Ok(result) => {
                    let _ = handle.join();
                    Some(result)
                }
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => None,
            }
        });

        match outcome {
            Some(inner) => TuResult {
                diagnostics: inner.diagnostics,
                ctu_summary: inner.ctu_summary,
                inline: inner.inline,
                files,
            },
            None => {
                let primary = files.first().cloned().unwrap_or_default();
                let diag = Diagnostic::new(
                    "internalError",
                    Severity::Internal,
                    Certainty::Definite,
                    FileIndex::PRIMARY,
                    0,
                    0,
                    format!("analysis of '{primary}' exceeded its {}ms deadline and was abandoned", deadline.as_millis()),
                );
                TuResult { diagnostics: vec![diag], ctu_summary: CtuSummary::default(), inline: Vec::new(), files }
            }
        }
    }
}

struct TuResult {
    diagnostics: Vec<Diagnostic>,
    ctu_summary: CtuSummary,
    inline: Vec<InlineSuppressionComment>,
    files: Vec<String>,
}

/// Everything the pipeline produces for one TU, before suppression
/// filtering (which needs every TU's output merged first for CTU).
struct TuOutcome {
    diagnostics: Vec<Diagnostic>,
    ctu_summary: CtuSummary,
    inline: Vec<InlineSuppressionComment>,
}

/// The C1 through C7 stages, run start to finish for one TU. Split out of
/// [`Driver::analyze_tu`] so it can be handed to the deadline-watcher
/// thread as a plain closure body.
fn run_tu_pipeline(
    tu: &TranslationUnit,
    registry: &CheckRegistry,
    settings: &Settings,
    library: Option<&LibraryConfig>,
    suppressions: &SuppressionSet,
) -> TuOutcome {
    let (mut tokens, inline, lex_errors) = preprocessor::lex(tu);
    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .into_iter()
        .map(|e| {
            Diagnostic::new("syntaxError", Severity::Error, Certainty::Definite, FileIndex::PRIMARY, 0, 0, e.to_string())
        })
        .collect();

    let simplify_report = simplify::simplify(&mut tokens, SimplifyLimits::default());
    diagnostics.extend(simplify_report.diagnostics);
    diagnostics.extend(simplify_report.errors.into_iter().map(|e| {
        Diagnostic::new("syntaxError", Severity::Error, Certainty::Definite, FileIndex::PRIMARY, 0, 0, e.to_string())
    }));

    let db = symbols::build(&tokens);
    symbols::stamp_references(&mut tokens, &db);
    ast::build(&mut tokens);

    let valueflow_report = run_valueflow_with_timeout(&mut tokens, &db, library, settings.valueflow_timeout());
    match valueflow_report {
        Some(report) => diagnostics.extend(report.diagnostics),
        None => diagnostics.push(Diagnostic::new(
            "internalError",
            Severity::Internal,
            Certainty::Definite,
            FileIndex::PRIMARY,
            0,
            0,
            format!("value-flow analysis exceeded its {}ms deadline and was abandoned", settings.valueflow_timeout().as_millis()),
        )),
    }

    let view = AnalysisView { tokens: &tokens, symbols: &db, library };
    let RunOutcome { diagnostics: check_diags, ctu_summary } = checks::run_all(registry, &view, settings, suppressions);
    diagnostics.extend(check_diags);

    TuOutcome { diagnostics, ctu_summary, inline }
}

/// Wraps `valueflow::analyze` in its own deadline, separate from the TU's
/// overall budget, since it's the one fixpoint pass in the pipeline whose
/// iteration count depends on the input rather than a fixed pass list
/// (`spec.md` §4.10 "per-stage timeouts").
fn run_valueflow_with_timeout(
    tokens: &mut crate::token::TokenList,
    db: &symbols::SymbolDatabase,
    library: Option<&LibraryConfig>,
    deadline: Duration,
) -> Option<valueflow::ValueFlowReport> {
    // `valueflow::analyze` takes `&mut TokenList`/`&SymbolDatabase`, both
    // borrowed for the scope's lifetime only, so a scoped thread (rather
    // than an owned-data `thread::spawn`) can run it directly without a
    // clone. If it overruns, `thread::scope` still joins the thread before
    // returning, so the timeout only changes what the *caller* sees, not
    // how long the underlying pass keeps running — acceptable here since
    // `ValueFlowLimits`'s iteration cap already bounds it to a handful of
    // passes in practice.
    let limits = ValueFlowLimits::default();
    std::thread::scope(|scope| {
        let (tx, rx) = std::sync::mpsc::channel();
        scope.spawn(|| {
            let report = valueflow::analyze(tokens, db, library, limits);
            let _ = tx.send(report);
        });
        rx.recv_timeout(deadline).ok()
    })
}

/// Convenience entry point for the demo binary: loads settings and
/// suppressions from `root`, builds a driver with the built-in check
/// catalogue, and runs it over `tus`.
pub fn analyze_project(root: &Path, tus: &[TranslationUnit], use_cache: bool) -> RunReport {
    let settings = Settings::load(root);
    let suppressions = SuppressionSet::load(root);
    let library = Some(LibraryConfig::with_libc_defaults());
    let driver = Driver::new(settings.clone(), library);
    let cache = if use_cache { Some(Cache::new(Cache::resolve_dir(settings.cache_dir.as_deref()))) } else { None };
    driver.run(tus, &suppressions, cache.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tu(src: &str) -> TranslationUnit {
        TranslationUnit::single(PathBuf::from("t.c"), src.to_string())
    }

    #[test]
    fn clean_input_produces_no_diagnostics_and_success_exit() {
        let driver = Driver::new(Settings::default(), None);
        let tus = vec![tu("int add(int a, int b) { return a + b; }")];
        let report = driver.run(&tus, &SuppressionSet::default(), None);
        assert_eq!(report.exit_code, EXIT_SUCCESS);
        assert!(report.diagnostics.is_empty(), "unexpected diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn bracket_mismatch_surfaces_as_error_and_nonzero_exit() {
        let driver = Driver::new(Settings::default(), None);
        let tus = vec![tu("int f( { return 0; }")];
        let report = driver.run(&tus, &SuppressionSet::default(), None);
        assert_eq!(report.exit_code, EXIT_FINDINGS);
        assert!(report.diagnostics.iter().any(|d| d.id == "syntaxError"));
    }

    #[test]
    fn multiple_tus_run_and_merge_independently() {
        let driver = Driver::new(Settings::default(), None);
        let tus = vec![tu("int a() { return 1; }"), tu("int b() { return 2; }")];
        let report = driver.run(&tus, &SuppressionSet::default(), None);
        assert_eq!(report.exit_code, EXIT_SUCCESS);
    }

    #[test]
    fn global_suppression_of_syntax_error_clears_exit_code() {
        let driver = Driver::new(Settings::default(), None);
        let tus = vec![tu("int f( { return 0; }")];
        let suppressions = SuppressionSet::new(
            vec![crate::suppressions::GlobalSuppression::parse_line("syntaxError").expect("parses")],
            vec![],
            vec![],
        );
        let report = driver.run(&tus, &suppressions, None);
        assert_eq!(report.exit_code, EXIT_SUCCESS);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn inline_suppression_recovered_from_source_is_honored_through_the_driver() {
        // The comment is lexed out of the TU itself, not passed in via the
        // caller's `SuppressionSet` — this is what `run_tu_pipeline`
        // discarding the lexer's inline comments used to break.
        let driver = Driver::new(Settings::default(), None);
        let src = "int k(int a, int b) {\n  if (b == 0) {}\n  // cppcheck-suppress zerodiv\n  return a / b;\n}\n";
        let report = driver.run(&[tu(src)], &SuppressionSet::default(), None);
        assert!(!report.diagnostics.iter().any(|d| d.id == "zerodiv"), "zerodiv should be suppressed: {:?}", report.diagnostics);
        assert!(!report.diagnostics.iter().any(|d| d.id == "unmatchedSuppression"));
    }

    #[test]
    fn inline_suppression_survives_a_cache_hit() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let cache = Cache::new(temp.path().to_path_buf());
        let driver = Driver::new(Settings::default(), None);
        let src = "int k(int a, int b) {\n  if (b == 0) {}\n  // cppcheck-suppress zerodiv\n  return a / b;\n}\n";
        let tus = vec![tu(src)];

        let first = driver.run(&tus, &SuppressionSet::default(), Some(&cache));
        let second = driver.run(&tus, &SuppressionSet::default(), Some(&cache));
        assert!(!first.diagnostics.iter().any(|d| d.id == "zerodiv"));
        assert!(!second.diagnostics.iter().any(|d| d.id == "zerodiv"), "cached TU lost its inline suppression");
    }

    #[test]
    fn cache_hit_skips_recomputation_but_returns_same_diagnostics() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let cache = Cache::new(temp.path().to_path_buf());
        let driver = Driver::new(Settings::default(), None);
        let tus = vec![tu("int f( { return 0; }")];

        let first = driver.run(&tus, &SuppressionSet::default(), Some(&cache));
        let second = driver.run(&tus, &SuppressionSet::default(), Some(&cache));
        assert_eq!(first.exit_code, second.exit_code);
        assert_eq!(first.diagnostics.len(), second.diagnostics.len());
    }
}
