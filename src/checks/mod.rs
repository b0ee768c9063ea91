//! Check registry & runner (C7, `spec.md` §4.6).
//!
//! A [`Check`] is a plain value — no inheritance, no hidden vtable beyond
//! the one `dyn Check` already costs — stored in a [`CheckRegistry`] and
//! dispatched by the [`run_all`] runner. Checks are independent by
//! contract (`spec.md` §4.6 "Execution order"): the runner doesn't order
//! them against each other, only the diagnostic bus downstream imposes a
//! deterministic final order.

mod builtin;

use crate::config::Settings;
use crate::ctu::CtuSummary;
use crate::diagnostics::{Certainty, Diagnostic, Severity};
use crate::ids::FileIndex;
use crate::library_config::LibraryConfig;
use crate::suppressions::SuppressionSet;
use crate::symbols::SymbolDatabase;
use crate::token::TokenList;

pub use builtin::builtin_checks;

/// Granularity a check operates at (`spec.md` §4.6 "one of {per-token,
/// per-scope, per-function, per-TU, per-CTU} granularity"). The runner
/// doesn't currently change dispatch strategy by granularity — every check
/// still sees the whole TU's [`AnalysisView`] — but the tag documents each
/// check's intended scope and gates whether `summarize` is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    PerToken,
    PerScope,
    PerFunction,
    PerTu,
    PerCtu,
}

/// Read-only view a check queries (`spec.md` §4.6 "a pure function
/// `run(view)`, where `view` exposes read-only C2/C5/C6").
pub struct AnalysisView<'a> {
    pub tokens: &'a TokenList,
    pub symbols: &'a SymbolDatabase,
    pub library: Option<&'a LibraryConfig>,
}

/// One rule check. Implementations are stateless and safe to share across
/// TUs and worker threads (`Send + Sync`), matching the "checks are
/// independent" execution model.
pub trait Check: Send + Sync {
    /// Stable identifier used for enablement/suppression resolution and as
    /// the default value of `Diagnostic::id` for findings this check emits
    /// that don't carry a more specific sub-id.
    fn id(&self) -> &'static str;

    /// Every rule-id this check can emit, for suppression/enablement
    /// matching against individual findings (`spec.md` §4.6 "rule-ids").
    fn rule_ids(&self) -> &'static [&'static str];

    fn granularity(&self) -> Granularity;

    fn severity(&self) -> Severity;

    /// True if this check only produces inconclusive findings and should
    /// be skipped entirely when inconclusive mode is off, rather than run
    /// and have its output filtered after the fact.
    fn requires_inconclusive(&self) -> bool {
        false
    }

    fn run(&self, view: &AnalysisView) -> Vec<Diagnostic>;

    /// Only meaningful for [`Granularity::PerCtu`] checks: the per-TU
    /// summary C8 will later merge across translation units.
    fn summarize(&self, _view: &AnalysisView) -> Option<CtuSummary> {
        None
    }
}

/// The catalogue of checks available to a run.
pub struct CheckRegistry {
    checks: Vec<Box<dyn Check>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn register(&mut self, check: Box<dyn Check>) -> &mut Self {
        self.checks.push(check);
        self
    }

    pub fn with_builtin_checks() -> Self {
        let mut registry = Self::new();
        for check in builtin_checks() {
            registry.register(check);
        }
        registry
    }

    pub fn checks(&self) -> impl Iterator<Item = &dyn Check> {
        self.checks.iter().map(|c| c.as_ref())
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of running every enabled check over one TU's [`AnalysisView`].
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub ctu_summary: CtuSummary,
}

/// `spec.md` §4.6 "Enablement resolution": a check runs iff (a) its
/// severity is enabled, (b) at least one of its rule-ids is not globally
/// suppressed, and (c) inconclusive mode matches its requirement.
fn is_enabled(check: &dyn Check, settings: &Settings, suppressions: &SuppressionSet) -> bool {
    if !settings.severity_enabled(check.severity()) {
        return false;
    }
    if check.requires_inconclusive() && !settings.inconclusive {
        return false;
    }
    let any_not_suppressed = check
        .rule_ids()
        .iter()
        .any(|id| !suppressions.is_rule_globally_suppressed(id));
    any_not_suppressed
}

/// Run every enabled check over `view`, catching a panicking check per
/// `spec.md` §4.6 "Failure": it becomes an `internalError` diagnostic
/// naming the check and the run continues with the rest.
pub fn run_all(registry: &CheckRegistry, view: &AnalysisView, settings: &Settings, suppressions: &SuppressionSet) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    for check in registry.checks() {
        if !is_enabled(check, settings, suppressions) {
            continue;
        }

        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| check.run(view))) {
            Ok(diags) => outcome.diagnostics.extend(diags),
            Err(_) => {
                outcome.diagnostics.push(Diagnostic::new(
                    "internalError",
                    Severity::Internal,
                    Certainty::Definite,
                    FileIndex::PRIMARY,
                    0,
                    0,
                    format!("check '{}' failed and was skipped", check.id()),
                ));
            }
        }

        if check.granularity() == Granularity::PerCtu {
            if let Some(summary) = check.summarize(view) {
                outcome.ctu_summary.merge_from(summary);
            }
        }
    }

    outcome
}
