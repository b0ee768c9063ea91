//! Suppression engine (C9, `spec.md` §4.8).
//!
//! Three mechanisms converge on one decision per diagnostic: an inline
//! `cppcheck-suppress <id>` comment on the diagnostic's own line or the
//! line before it, a configured `(id, file?, line?)` global triple, and an
//! exit-code-only variant of the same triple that keeps the diagnostic
//! visible but excludes it from the process exit code. A final sweep over
//! inline comments that matched nothing produces `unmatchedSuppression`
//! meta-diagnostics. Per `spec.md` §4.8 "Order independence", [`apply`]
//! doesn't care what order suppressions were registered or diagnostics
//! were produced in — every decision is a lookup against the full set.
//!
//! [`apply`]: SuppressionSet::apply

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Certainty, Diagnostic, Severity};
use crate::ids::FileIndex;

/// One `cppcheck-suppress <id>` comment recovered by the lexer before it
/// discards comments (`spec.md` §4.3 "Remove C-style comments... done by
/// the lexer"). `line` is the comment's own source line.
///
/// Serializable so a cache hit can still recover the TU's own inline
/// comments without re-lexing its source (`cache::CacheRecord::inline`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineSuppressionComment {
    pub file_index: FileIndex,
    pub line: u32,
    pub rule_id: String,
    pub symbol_name: Option<String>,
}

impl InlineSuppressionComment {
    /// Parses one comment body (text after the comment delimiters) into a
    /// suppression annotation, or `None` if it isn't one. `spec.md` §6:
    /// "a single-line comment whose content begins with cppcheck-suppress
    /// followed by one rule-id optionally followed by symbolName=<name> or
    /// id=<sub-id> tokens".
    pub fn parse(file_index: FileIndex, line: u32, comment_text: &str) -> Option<Self> {
        let mut words = comment_text.trim().split_whitespace();
        if words.next()? != "cppcheck-suppress" {
            return None;
        }
        let rule_id = words.next()?.to_string();
        let symbol_name = words.filter_map(|w| w.strip_prefix("symbolName=")).next().map(str::to_string);
        // `id=<sub-id>` further narrows which of a multi-id check's
        // findings is suppressed; accepted but not yet distinguished since
        // no built-in check currently emits more than one rule-id.
        Some(Self { file_index, line, rule_id, symbol_name })
    }

    /// `spec.md` §9: "preceding line applies to next non-blank line" is
    /// authoritative. Tokens carry no record of blank lines, so this
    /// approximates "next non-blank line" as "the very next line" — the
    /// common case, and the one `spec.md` §8 scenario 5 exercises.
    fn covers(&self, file_index: FileIndex, line: u32) -> bool {
        self.file_index == file_index && (line == self.line || line == self.line + 1)
    }
}

/// A configured `(id, file?, line?)` triple (`spec.md` §4.8 rule 2);
/// absent fields match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSuppression {
    pub rule_id: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl GlobalSuppression {
    /// Parses one `<id>[:<file>[:<line>]]` line (`spec.md` §6 "File:"
    /// format); blank lines and `#`-prefixed comments yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let mut parts = line.splitn(3, ':');
        let rule_id = parts.next()?.trim().to_string();
        if rule_id.is_empty() {
            return None;
        }
        let file = parts.next().map(str::to_string);
        let at_line = parts.next().and_then(|s| s.trim().parse::<u32>().ok());
        Some(Self { rule_id, file, line: at_line })
    }

    fn matches(&self, rule_id: &str, file: Option<&str>, line: u32) -> bool {
        if self.rule_id != rule_id {
            return false;
        }
        if let Some(want) = &self.file {
            if file != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(want) = self.line {
            if want != line {
                return false;
            }
        }
        true
    }

    fn parse_file(content: &str) -> Vec<Self> {
        content.lines().filter_map(Self::parse_line).collect()
    }
}

/// A diagnostic paired with whether it still counts toward the process's
/// nonzero-exit decision (`spec.md` §4.8 rule 3: exit-code suppression
/// hides a diagnostic from that decision without hiding it from the
/// stream).
#[derive(Debug, Clone)]
pub struct FilteredDiagnostic {
    pub diagnostic: Diagnostic,
    pub counts_toward_exit_code: bool,
}

/// The full set of suppressions active for a run.
#[derive(Debug, Clone, Default)]
pub struct SuppressionSet {
    global: Vec<GlobalSuppression>,
    exit_code_only: Vec<GlobalSuppression>,
    inline: Vec<InlineSuppressionComment>,
}

impl SuppressionSet {
    pub fn new(global: Vec<GlobalSuppression>, exit_code_only: Vec<GlobalSuppression>, inline: Vec<InlineSuppressionComment>) -> Self {
        Self { global, exit_code_only, inline }
    }

    /// Loads global and exit-code-only suppression lists from
    /// `<root>/tucheck-suppressions.txt` and
    /// `<root>/tucheck-suppressions-exitcode.txt`. Either file missing is
    /// not an error — an empty list is used — following the same
    /// load-or-default shape as [`crate::config::Settings::load`]. Inline
    /// comments are gathered per-TU by the lexer and attached later via
    /// [`with_inline`](Self::with_inline).
    pub fn load(root: &Path) -> Self {
        Self {
            global: Self::load_list(&root.join("tucheck-suppressions.txt")),
            exit_code_only: Self::load_list(&root.join("tucheck-suppressions-exitcode.txt")),
            inline: Vec::new(),
        }
    }

    fn load_list(path: &Path) -> Vec<GlobalSuppression> {
        if !path.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => GlobalSuppression::parse_file(&content),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read suppressions, treating as empty");
                Vec::new()
            }
        }
    }

    /// Returns a copy of `self` with this TU's inline suppression comments
    /// attached, for use by [`apply`](Self::apply).
    pub fn with_inline(mut self, inline: Vec<InlineSuppressionComment>) -> Self {
        self.inline = inline;
        self
    }

    /// `spec.md` §4.6 "Enablement resolution" step (b): a check whose every
    /// rule-id is unconditionally (no file/line restriction) globally
    /// suppressed doesn't run at all, rather than running and being
    /// filtered. Exit-code-only suppression doesn't count here — those
    /// diagnostics must still be produced and shown.
    pub fn is_rule_globally_suppressed(&self, rule_id: &str) -> bool {
        self.global.iter().any(|g| g.rule_id == rule_id && g.file.is_none() && g.line.is_none())
    }

    /// Applies every suppression mechanism to one TU's diagnostic stream,
    /// resolving `file` fields against `files` (indexed by
    /// [`FileIndex`]). Appends `unmatchedSuppression` meta-diagnostics for
    /// inline comments that matched nothing (`spec.md` §4.8 rule 4).
    pub fn apply(&self, diagnostics: Vec<Diagnostic>, files: &[String]) -> Vec<FilteredDiagnostic> {
        let mut inline_matched = vec![false; self.inline.len()];
        let mut out = Vec::with_capacity(diagnostics.len());

        for diag in diagnostics {
            let file = files.get(diag.file_index.index()).map(String::as_str);

            if let Some((idx, _)) = self
                .inline
                .iter()
                .enumerate()
                .find(|(_, c)| c.rule_id == diag.id && c.covers(diag.file_index, diag.line))
            {
                inline_matched[idx] = true;
                continue;
            }

            if self.global.iter().any(|g| g.matches(&diag.id, file, diag.line)) {
                continue;
            }

            let counts_toward_exit_code = !self.exit_code_only.iter().any(|g| g.matches(&diag.id, file, diag.line));
            out.push(FilteredDiagnostic { diagnostic: diag, counts_toward_exit_code });
        }

        for (comment, matched) in self.inline.iter().zip(inline_matched) {
            if matched {
                continue;
            }
            out.push(FilteredDiagnostic {
                diagnostic: Diagnostic::new(
                    "unmatchedSuppression",
                    Severity::Information,
                    Certainty::Definite,
                    comment.file_index,
                    comment.line,
                    0,
                    format!("suppression for '{}' does not match any diagnostic", comment.rule_id),
                ),
                counts_toward_exit_code: false,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn diag(id: &str, line: u32) -> Diagnostic {
        Diagnostic::new(id, Severity::Error, Certainty::Definite, FileIndex::PRIMARY, line, 1, "finding")
    }

    #[test]
    fn parses_inline_comment_with_symbol_name() {
        let c = InlineSuppressionComment::parse(FileIndex::PRIMARY, 4, "cppcheck-suppress nullPointer symbolName=p").unwrap();
        assert_eq!(c.rule_id, "nullPointer");
        assert_eq!(c.symbol_name.as_deref(), Some("p"));
    }

    #[test]
    fn rejects_unrelated_comment() {
        assert!(InlineSuppressionComment::parse(FileIndex::PRIMARY, 1, "just a note").is_none());
    }

    #[test]
    fn inline_suppression_on_next_line_hides_diagnostic_scenario_5() {
        // `spec.md` §8 scenario 5: a suppress comment on line 3 applies to
        // the dereference on line 4, producing zero diagnostics and no
        // `unmatchedSuppression`.
        let inline = vec![InlineSuppressionComment::parse(FileIndex::PRIMARY, 3, "cppcheck-suppress nullPointer").unwrap()];
        let suppressions = SuppressionSet::default().with_inline(inline);

        let out = suppressions.apply(vec![diag("nullPointer", 4)], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn unmatched_inline_suppression_becomes_meta_diagnostic() {
        let inline = vec![InlineSuppressionComment::parse(FileIndex::PRIMARY, 3, "cppcheck-suppress nullPointer").unwrap()];
        let suppressions = SuppressionSet::default().with_inline(inline);

        let out = suppressions.apply(vec![diag("zerodiv", 4)], &[]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|f| f.diagnostic.id == "zerodiv"));
        let meta = out.iter().find(|f| f.diagnostic.id == "unmatchedSuppression").unwrap();
        assert!(!meta.counts_toward_exit_code);
    }

    #[test]
    fn global_suppression_with_absent_fields_matches_any_file_or_line() {
        let global = vec![GlobalSuppression::parse_line("zerodiv").unwrap()];
        let suppressions = SuppressionSet::new(global, Vec::new(), Vec::new());

        let out = suppressions.apply(vec![diag("zerodiv", 99)], &[]);
        assert!(out.is_empty());
    }

    #[test]
    fn global_suppression_respects_file_restriction() {
        let global = vec![GlobalSuppression::parse_line("zerodiv:other.c").unwrap()];
        let suppressions = SuppressionSet::new(global, Vec::new(), Vec::new());
        let files = vec!["main.c".to_string()];

        let out = suppressions.apply(vec![diag("zerodiv", 1)], &files);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn exit_code_only_suppression_keeps_diagnostic_visible() {
        let exit_only = vec![GlobalSuppression::parse_line("style").unwrap()];
        let suppressions = SuppressionSet::new(Vec::new(), exit_only, Vec::new());

        let out = suppressions.apply(vec![diag("style", 1)], &[]);
        assert_eq!(out.len(), 1);
        assert!(!out[0].counts_toward_exit_code);
    }

    #[test]
    fn is_rule_globally_suppressed_ignores_file_restricted_entries() {
        let global = vec![GlobalSuppression::parse_line("zerodiv:main.c").unwrap()];
        let suppressions = SuppressionSet::new(global, Vec::new(), Vec::new());
        assert!(!suppressions.is_rule_globally_suppressed("zerodiv"));

        let global = vec![GlobalSuppression::parse_line("zerodiv").unwrap()];
        let suppressions = SuppressionSet::new(global, Vec::new(), Vec::new());
        assert!(suppressions.is_rule_globally_suppressed("zerodiv"));
    }

    #[test]
    fn parse_file_ignores_blank_and_comment_lines() {
        let parsed = GlobalSuppression::parse_file("# header\n\nzerodiv:main.c:10\n\nnullPointer\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].rule_id, "zerodiv");
        assert_eq!(parsed[0].line, Some(10));
        assert_eq!(parsed[1].file, None);
    }

    #[test]
    fn load_missing_files_returns_empty_set() {
        let temp = TempDir::new().expect("temp dir");
        let suppressions = SuppressionSet::load(temp.path());
        assert!(!suppressions.is_rule_globally_suppressed("anything"));
    }

    #[test]
    fn load_reads_both_suppression_files() {
        let temp = TempDir::new().expect("temp dir");
        std::fs::write(temp.path().join("tucheck-suppressions.txt"), "zerodiv\n").unwrap();
        std::fs::write(temp.path().join("tucheck-suppressions-exitcode.txt"), "style\n").unwrap();

        let suppressions = SuppressionSet::load(temp.path());
        assert!(suppressions.is_rule_globally_suppressed("zerodiv"));

        let out = suppressions.apply(vec![diag("style", 1)], &[]);
        assert_eq!(out.len(), 1);
        assert!(!out[0].counts_toward_exit_code);
    }
}
