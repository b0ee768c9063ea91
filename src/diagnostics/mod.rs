//! Diagnostics (C10): the shared finding type produced by every check and
//! consumed by the suppression engine and the diagnostic bus.

pub mod bus;

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::ids::FileIndex;

/// Severity band, independent of how confident the check is in the finding
/// (`spec.md` §3 — severity and certainty are orthogonal axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Style,
    Performance,
    Portability,
    Information,
    Debug,
    /// Reserved for diagnostics the core itself raises about its own
    /// failure (a panicking check, an internal invariant violation) rather
    /// than about the analyzed source (`spec.md` §3 severity enum).
    Internal,
}

/// Whether the check is certain the reported condition occurs on every path,
/// or only that it occurs on some reachable path under weaker assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Certainty {
    Definite,
    Inconclusive,
}

/// One frame of a call stack attached to a cross-function or cross-TU
/// diagnostic (`spec.md` §8 CTU scenario).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file_index: FileIndex,
    pub line: u32,
    pub column: u32,
    pub symbol: Option<String>,
}

/// A single finding. `hash` de-duplicates (id, location, message) triples
/// that multiple checks or multiple TUs may independently rediscover; the
/// diagnostic bus uses it, not `Diagnostic`'s own derived equality, so two
/// diagnostics with different call stacks but the same head position still
/// collapse to one (`spec.md` §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub severity: Severity,
    pub certainty: Certainty,
    pub cwe: Option<u32>,
    pub short_message: String,
    pub verbose_message: String,
    pub file_index: FileIndex,
    pub line: u32,
    pub column: u32,
    pub call_stack: Vec<StackFrame>,
    pub symbol_names: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        certainty: Certainty,
        file_index: FileIndex,
        line: u32,
        column: u32,
        short_message: impl Into<String>,
    ) -> Self {
        let short_message = short_message.into();
        Self {
            id: id.into(),
            severity,
            certainty,
            cwe: None,
            verbose_message: short_message.clone(),
            short_message,
            file_index,
            line,
            column,
            call_stack: Vec::new(),
            symbol_names: Vec::new(),
        }
    }

    pub fn with_cwe(mut self, cwe: u32) -> Self {
        self.cwe = Some(cwe);
        self
    }

    pub fn with_verbose(mut self, verbose: impl Into<String>) -> Self {
        self.verbose_message = verbose.into();
        self
    }

    pub fn with_call_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.call_stack = stack;
        self
    }

    /// Stable de-dup key: `(id, file-index, line, column)`. Two diagnostics
    /// from different checks (or different TUs re-deriving the same CTU
    /// finding) with the same key are the same finding per §4.6.
    pub fn dedup_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.id.hash(&mut hasher);
        self.file_index.hash(&mut hasher);
        self.line.hash(&mut hasher);
        self.column.hash(&mut hasher);
        hasher.finish()
    }

    /// Deterministic ordering key, independent of which worker produced the
    /// diagnostic or in what order checks ran (`spec.md` §4.7).
    pub fn order_key(&self) -> (u32, u32, u32, &str) {
        (self.file_index.0, self.line, self.column, self.id.as_str())
    }
}
