//! Cross-translation-unit merger (C8, `spec.md` §4.7).
//!
//! Per-TU checks that declare `PerCtu` granularity contribute a
//! [`CtuSummary`] during C7; once every TU has finished, [`merge`] joins
//! those summaries by function symbol and evaluates each call site's
//! argument facts against the callee's parameter contracts, emitting a
//! diagnostic with a caller-to-callee call stack on a match (`spec.md` §8
//! scenario 6).

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Certainty, Diagnostic, Severity, StackFrame};
use crate::ids::FileIndex;

/// What a function in this TU requires of one of its parameters, recovered
/// from its body (`spec.md` §4.7 "conditions under which each parameter is
/// dereferenced, freed, or assumed non-null").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamContract {
    pub index: usize,
    pub requires_non_null: bool,
    /// Location of the dereference that proved `requires_non_null`, for the
    /// callee frame of the resulting call stack.
    pub deref_line: u32,
    pub deref_column: u32,
}

/// A function defined in this TU, as seen by CTU-aware checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    pub file_index: FileIndex,
    pub params: Vec<ParamContract>,
}

/// What is known about one argument at a call site (`spec.md` §4.7
/// "call-point facts").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgFact {
    NullLiteral,
    Unknown,
}

/// One function call recorded in this TU.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    pub callee: String,
    pub caller: Option<String>,
    pub file_index: FileIndex,
    pub line: u32,
    pub column: u32,
    pub args: Vec<ArgFact>,
}

/// Everything a single TU contributes to the cross-TU pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtuSummary {
    pub functions: Vec<FunctionSummary>,
    pub calls: Vec<CallSummary>,
}

impl CtuSummary {
    pub fn merge_from(&mut self, other: CtuSummary) {
        self.functions.extend(other.functions);
        self.calls.extend(other.calls);
    }
}

/// Default recursion bound for call-graph traversal (`spec.md` §4.7
/// "Recursion bound").
pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const MAX_ALLOWED_DEPTH: u32 = 10;

/// Join every TU's [`CtuSummary`] by function name and evaluate call sites
/// against callee contracts, capping traversal at `max_depth` hops from a
/// call site to the function whose contract is checked (direct calls are
/// depth 1; `max_depth` only matters once indirection through function
/// pointers or deeper call chains is modeled, which this engine doesn't
/// attempt beyond depth 1 today — the parameter exists so callers can raise
/// it without an API break when that lands).
pub fn merge(summaries: &[CtuSummary], max_depth: u32) -> Vec<Diagnostic> {
    let max_depth = max_depth.min(MAX_ALLOWED_DEPTH).max(1);
    let _ = max_depth; // depth-1 direct calls only, see doc comment above.

    let mut by_name: std::collections::HashMap<&str, &FunctionSummary> = std::collections::HashMap::new();
    for summary in summaries {
        for func in &summary.functions {
            by_name.entry(func.name.as_str()).or_insert(func);
        }
    }

    let mut diagnostics = Vec::new();
    for summary in summaries {
        for call in &summary.calls {
            let Some(callee) = by_name.get(call.callee.as_str()) else { continue };
            for contract in &callee.params {
                if !contract.requires_non_null {
                    continue;
                }
                let Some(arg) = call.args.get(contract.index) else { continue };
                if *arg != ArgFact::NullLiteral {
                    continue;
                }

                let caller_frame = StackFrame {
                    file_index: call.file_index,
                    line: call.line,
                    column: call.column,
                    symbol: call.caller.clone(),
                };
                let callee_frame = StackFrame {
                    file_index: callee.file_index,
                    line: contract.deref_line,
                    column: contract.deref_column,
                    symbol: Some(callee.name.clone()),
                };

                let diag = Diagnostic::new(
                    "nullPointer",
                    Severity::Error,
                    Certainty::Definite,
                    callee.file_index,
                    contract.deref_line,
                    contract.deref_column,
                    format!("null pointer passed to '{}', which dereferences it unconditionally", callee.name),
                )
                .with_call_stack(vec![caller_frame, callee_frame]);
                diagnostics.push(diag);
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_tu_null_pointer_scenario_produces_call_stack() {
        // TU1: void f(int *p) { *p = 0; }
        let tu1 = CtuSummary {
            functions: vec![FunctionSummary {
                name: "f".to_string(),
                file_index: FileIndex(0),
                params: vec![ParamContract {
                    index: 0,
                    requires_non_null: true,
                    deref_line: 1,
                    deref_column: 20,
                }],
            }],
            calls: vec![],
        };
        // TU2: void f(int*); int main(){ f(0); return 0; }
        let tu2 = CtuSummary {
            functions: vec![],
            calls: vec![CallSummary {
                callee: "f".to_string(),
                caller: Some("main".to_string()),
                file_index: FileIndex(1),
                line: 1,
                column: 30,
                args: vec![ArgFact::NullLiteral],
            }],
        };

        let diags = merge(&[tu1, tu2], DEFAULT_MAX_DEPTH);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].id, "nullPointer");
        assert_eq!(diags[0].call_stack.len(), 2);
        assert_eq!(diags[0].call_stack[0].symbol.as_deref(), Some("main"));
        assert_eq!(diags[0].call_stack[1].symbol.as_deref(), Some("f"));
    }

    #[test]
    fn non_null_argument_does_not_trigger() {
        let tu1 = CtuSummary {
            functions: vec![FunctionSummary {
                name: "f".to_string(),
                file_index: FileIndex(0),
                params: vec![ParamContract {
                    index: 0,
                    requires_non_null: true,
                    deref_line: 1,
                    deref_column: 20,
                }],
            }],
            calls: vec![],
        };
        let tu2 = CtuSummary {
            functions: vec![],
            calls: vec![CallSummary {
                callee: "f".to_string(),
                caller: Some("main".to_string()),
                file_index: FileIndex(1),
                line: 1,
                column: 30,
                args: vec![ArgFact::Unknown],
            }],
        };
        assert!(merge(&[tu1, tu2], DEFAULT_MAX_DEPTH).is_empty());
    }
}
