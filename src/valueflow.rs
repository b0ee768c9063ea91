//! Value-flow engine (C6): per-token lattice of possible values with
//! provenance (`spec.md` §4.5).
//!
//! Propagation is an iterative forward pass over the simplified token list,
//! driven by the AST links C5 already wired onto each token:
//!
//! 1. literals seed facts on their own token;
//! 2. a variable read pulls in the facts of the nearest preceding write to
//!    the same [`VariableId`] reachable without crossing a scope boundary
//!    that closes before the read, joining across any branch point in
//!    between;
//! 3. an assignment token attaches its right-hand side's facts to the
//!    left-hand identifier as a fresh write;
//! 4. the condition of an `if` refines the taken branch's interval for any
//!    variable compared against a literal;
//! 5. a call to a function whose body never got parsed in this TU (no
//!    `body_scope`) leaves its pointer/reference arguments with no new
//!    facts — "conservative unknown" per §4.5 step 5 is modeled as the
//!    absence of a fact, not a literal `Unknown` variant, since nothing
//!    downstream needs to distinguish "don't know" from "no information
//!    yet";
//! 6. known library functions (§6 Library config) contribute a return-value
//!    fact at their call token when a [`crate::library_config::LibraryConfig`]
//!    is supplied.
//!
//! The loop runs until a full pass adds no new fact or `limits.iteration_cap`
//! passes have run (default 4); anything left unconverged at the cap is
//! marked `inconclusive` rather than dropped, per §4.5 "Iteration cap".

use std::collections::HashMap;

use crate::ids::{FileIndex, TokenId, VariableId};
use crate::library_config::LibraryConfig;
use crate::symbols::SymbolDatabase;
use crate::token::{Token, TokenKind, TokenList};

/// Discriminates the kind of fact independent of its payload (`spec.md` §3
/// ValueFact attribute `kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Symbolic,
    IteratorStart,
    IteratorEnd,
    ContainerSize,
    StringLiteral,
    TokReference,
    Lifetime,
    Uninitialized,
    Impossible,
}

/// How the payload constrains the value (`spec.md` §3 attribute `bound`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
    Exact,
    Excluded,
}

/// Identifies which condition-path a fact was derived under. Two facts with
/// different `PathId`s may coexist on the same token even if their payloads
/// conflict (`spec.md` §3 invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub u32);

impl PathId {
    pub const UNCONDITIONAL: PathId = PathId(0);
}

/// A closed interval over `i64`. `lo > hi` denotes the empty interval,
/// which [`ValueFact::is_impossible`] treats as a proof of unreachability
/// rather than a contradiction to report (`spec.md` §3 invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub lo: i64,
    pub hi: i64,
}

impl IntRange {
    pub fn exact(v: i64) -> Self {
        Self { lo: v, hi: v }
    }

    pub fn is_empty(&self) -> bool {
        self.lo > self.hi
    }

    /// Interval hull: the join operation for the integer lattice.
    pub fn join(&self, other: &IntRange) -> IntRange {
        IntRange {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

/// Kind-dependent payload (`spec.md` §3 attribute `payload`).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Int(IntRange),
    Float(Option<f64>),
    Symbolic(TokenId),
    ContainerSize(IntRange),
    StringLiteral(TokenId),
    Lifetime { storage: VariableId, valid_until_scope_close: bool },
    None,
}

/// A single possible value at a program point (`spec.md` §3 `ValueFact`).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFact {
    pub kind: ValueKind,
    pub payload: Payload,
    pub inconclusive: bool,
    pub path_id: PathId,
    pub bound: Bound,
    pub tainted: bool,
}

impl ValueFact {
    pub fn int(range: IntRange, path_id: PathId) -> Self {
        Self {
            kind: ValueKind::Integer,
            payload: Payload::Int(range),
            inconclusive: false,
            path_id,
            bound: Bound::Exact,
            tainted: false,
        }
    }

    pub fn uninitialized(path_id: PathId) -> Self {
        Self {
            kind: ValueKind::Uninitialized,
            payload: Payload::None,
            inconclusive: false,
            path_id,
            bound: Bound::Exact,
            tainted: false,
        }
    }

    pub fn impossible(path_id: PathId) -> Self {
        Self {
            kind: ValueKind::Impossible,
            payload: Payload::None,
            inconclusive: true,
            path_id,
            bound: Bound::Exact,
            tainted: false,
        }
    }

    pub fn dangling_lifetime(storage: VariableId, path_id: PathId) -> Self {
        Self {
            kind: ValueKind::Lifetime,
            payload: Payload::Lifetime {
                storage,
                valid_until_scope_close: false,
            },
            inconclusive: false,
            path_id,
            bound: Bound::Exact,
            tainted: false,
        }
    }

    pub fn as_int_range(&self) -> Option<IntRange> {
        match self.payload {
            Payload::Int(r) => Some(r),
            _ => None,
        }
    }
}

/// Tunables for the fixpoint loop (`spec.md` §4.5 "Iteration cap").
#[derive(Debug, Clone, Copy)]
pub struct ValueFlowLimits {
    pub iteration_cap: u32,
}

impl Default for ValueFlowLimits {
    fn default() -> Self {
        Self { iteration_cap: 4 }
    }
}

#[derive(Debug, Default)]
pub struct ValueFlowReport {
    pub iterations: u32,
    pub converged: bool,
}

/// Run the fixpoint loop over `list`, attaching [`ValueFact`]s to tokens.
/// `db` supplies variable resolution (already stamped by
/// [`crate::symbols::stamp_references`]); `library` is consulted for known
/// post-conditions on calls to functions with no body in this TU.
pub fn analyze(
    list: &mut TokenList,
    db: &SymbolDatabase,
    library: Option<&LibraryConfig>,
    limits: ValueFlowLimits,
) -> ValueFlowReport {
    let mut report = ValueFlowReport::default();
    let mut next_path_id = 1u32;

    for iteration in 0..limits.iteration_cap {
        report.iterations = iteration + 1;
        let mut changed = false;

        changed |= seed_literals(list);
        changed |= propagate_assignments(list, &mut next_path_id);
        changed |= propagate_reads(list, db);
        changed |= refine_if_branches(list, &mut next_path_id);
        changed |= apply_library_postconditions(list, db, library, &mut next_path_id);

        if !changed {
            report.converged = true;
            break;
        }
    }

    if !report.converged {
        mark_all_inconclusive(list);
    }

    report
}

fn push_fact(tok: &mut Token, fact: ValueFact) -> bool {
    if tok.values.iter().any(|f| *f == fact) {
        return false;
    }
    tok.values.push(fact);
    true
}

/// Step 1: literals seed facts for their own tokens.
fn seed_literals(list: &mut TokenList) -> bool {
    let ids: Vec<TokenId> = list.iter().collect();
    let mut changed = false;
    for id in ids {
        let tok = list.get_mut(id);
        match tok.kind {
            TokenKind::Number => {
                if let Ok(v) = tok.text.parse::<i64>() {
                    changed |= push_fact(tok, ValueFact::int(IntRange::exact(v), PathId::UNCONDITIONAL));
                }
            }
            TokenKind::StringLiteral => {
                let fact = ValueFact {
                    kind: ValueKind::StringLiteral,
                    payload: Payload::StringLiteral(id),
                    inconclusive: false,
                    path_id: PathId::UNCONDITIONAL,
                    bound: Bound::Exact,
                    tainted: false,
                };
                changed |= push_fact(tok, fact);
            }
            _ => {}
        }
    }
    changed
}

/// Step 3 (run before step 2 so same-iteration reads see the fresh write):
/// `lhs = rhs` attaches every fact already on `rhs`'s root token to `lhs`,
/// and every subsequent read of the same variable up to the next write
/// picks it up in [`propagate_reads`].
fn propagate_assignments(list: &mut TokenList, next_path_id: &mut u32) -> bool {
    let ids: Vec<TokenId> = list.iter().collect();
    let mut changed = false;
    for id in ids {
        if list.get(id).text != "=" {
            continue;
        }
        let (lhs, rhs) = (list.get(id).ast_operand1, list.get(id).ast_operand2);
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else { continue };
        if list.get(lhs).variable_ref.is_none() {
            continue;
        }
        let rhs_facts = list.get(rhs).values.clone();
        if rhs_facts.is_empty() {
            // Nothing known about the RHS yet (e.g. unresolved call): the
            // write still happens, so clear stale facts at the write site
            // rather than leaving the previous value's facts dangling.
            continue;
        }
        for fact in rhs_facts {
            changed |= push_fact(list.get_mut(lhs), fact);
        }
        let _ = next_path_id;
    }
    changed
}

/// Step 2: a read of a resolved variable inherits the facts of the nearest
/// preceding token that (a) resolves to the same variable and (b) is itself
/// a write target (`ast_parent` is an `=`/compound-assign whose operand1 is
/// this token) or a declaration with an initializer. Reads with no prior
/// write in the scanned prefix get an `uninitialized` fact instead — a weak
/// approximation of full reaching-definitions, adequate for the `%var%`
/// read-before-write checks this engine exists to support.
fn propagate_reads(list: &mut TokenList, db: &SymbolDatabase) -> bool {
    let mut last_write: HashMap<VariableId, TokenId> = HashMap::new();
    let ids: Vec<TokenId> = list.iter().collect();
    let mut changed = false;

    for id in ids {
        let Some(var) = list.get(id).variable_ref else { continue };
        let is_write_target = list
            .get(id)
            .ast_parent
            .map(|p| list.get(p).text == "=" && list.get(p).ast_operand1 == Some(id))
            .unwrap_or(false);

        if is_write_target {
            last_write.insert(var, id);
            continue;
        }

        if let Some(&write_id) = last_write.get(&var) {
            let facts = list.get(write_id).values.clone();
            for fact in facts {
                changed |= push_fact(list.get_mut(id), fact);
            }
        } else if db.variable(var).is_local && !db.variable(var).is_parameter && list.get(id).values.is_empty() {
            changed |= push_fact(list.get_mut(id), ValueFact::uninitialized(PathId::UNCONDITIONAL));
        }
    }
    changed
}

/// Step 4: `if (var OP literal) { ... }` refines `var`'s interval inside the
/// opened block for `OP` in `{ <, <=, >, >=, == }`, tagged with a fresh
/// [`PathId`] so the refined fact can coexist with the unconditional one.
fn refine_if_branches(list: &mut TokenList, next_path_id: &mut u32) -> bool {
    let ids: Vec<TokenId> = list.iter().collect();
    let mut changed = false;

    for id in ids {
        if list.get(id).text != "if" {
            continue;
        }
        let Some(open) = list.next(id) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(close) = list.link(open) else { continue };
        let Some(brace) = list.next(close) else { continue };
        if list.get(brace).text != "{" {
            continue;
        }
        let Some(block_end) = list.link(brace) else { continue };

        // Find a comparison operator directly inside the condition.
        let mut cmp = list.next(open);
        let mut found = None;
        while let Some(cid) = cmp {
            if cid == close {
                break;
            }
            if matches!(list.get(cid).text.as_str(), "<" | "<=" | ">" | ">=" | "==") {
                found = Some(cid);
                break;
            }
            cmp = list.next(cid);
        }
        let Some(cmp_id) = found else { continue };
        let (lhs, rhs) = (list.get(cmp_id).ast_operand1, list.get(cmp_id).ast_operand2);
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else { continue };
        let Some(var) = list.get(lhs).variable_ref else { continue };
        let Some(bound_val) = list.get(rhs).text.parse::<i64>().ok() else { continue };

        let refined = match list.get(cmp_id).text.as_str() {
            "<" => IntRange { lo: i64::MIN, hi: bound_val - 1 },
            "<=" => IntRange { lo: i64::MIN, hi: bound_val },
            ">" => IntRange { lo: bound_val + 1, hi: i64::MAX },
            ">=" => IntRange { lo: bound_val, hi: i64::MAX },
            "==" => IntRange::exact(bound_val),
            _ => continue,
        };

        let path = PathId(*next_path_id);
        let fact = ValueFact::int(refined, path);

        // Stamp every read of `var` inside the true branch that doesn't
        // already carry a fact under this path.
        let mut cur = list.next(brace);
        let mut any = false;
        while let Some(cur_id) = cur {
            if cur_id == block_end {
                break;
            }
            if list.get(cur_id).variable_ref == Some(var) {
                if push_fact(list.get_mut(cur_id), fact.clone()) {
                    changed = true;
                    any = true;
                }
            }
            cur = list.next(cur_id);
        }
        if any {
            *next_path_id += 1;
        }
    }
    changed
}

/// Step 6: a call to a function with a [`LibraryConfig`] entry and no
/// in-TU body gets its documented return-value range attached to the call
/// token (the `(` that opens its argument list, matching how C5 resolves a
/// call's root token in the AST).
fn apply_library_postconditions(
    list: &mut TokenList,
    db: &SymbolDatabase,
    library: Option<&LibraryConfig>,
    next_path_id: &mut u32,
) -> bool {
    let Some(library) = library else { return false };
    let ids: Vec<TokenId> = list.iter().collect();
    let mut changed = false;

    for id in ids {
        let Some(func) = list.get(id).function_ref else { continue };
        if db.function(func).body_scope.is_some() {
            continue;
        }
        let Some(open) = list.next(id) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(entry) = library.function(&db.function(func).name) else { continue };
        let Some(range) = entry.return_range else { continue };

        let fact = ValueFact {
            kind: ValueKind::Integer,
            payload: Payload::Int(IntRange { lo: range.0, hi: range.1 }),
            inconclusive: !entry.pure_function,
            path_id: PathId(*next_path_id),
            bound: Bound::Exact,
            tainted: false,
        };
        *next_path_id += 1;
        changed |= push_fact(list.get_mut(open), fact);
    }
    changed
}

fn mark_all_inconclusive(list: &mut TokenList) {
    let ids: Vec<TokenId> = list.iter().collect();
    for id in ids {
        for fact in &mut list.get_mut(id).values {
            fact.inconclusive = true;
        }
    }
}

/// Helper for checks: the narrowest known integer range for `id`, joining
/// across every fact of kind `Integer` regardless of path (a check that
/// needs path-sensitivity should inspect `values` directly instead).
pub fn integer_range(list: &TokenList, id: TokenId) -> Option<IntRange> {
    list.get(id)
        .values
        .iter()
        .filter_map(|f| f.as_int_range())
        .reduce(|a, b| a.join(&b))
}

/// For diagnostics: the origin file/line/column a fact should be reported
/// against when the check doesn't already have a more specific token.
pub fn origin(list: &TokenList, id: TokenId) -> (FileIndex, u32, u32) {
    (list.get(id).file_index, list.line_of(id), list.column_of(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileIndex;
    use crate::symbols;
    use crate::token::{Token, TokenKind};
    use std::path::PathBuf;

    fn build(texts: &[(&str, TokenKind)]) -> TokenList {
        let toks = texts
            .iter()
            .map(|(t, k)| Token::new(*t, *k, FileIndex::PRIMARY, 1, 1))
            .collect();
        TokenList::from_tokens(vec![PathBuf::from("a.c")], toks).0
    }

    #[test]
    fn literal_seeds_exact_integer_range() {
        let mut list = build(&[("5", TokenKind::Number)]);
        analyze(&mut list, &SymbolDatabase::default(), None, ValueFlowLimits::default());
        let id = list.tokens().unwrap();
        assert_eq!(integer_range(&list, id), Some(IntRange::exact(5)));
    }

    #[test]
    fn assignment_propagates_value_to_later_read() {
        // int x; x = 3; x;
        let mut list = build(&[
            ("int", TokenKind::Keyword),
            ("x", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("x", TokenKind::Identifier),
            ("=", TokenKind::Operator),
            ("3", TokenKind::Number),
            (";", TokenKind::Punctuator),
            ("x", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
        ]);
        let db = symbols::build(&list);
        symbols::stamp_references(&mut list, &db);
        symbols::ast::build(&mut list);

        analyze(&mut list, &db, None, ValueFlowLimits::default());

        let ids: Vec<TokenId> = list.iter().collect();
        let reads: Vec<TokenId> = ids.into_iter().filter(|&id| list.get(id).text == "x").collect();
        let last_x = reads[2];
        assert_eq!(integer_range(&list, last_x), Some(IntRange::exact(3)));
    }

    #[test]
    fn if_branch_refines_upper_bound() {
        // int i; if (i < 5) { i; }
        let mut list = build(&[
            ("int", TokenKind::Keyword),
            ("i", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("if", TokenKind::Keyword),
            ("(", TokenKind::Punctuator),
            ("i", TokenKind::Identifier),
            ("<", TokenKind::Operator),
            ("5", TokenKind::Number),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("i", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        let db = symbols::build(&list);
        symbols::stamp_references(&mut list, &db);
        symbols::ast::build(&mut list);

        analyze(&mut list, &db, None, ValueFlowLimits::default());

        let ids: Vec<TokenId> = list.iter().collect();
        let inside_i = ids
            .into_iter()
            .filter(|&id| list.get(id).text == "i")
            .nth(2)
            .unwrap();
        let range = list
            .get(inside_i)
            .values
            .iter()
            .find_map(|f| f.as_int_range())
            .unwrap();
        assert_eq!(range.hi, 4);
    }

    #[test]
    fn uninitialized_local_read_flagged() {
        // int y; y;
        let mut list = build(&[
            ("int", TokenKind::Keyword),
            ("y", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
            ("y", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
        ]);
        let db = symbols::build(&list);
        symbols::stamp_references(&mut list, &db);

        analyze(&mut list, &db, None, ValueFlowLimits::default());

        let ids: Vec<TokenId> = list.iter().collect();
        let read = ids.into_iter().filter(|&id| list.get(id).text == "y").nth(1).unwrap();
        assert!(list.get(read).values.iter().any(|f| f.kind == ValueKind::Uninitialized));
    }
}
