//! Built-in checks, each grounded directly in one of `spec.md` §8's literal
//! end-to-end scenarios. None of these reach for the value-flow engine where
//! a direct token/AST scan covers the scenario just as well — C7 only
//! requires a check to be "a pure function `run(view)`", not that it route
//! everything through C6.

use crate::ctu::{ArgFact, CallSummary, CtuSummary, FunctionSummary, ParamContract};
use crate::diagnostics::{Certainty, Diagnostic, Severity};
use crate::ids::{TokenId, VariableId};
use crate::token::{Pattern, TokenList, TokenKind};
use crate::valueflow;

use super::{AnalysisView, Check, Granularity};

/// `int a[5]; for (int i = 0; i <= 5; i++) a[i] = 0;` — the loop runs one
/// iteration past the array's last valid index (`spec.md` §8 scenario 1).
///
/// Deliberately doesn't lean on C6's `if`-branch refinement, which only
/// understands `if`, not a `for`'s condition clause: this check recovers the
/// loop variable's bound directly from the `for`'s own three clauses, plus a
/// separate pass for a literal index against a known array size.
pub struct ArrayIndexOutOfBoundsCheck;

impl Check for ArrayIndexOutOfBoundsCheck {
    fn id(&self) -> &'static str {
        "arrayIndexOutOfBounds"
    }
    fn rule_ids(&self) -> &'static [&'static str] {
        &["arrayIndexOutOfBounds"]
    }
    fn granularity(&self) -> Granularity {
        Granularity::PerFunction
    }
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, view: &AnalysisView) -> Vec<Diagnostic> {
        let list = view.tokens;
        let mut out = Vec::new();

        let Some(mut cur) = list.tokens() else { return out };
        loop {
            let id = cur;
            if list.get(id).text == "[" {
                if let Some(diag) = self.check_literal_index(view, id) {
                    out.push(diag);
                }
            }
            if list.get(id).text == "for" {
                out.extend(self.check_loop_body(view, id));
            }
            match list.next(id) {
                Some(next) => cur = next,
                None => break,
            }
        }
        out
    }
}

impl ArrayIndexOutOfBoundsCheck {
    /// `a[<literal>]` against a known array dimension, independent of any
    /// enclosing loop.
    fn check_literal_index(&self, view: &AnalysisView, bracket: TokenId) -> Option<Diagnostic> {
        let list = view.tokens;
        let base = list.prev(bracket)?;
        let index = list.next(bracket)?;
        let close = list.link(bracket)?;
        if list.next(index) != Some(close) {
            return None; // not a single-token index; leave to the loop-aware path.
        }
        let var_id = list.get(base).variable_ref?;
        let var = view.symbols.variable(var_id);
        let dim = var.array_dimensions.first().copied().flatten()?;
        let range = valueflow::integer_range(list, index)?;
        if range.hi < dim {
            return None;
        }
        let (file_index, line, column) = valueflow::origin(list, bracket);
        let certainty = if range.lo == range.hi { Certainty::Definite } else { Certainty::Inconclusive };
        Some(
            Diagnostic::new(
                self.id(),
                self.severity(),
                certainty,
                file_index,
                line,
                column,
                format!("index {} out of bounds for array of size {}", range.hi, dim),
            )
            .with_cwe(787),
        )
    }

    /// Recover `for (init; cond; inc) body` and flag any `arr[loopvar]`
    /// inside `body` where `cond` permits `loopvar` to reach or exceed
    /// `arr`'s declared size.
    fn check_loop_body(&self, view: &AnalysisView, for_tok: TokenId) -> Vec<Diagnostic> {
        let list = view.tokens;
        let mut out = Vec::new();

        let Some(open) = list.next(for_tok) else { return out };
        if list.get(open).text != "(" {
            return out;
        }
        let Some(close) = list.link(open) else { return out };

        let clauses = split_top_level_semicolons(list, open, close);
        if clauses.len() != 3 {
            return out;
        }
        let Some(loop_var) = last_identifier_text(list, &clauses[0]) else { return out };
        let Some((op, bound)) = comparison_against_literal(list, &clauses[1], &loop_var) else { return out };
        let max_reachable = match op {
            "<" => bound - 1,
            "<=" => bound,
            _ => return out,
        };

        let Some(after_paren) = list.next(close) else { return out };
        let body_end = if list.get(after_paren).text == "{" {
            list.link(after_paren)
        } else {
            find_next_semicolon(list, after_paren)
        };

        let mut cur = Some(after_paren);
        while let Some(id) = cur {
            if Some(id) == body_end {
                break;
            }
            if list.get(id).text == "[" {
                if let Some(diag) = self.check_loop_index(view, id, &loop_var, max_reachable) {
                    out.push(diag);
                }
            }
            cur = list.next(id);
        }
        out
    }

    fn check_loop_index(
        &self,
        view: &AnalysisView,
        bracket: TokenId,
        loop_var: &str,
        max_reachable: i64,
    ) -> Option<Diagnostic> {
        let list = view.tokens;
        let base = list.prev(bracket)?;
        let index = list.next(bracket)?;
        let close = list.link(bracket)?;
        if list.next(index) != Some(close) || list.get(index).text != loop_var {
            return None;
        }
        let var_id = list.get(base).variable_ref?;
        let var = view.symbols.variable(var_id);
        let dim = var.array_dimensions.first().copied().flatten()?;
        if max_reachable < dim {
            return None;
        }
        let (file_index, line, column) = valueflow::origin(list, bracket);
        Some(
            Diagnostic::new(
                self.id(),
                self.severity(),
                Certainty::Definite,
                file_index,
                line,
                column,
                format!("loop index '{}' can reach {}, out of bounds for array of size {}", loop_var, max_reachable, dim),
            )
            .with_cwe(787),
        )
    }
}

fn split_top_level_semicolons(list: &TokenList, open: TokenId, close: TokenId) -> Vec<Vec<TokenId>> {
    let mut clauses = vec![Vec::new()];
    let mut depth = 0i32;
    let mut cur = list.next(open);
    while let Some(id) = cur {
        if id == close && depth == 0 {
            break;
        }
        let tok = list.get(id);
        if tok.is_opening_bracket() {
            depth += 1;
        } else if tok.is_closing_bracket() {
            depth -= 1;
        }
        if tok.text == ";" && depth == 0 {
            clauses.push(Vec::new());
        } else {
            clauses.last_mut().unwrap().push(id);
        }
        cur = list.next(id);
    }
    clauses
}

fn last_identifier_text(list: &TokenList, segment: &[TokenId]) -> Option<String> {
    segment
        .iter()
        .rev()
        .find(|&&id| list.get(id).kind == TokenKind::Identifier)
        .map(|&id| list.get(id).text.clone())
}

/// Find `name OP literal` (or `literal OP name`) anywhere in `segment`.
fn comparison_against_literal(
    list: &TokenList,
    segment: &[TokenId],
    name: &str,
) -> Option<(&'static str, i64)> {
    for window in segment.windows(3) {
        let (a, op, b) = (list.get(window[0]), list.get(window[1]), list.get(window[2]));
        let Some(op_text) = (match op.text.as_str() {
            "<" => Some("<"),
            "<=" => Some("<="),
            ">" => Some(">"),
            ">=" => Some(">="),
            _ => None,
        }) else {
            continue;
        };
        if a.text == name && b.kind == TokenKind::Number {
            if let Ok(v) = b.text.parse::<i64>() {
                return Some((op_text, v));
            }
        }
    }
    None
}

fn find_next_semicolon(list: &TokenList, start: TokenId) -> Option<TokenId> {
    let mut cur = Some(start);
    while let Some(id) = cur {
        if list.get(id).text == ";" {
            return Some(id);
        }
        cur = list.next(id);
    }
    None
}

/// `strcpy(dst, src)` into a fixed-size `dst` array with no tracked bound on
/// `src` (`spec.md` §8 scenario 2 — reported `inconclusive` since the source
/// string's length is never proven).
pub struct BufferAccessOutOfBoundsCheck {
    pattern: Pattern,
}

impl BufferAccessOutOfBoundsCheck {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::compile("strcpy ( %var% , %var% )").expect("builtin pattern"),
        }
    }
}

impl Check for BufferAccessOutOfBoundsCheck {
    fn id(&self) -> &'static str {
        "bufferAccessOutOfBounds"
    }
    fn rule_ids(&self) -> &'static [&'static str] {
        &["bufferAccessOutOfBounds"]
    }
    fn granularity(&self) -> Granularity {
        Granularity::PerFunction
    }
    fn severity(&self) -> Severity {
        Severity::Warning
    }
    fn requires_inconclusive(&self) -> bool {
        true
    }

    fn run(&self, view: &AnalysisView) -> Vec<Diagnostic> {
        let list = view.tokens;
        let mut out = Vec::new();
        let Some(mut cur) = list.tokens() else { return out };
        loop {
            if let Some((start, _)) = self.pattern.find_from(list, cur) {
                let open = list.next(start).unwrap();
                let dst = list.next(open).unwrap();
                let Some(dst_var_id) = list.get(dst).variable_ref else {
                    cur = list.next(start).unwrap_or(start);
                    continue;
                };
                let dst_var = view.symbols.variable(dst_var_id);
                if dst_var.is_array {
                    if let Some(Some(size)) = dst_var.array_dimensions.first() {
                        let (file_index, line, column) = valueflow::origin(list, start);
                        out.push(
                            Diagnostic::new(
                                self.id(),
                                self.severity(),
                                Certainty::Inconclusive,
                                file_index,
                                line,
                                column,
                                format!("'strcpy' into a {}-byte buffer may write past its end", size),
                            )
                            .with_cwe(120),
                        );
                    }
                }
                match list.next(start) {
                    Some(next) => cur = next,
                    None => break,
                }
            } else {
                break;
            }
        }
        out
    }
}

/// `return &x;` where `x` is a local, non-parameter variable: the returned
/// address dangles the instant the callee's stack frame is gone (`spec.md`
/// §8 scenario 3).
pub struct ReturnDanglingLifetimeCheck {
    pattern: Pattern,
}

impl ReturnDanglingLifetimeCheck {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::compile("return & %var%").expect("builtin pattern"),
        }
    }
}

impl Check for ReturnDanglingLifetimeCheck {
    fn id(&self) -> &'static str {
        "returnDanglingLifetime"
    }
    fn rule_ids(&self) -> &'static [&'static str] {
        &["returnDanglingLifetime"]
    }
    fn granularity(&self) -> Granularity {
        Granularity::PerFunction
    }
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, view: &AnalysisView) -> Vec<Diagnostic> {
        let list = view.tokens;
        let mut out = Vec::new();
        let Some(mut cur) = list.tokens() else { return out };
        loop {
            let Some((start, _)) = self.pattern.find_from(list, cur) else { break };
            let amp = list.next(start).unwrap();
            let var_tok = list.next(amp).unwrap();
            if let Some(var_id) = list.get(var_tok).variable_ref {
                let var = view.symbols.variable(var_id);
                if var.is_local && !var.is_parameter {
                    let (file_index, line, column) = valueflow::origin(list, start);
                    out.push(
                        Diagnostic::new(
                            self.id(),
                            self.severity(),
                            Certainty::Definite,
                            file_index,
                            line,
                            column,
                            format!("returning address of local variable '{}'", var.name),
                        )
                        .with_cwe(562),
                    );
                }
            }
            match list.next(start) {
                Some(next) => cur = next,
                None => break,
            }
        }
        out
    }
}

/// `if (b == 0) { }` with an empty guard body, followed later by `a / b`:
/// the zero case was checked for and silently ignored rather than handled
/// (`spec.md` §8 scenario 4).
pub struct ZerodivCheck {
    guard: Pattern,
}

impl ZerodivCheck {
    pub fn new() -> Self {
        Self {
            guard: Pattern::compile("if ( %var% == %num% ) { }").expect("builtin pattern"),
        }
    }
}

impl Check for ZerodivCheck {
    fn id(&self) -> &'static str {
        "zerodiv"
    }
    fn rule_ids(&self) -> &'static [&'static str] {
        &["zerodiv"]
    }
    fn granularity(&self) -> Granularity {
        Granularity::PerFunction
    }
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, view: &AnalysisView) -> Vec<Diagnostic> {
        let list = view.tokens;
        let mut out = Vec::new();
        let Some(mut cur) = list.tokens() else { return out };
        loop {
            let Some((start, end)) = self.guard.find_from(list, cur) else { break };
            let var_tok = list.next(list.next(start).unwrap()).unwrap();
            let zero_tok = list.next(list.next(var_tok).unwrap()).unwrap();
            let guard_ok = list.get(zero_tok).text == "0" && list.get(var_tok).variable_ref.is_some();
            if guard_ok {
                let guarded_var = list.get(var_tok).variable_ref;
                if let Some(diag) = self.find_division(view, end, guarded_var) {
                    out.push(diag);
                }
            }
            match list.next(start) {
                Some(next) => cur = next,
                None => break,
            }
        }
        out
    }
}

impl ZerodivCheck {
    fn find_division(&self, view: &AnalysisView, from: TokenId, guarded_var: Option<VariableId>) -> Option<Diagnostic> {
        let list = view.tokens;
        let guarded_var = guarded_var?;
        let mut cur = Some(from);
        while let Some(id) = cur {
            if list.get(id).text == "/" {
                if let Some(rhs) = list.get(id).ast_operand2 {
                    if list.get(rhs).variable_ref == Some(guarded_var) {
                        let (file_index, line, column) = valueflow::origin(list, id);
                        let var = view.symbols.variable(guarded_var);
                        return Some(
                            Diagnostic::new(
                                self.id(),
                                self.severity(),
                                Certainty::Definite,
                                file_index,
                                line,
                                column,
                                format!("division by '{}', which was checked for zero and left unhandled", var.name),
                            )
                            .with_cwe(369),
                        );
                    }
                }
            }
            cur = list.next(id);
        }
        None
    }
}

/// Per-CTU: a function that dereferences a pointer parameter as the very
/// first thing it does, unconditionally, contributes a `requires_non_null`
/// contract; a call site passing a literal `0`/`NULL` for that parameter is
/// flagged once C8 merges every TU (`spec.md` §8 scenario 6). This check
/// itself never emits a diagnostic directly — `run` only exists to satisfy
/// the `Check` trait — the finding is produced by [`crate::ctu::merge`].
pub struct NullPointerCtuCheck;

impl Check for NullPointerCtuCheck {
    fn id(&self) -> &'static str {
        "nullPointer"
    }
    fn rule_ids(&self) -> &'static [&'static str] {
        &["nullPointer"]
    }
    fn granularity(&self) -> Granularity {
        Granularity::PerCtu
    }
    fn severity(&self) -> Severity {
        Severity::Error
    }

    fn run(&self, _view: &AnalysisView) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn summarize(&self, view: &AnalysisView) -> Option<CtuSummary> {
        let list = view.tokens;
        let db = view.symbols;
        let mut functions = Vec::new();
        let mut calls = Vec::new();

        for func in &db.functions {
            let Some(body) = func.body_scope else { continue };
            let scope = db.scope(body);
            let Some(open) = scope.open else { continue };

            let mut params = Vec::new();
            for (param_idx, &param_var) in func.parameters.iter().enumerate() {
                if !db.variable(param_var).is_pointer {
                    continue;
                }
                if let Some((line, column)) = first_statement_dereferences(list, open, scope.close, param_var) {
                    params.push(ParamContract {
                        index: param_idx,
                        requires_non_null: true,
                        deref_line: line,
                        deref_column: column,
                    });
                }
            }
            if !params.is_empty() {
                functions.push(FunctionSummary {
                    name: func.name.clone(),
                    file_index: list.get(func.declaration).file_index,
                    params,
                });
            }
        }

        let mut cur = list.tokens();
        while let Some(id) = cur {
            if let Some(callee_func) = list.get(id).function_ref {
                let open = list.next(id);
                if open.map(|o| list.get(o).text == "(").unwrap_or(false) {
                    let open = open.unwrap();
                    let close = list.link(open);
                    let args = collect_call_args(list, open, close);
                    let caller = list
                        .get(id)
                        .scope_ref
                        .and_then(|s| db.enclosing_function(s))
                        .map(|f| db.function(f).name.clone());
                    let (file_index, line, column) = valueflow::origin(list, id);
                    calls.push(CallSummary {
                        callee: db.function(callee_func).name.clone(),
                        caller,
                        file_index,
                        line,
                        column,
                        args,
                    });
                }
            }
            cur = list.next(id);
        }

        if functions.is_empty() && calls.is_empty() {
            None
        } else {
            Some(CtuSummary { functions, calls })
        }
    }
}

/// True (with the dereference's location) if the first non-brace token of
/// the function body is `* param` or `param ->`/`param [`.
fn first_statement_dereferences(
    list: &TokenList,
    open: TokenId,
    close: Option<TokenId>,
    param: VariableId,
) -> Option<(u32, u32)> {
    let first = list.next(open)?;
    if Some(first) == close {
        return None;
    }
    if list.get(first).text == "*" {
        let target = list.next(first)?;
        if list.get(target).variable_ref == Some(param) {
            return Some((list.line_of(first), list.column_of(first)));
        }
    }
    if list.get(first).variable_ref == Some(param) {
        if let Some(next) = list.next(first) {
            if matches!(list.get(next).text.as_str(), "->" | "[") {
                return Some((list.line_of(first), list.column_of(first)));
            }
        }
    }
    None
}

fn collect_call_args(list: &TokenList, open: TokenId, close: Option<TokenId>) -> Vec<ArgFact> {
    let Some(close) = close else { return Vec::new() };
    let mut args = Vec::new();
    let mut segment: Vec<TokenId> = Vec::new();
    let mut depth = 0i32;
    let mut cur = list.next(open);
    while let Some(id) = cur {
        if id == close && depth == 0 {
            break;
        }
        let tok = list.get(id);
        if tok.is_opening_bracket() {
            depth += 1;
            segment.push(id);
        } else if tok.is_closing_bracket() {
            depth -= 1;
            segment.push(id);
        } else if tok.text == "," && depth == 0 {
            args.push(classify_arg(list, &segment));
            segment.clear();
        } else {
            segment.push(id);
        }
        cur = list.next(id);
    }
    if !segment.is_empty() {
        args.push(classify_arg(list, &segment));
    }
    args
}

fn classify_arg(list: &TokenList, segment: &[TokenId]) -> ArgFact {
    if let [only] = segment {
        let tok = list.get(*only);
        if tok.kind == TokenKind::Number && tok.text == "0" {
            return ArgFact::NullLiteral;
        }
        if tok.text == "NULL" {
            return ArgFact::NullLiteral;
        }
    }
    ArgFact::Unknown
}

/// The catalogue this exercise's demo binary registers by default.
pub fn builtin_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(ArrayIndexOutOfBoundsCheck),
        Box::new(BufferAccessOutOfBoundsCheck::new()),
        Box::new(ReturnDanglingLifetimeCheck::new()),
        Box::new(ZerodivCheck::new()),
        Box::new(NullPointerCtuCheck),
    ]
}
