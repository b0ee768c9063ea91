//! Expression AST construction (part of C5, `spec.md` §4.4 "AST construction").
//!
//! A precedence-climbing parser walks each statement (a run of tokens
//! between `;`/`{`/`}` boundaries) and wires `ast_parent`/`ast_operand1`/
//! `ast_operand2` directly onto the existing tokens — there is no separate
//! node type, an operator token simply *is* its own AST node. This keeps the
//! "AST links form a forest" invariant (`spec.md` §3 invariant 5) trivial to
//! check: following `ast_parent` from any token terminates at a token whose
//! own `ast_parent` is `None`.

use crate::ids::TokenId;
use crate::token::{TokenKind, TokenList};

/// Binding power table, loosest to tightest (C++ standard precedence,
/// collapsed to the operators the simplified dialect still contains).
fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" => 7,
        "<" | "<=" | ">" | ">=" => 8,
        "<<" | ">>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        _ => return None,
    })
}

/// Right-associative operators (just assignment here) climb differently:
/// the recursive call on the right-hand side uses the *same* precedence
/// rather than one tighter, so `a = b = c` parses as `a = (b = c)`.
fn is_right_associative(op: &str) -> bool {
    binary_precedence(op) == Some(1)
}

const PREFIX_UNARY: &[&str] = &["*", "&", "-", "+", "!", "~", "++", "--"];

/// A token is "value-producing" when it can end an operand — i.e. a `*` or
/// `&` immediately after it must be binary, not unary (`spec.md` §4.4
/// "ambiguities... resolved by surrounding context").
fn is_value_producing(list: &TokenList, id: TokenId) -> bool {
    let tok = list.get(id);
    matches!(
        tok.kind,
        TokenKind::Identifier | TokenKind::Number | TokenKind::StringLiteral | TokenKind::CharLiteral
    ) || matches!(tok.text.as_str(), ")" | "]")
}

/// Build AST links for every statement in the token list. A statement is a
/// maximal run of tokens not containing a top-level `;`/`{`/`}` (brackets
/// nested inside `(`/`[` don't count as statement boundaries).
pub fn build(list: &mut TokenList) {
    let mut cur = list.tokens();
    let mut stmt_start: Option<TokenId> = None;

    while let Some(id) = cur {
        let text = list.get(id).text.clone();
        match text.as_str() {
            ";" | "{" | "}" => {
                if let Some(start) = stmt_start.take() {
                    parse_statement(list, start, id);
                }
            }
            _ if stmt_start.is_none() => stmt_start = Some(id),
            _ => {}
        }
        cur = list.next(id);
    }
    if let Some(start) = stmt_start {
        if let Some(last) = list.last() {
            parse_statement(list, start, list.next(last).unwrap_or(last));
        }
    }
}

/// Parse the half-open token range `[start, end)` as one expression (or
/// expression statement) and link it.
fn parse_statement(list: &mut TokenList, start: TokenId, end: TokenId) {
    let mut cursor = start;
    let _ = parse_expr(list, &mut cursor, end, 0);
}

fn at_end(list: &TokenList, cursor: TokenId, end: TokenId) -> bool {
    cursor == end || list.try_get(cursor).is_none()
}

/// Precedence-climbing entry point: parse a primary/unary operand, then fold
/// in binary operators whose precedence is `>= min_prec`.
fn parse_expr(list: &mut TokenList, cursor: &mut TokenId, end: TokenId, min_prec: u8) -> Option<TokenId> {
    let mut lhs = parse_unary(list, cursor, end)?;

    while !at_end(list, *cursor, end) {
        let op_text = list.get(*cursor).text.clone();
        let Some(prec) = binary_precedence(&op_text) else { break };
        if prec < min_prec {
            break;
        }
        let op = *cursor;
        *cursor = list.next(op)?;
        if at_end(list, *cursor, end) {
            break;
        }
        let next_min = if is_right_associative(&op_text) { prec } else { prec + 1 };
        let rhs = parse_expr(list, cursor, end, next_min)?;

        list.get_mut(op).ast_operand1 = Some(lhs);
        list.get_mut(op).ast_operand2 = Some(rhs);
        list.get_mut(lhs).ast_parent = Some(op);
        list.get_mut(rhs).ast_parent = Some(op);
        lhs = op;
    }
    Some(lhs)
}

/// Parse a unary-prefixed primary, then any postfix `[...]`, `(...)`, `.`/`->`
/// chains, returning the root token of the operand.
fn parse_unary(list: &mut TokenList, cursor: &mut TokenId, end: TokenId) -> Option<TokenId> {
    if at_end(list, *cursor, end) {
        return None;
    }
    let tok = *cursor;
    let text = list.get(tok).text.clone();

    if PREFIX_UNARY.contains(&text.as_str()) {
        let is_unary_context = match list.prev(tok) {
            None => true,
            Some(p) => !is_value_producing(list, p),
        };
        if is_unary_context || !matches!(text.as_str(), "*" | "&") {
            *cursor = list.next(tok)?;
            let operand = parse_unary(list, cursor, end)?;
            list.get_mut(tok).ast_operand1 = Some(operand);
            list.get_mut(operand).ast_parent = Some(tok);
            return Some(parse_postfix(list, cursor, end, tok));
        }
    }

    *cursor = list.next(tok).unwrap_or(tok);
    if list.get(tok).text == "(" {
        // Parenthesized sub-expression: parse inside, return its root, then
        // resume scanning right after the matching `)`.
        if let Some(close) = list.link(tok) {
            let mut inner_cursor = list.next(tok).unwrap_or(close);
            let inner = if inner_cursor != close {
                parse_expr(list, &mut inner_cursor, close, 0)
            } else {
                None
            };
            *cursor = list.next(close).unwrap_or(close);
            if let Some(inner) = inner {
                return Some(parse_postfix(list, cursor, end, inner));
            }
        }
        return Some(tok);
    }

    Some(parse_postfix(list, cursor, end, tok))
}

/// Fold `base [ index ]`, `base ( args )`, and `base . name` / `base -> name`
/// into `base`'s operands, left to right.
fn parse_postfix(list: &mut TokenList, cursor: &mut TokenId, end: TokenId, mut base: TokenId) -> TokenId {
    loop {
        if at_end(list, *cursor, end) {
            return base;
        }
        let op = *cursor;
        match list.get(op).text.as_str() {
            "[" => {
                let Some(close) = list.link(op) else { return base };
                let mut inner_cursor = list.next(op).unwrap_or(close);
                let index = if inner_cursor != close {
                    parse_expr(list, &mut inner_cursor, close, 0)
                } else {
                    None
                };
                list.get_mut(op).ast_operand1 = Some(base);
                list.get_mut(base).ast_parent = Some(op);
                if let Some(index) = index {
                    list.get_mut(op).ast_operand2 = Some(index);
                    list.get_mut(index).ast_parent = Some(op);
                }
                base = op;
                *cursor = list.next(close).unwrap_or(close);
            }
            "(" => {
                let Some(close) = list.link(op) else { return base };
                list.get_mut(op).ast_operand1 = Some(base);
                list.get_mut(base).ast_parent = Some(op);
                *cursor = list.next(close).unwrap_or(close);
            }
            "." | "->" => {
                let Some(member) = list.next(op) else { return base };
                list.get_mut(op).ast_operand1 = Some(base);
                list.get_mut(base).ast_parent = Some(op);
                list.get_mut(op).ast_operand2 = Some(member);
                list.get_mut(member).ast_parent = Some(op);
                base = op;
                *cursor = list.next(member).unwrap_or(member);
            }
            "++" | "--" => {
                list.get_mut(op).ast_operand1 = Some(base);
                list.get_mut(base).ast_parent = Some(op);
                base = op;
                *cursor = list.next(op).unwrap_or(op);
            }
            _ => return base,
        }
    }
}
