//! Individual simplifier rewrites. Each function scans the list once,
//! applies at most the changes it finds in that scan, and returns whether it
//! changed anything — the orchestrator in `mod.rs` re-runs the whole set
//! until a full round leaves everything untouched.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Certainty, Diagnostic, Severity};
use crate::ids::{FileIndex, TokenId};
use crate::token::{Token, TokenFlags, TokenKind, TokenList};

use super::TokenFlagsExt as _;

/// Known typedef aliases collected from `typedef ... name;` declarations.
/// Keyed by alias name; the value is the token sequence it expands to.
#[derive(Debug, Default)]
pub(super) struct TypedefTable {
    aliases: HashMap<String, Vec<Token>>,
}

fn ids_in_order(list: &TokenList) -> Vec<TokenId> {
    list.iter().collect()
}

/// `A :: B` -> `A::B`, folding left to right so `A::B::C` converges over
/// successive orchestrator iterations.
pub(super) fn fold_qualified_names(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for id in ids {
        let Some(colon) = list.next(id) else { continue };
        if list.try_get(colon).map(|t| t.text.as_str()) != Some("::") {
            continue;
        }
        let Some(rhs) = list.next(colon) else { continue };
        let (lhs_ok, rhs_text) = {
            let lhs = list.get(id);
            let rhs_tok = list.get(rhs);
            (
                matches!(lhs.kind, TokenKind::Identifier | TokenKind::Keyword),
                rhs_tok.text.clone(),
            )
        };
        if !lhs_ok {
            continue;
        }
        if list.get(rhs).kind != TokenKind::Identifier {
            continue;
        }
        list.get_mut(id).text.push_str("::");
        list.get_mut(id).text.push_str(&rhs_text);
        list.erase(colon);
        list.erase(rhs);
        return true;
    }
    false
}

const PRIMITIVE_SIZES: &[(&str, u64)] = &[
    ("char", 1),
    ("short", 2),
    ("int", 4),
    ("long", 8),
    ("float", 4),
    ("double", 8),
];

/// `sizeof ( <primitive> )` -> the literal size in bytes.
pub(super) fn resolve_sizeof_of_primitive(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).text != "sizeof" {
            continue;
        }
        let Some(open) = list.next(id) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(prim) = list.next(open) else { continue };
        let Some(size) = PRIMITIVE_SIZES
            .iter()
            .find(|(name, _)| *name == list.get(prim).text)
            .map(|(_, size)| *size)
        else {
            continue;
        };
        let Some(close) = list.next(prim) else { continue };
        if list.get(close).text != ")" {
            continue;
        }

        list.get_mut(id).text = size.to_string();
        list.get_mut(id).kind = TokenKind::Number;
        list.erase(open);
        list.erase(prim);
        list.erase(close);
        return true;
    }
    false
}

/// Record `typedef <tokens> name ;` declarations and erase them from the
/// stream, then replace occurrences of `name` elsewhere with the recorded
/// token sequence. Expansion stops once `cap` aliases have been expanded in
/// this call, leaving the rest for a later iteration (or forever, if the
/// cap is reached every time — the orchestrator's own global cap bounds
/// that).
pub(super) fn collect_and_expand_typedefs(
    list: &mut TokenList,
    table: &mut TypedefTable,
    cap: u32,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let mut changed = false;

    // Phase 1: record and strip `typedef` declarations.
    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).text != "typedef" {
            continue;
        }
        let mut cur = list.next(id);
        let mut run: Vec<TokenId> = Vec::new();
        let mut semi = None;
        while let Some(t) = cur {
            if list.get(t).text == ";" {
                semi = Some(t);
                break;
            }
            run.push(t);
            cur = list.next(t);
        }
        let Some(semi) = semi else { continue };
        let Some(&alias_id) = run.last() else { continue };
        let alias_name = list.get(alias_id).text.clone();
        let aliased: Vec<Token> = run[..run.len() - 1].iter().map(|t| list.get(*t).clone()).collect();
        if aliased.is_empty() {
            continue;
        }
        table.aliases.insert(alias_name, aliased);

        list.erase(semi);
        for t in run {
            list.erase(t);
        }
        list.erase(id);
        changed = true;
        break;
    }

    // Phase 2: expand known aliases, up to `cap` expansions this call.
    let mut expansions = 0u32;
    let ids = ids_in_order(list);
    for id in ids {
        if expansions >= cap {
            diagnostics.push(Diagnostic::new(
                "typedefRecursionLimit",
                Severity::Debug,
                Certainty::Inconclusive,
                list.get(id).file_index,
                list.line_of(id),
                list.column_of(id),
                "typedef expansion cap reached; remaining aliases left unexpanded this pass",
            ));
            break;
        }
        if list.get(id).kind != TokenKind::Identifier {
            continue;
        }
        let Some(replacement) = table.aliases.get(&list.get(id).text).cloned() else {
            continue;
        };
        let mut anchor = id;
        for repl in replacement {
            anchor = list.insert_after(anchor, repl);
        }
        list.erase(id);
        expansions += 1;
        changed = true;
    }

    changed
}

/// `T* a, b;` -> `T* a; T b;` (the second declarator doesn't inherit the
/// first's pointer stars, matching C/C++ declarator-list semantics).
pub(super) fn split_declarators(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for comma in ids {
        if list.get(comma).text != "," {
            continue;
        }
        let Some(ident1) = list.prev(comma) else { continue };
        if list.get(ident1).kind != TokenKind::Identifier {
            continue;
        }
        let Some(ident2) = list.next(comma) else { continue };
        if list.get(ident2).kind != TokenKind::Identifier {
            continue;
        }
        // Must be followed by `;` to be confident this is a declarator list
        // rather than, say, a function-call argument list.
        let Some(semi) = list.next(ident2) else { continue };
        if list.get(semi).text != ";" {
            continue;
        }

        // Walk backward from ident1 over `*` to find the declarator's base
        // type and this declarator's own pointer-star run.
        let mut cur = list.prev(ident1);
        let mut base_type: Vec<Token> = Vec::new();
        while let Some(t) = cur {
            let text = list.get(t).text.clone();
            if text == "*" {
                cur = list.prev(t);
                continue;
            }
            if text == ";" || text == "{" || text == "}" {
                break;
            }
            base_type.push(list.get(t).clone());
            cur = list.prev(t);
        }
        if base_type.is_empty() {
            continue;
        }
        base_type.reverse();

        list.erase(comma);
        let new_semi = list.insert_after(ident1, Token::new(";", TokenKind::Punctuator, list.get(ident1).file_index, list.line_of(ident1), list.column_of(ident1)));
        let mut anchor = new_semi;
        for tok in base_type {
            anchor = list.insert_after(anchor, tok);
        }
        let _ = anchor;
        return true;
    }
    false
}

/// Removes a unary `+` immediately preceding a number or identifier when the
/// preceding token shows it can't be binary addition.
pub(super) fn fold_unary_plus(list: &mut TokenList) -> bool {
    const PREFIX_CONTEXT: &[&str] = &[
        "(", ",", "=", "return", "+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "!", ";", "{",
    ];
    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).text != "+" {
            continue;
        }
        let prefix_ok = match list.prev(id) {
            None => true,
            Some(p) => PREFIX_CONTEXT.contains(&list.get(p).text.as_str()),
        };
        if !prefix_ok {
            continue;
        }
        let Some(next) = list.next(id) else { continue };
        if !matches!(list.get(next).kind, TokenKind::Number | TokenKind::Identifier) {
            continue;
        }
        list.erase(id);
        return true;
    }
    false
}

/// Folds `<int literal> <op> <int literal>` into a single literal for
/// `+ - * /`, skipping division by zero (left for the `zerodiv` check to
/// report against the original, unfolded expression).
pub(super) fn fold_constant_arithmetic(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for lhs in ids {
        if list.get(lhs).kind != TokenKind::Number {
            continue;
        }
        let Some(op) = list.next(lhs) else { continue };
        let op_text = list.get(op).text.clone();
        if !matches!(op_text.as_str(), "+" | "-" | "*" | "/") {
            continue;
        }
        let Some(rhs) = list.next(op) else { continue };
        if list.get(rhs).kind != TokenKind::Number {
            continue;
        }
        let (Ok(a), Ok(b)) = (list.get(lhs).text.parse::<i64>(), list.get(rhs).text.parse::<i64>()) else {
            continue;
        };
        let result = match op_text.as_str() {
            "+" => a.checked_add(b),
            "-" => a.checked_sub(b),
            "*" => a.checked_mul(b),
            "/" if b != 0 => a.checked_div(b),
            _ => None,
        };
        let Some(result) = result else { continue };

        list.get_mut(lhs).text = result.to_string();
        list.erase(op);
        list.erase(rhs);
        return true;
    }
    false
}

/// Marks `while (cond) { ... }` with the canonical for-loop shape by
/// inserting the two `;` that a `for(;cond;)` would have, without renaming
/// the `while` keyword token itself — the original text stays intact and
/// [`crate::token::TokenFlags::SYNTHETIC_CONTROL_FORM`] records that this
/// loop has been canonicalized.
pub(super) fn canonicalize_while_loops(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for while_tok in ids {
        if list.get(while_tok).text != "while" {
            continue;
        }
        if list.get(while_tok).flags_has_synthetic() {
            continue;
        }
        let Some(open) = list.next(while_tok) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(close) = list.link(open) else { continue };
        let Some(last_cond) = list.prev(close) else { continue };
        if last_cond == open {
            continue;
        }

        let loc = (list.get(open).file_index, list.line_of(open), list.column_of(open));
        list.insert_after(open, Token::new(";", TokenKind::Punctuator, loc.0, loc.1, loc.2));
        list.insert_after(last_cond, Token::new(";", TokenKind::Punctuator, loc.0, loc.1, loc.2));
        list.get_mut(while_tok).flags_set_synthetic();
        return true;
    }
    false
}

fn push_synth(list: &mut TokenList, anchor: &mut TokenId, text: impl Into<String>, kind: TokenKind, loc: (FileIndex, u32, u32)) {
    let mut tok = Token::new(text, kind, loc.0, loc.1, loc.2);
    tok.flags.insert(TokenFlags::INSERTED_BY_SIMPLIFIER);
    *anchor = list.insert_after(*anchor, tok);
}

/// `for (T x : container) { body }` -> an explicit iterator loop (`spec.md`
/// §4.3 step 7). This dialect has no real iterator types, so the rewrite
/// settles for `auto __rangeN = container; auto __itN = __rangeN.begin();
/// __itN != __rangeN.end(); ++__itN` as the three `for` clauses, plus a
/// synthesized `T x = *__itN;` as the body's first statement. `N` is the
/// `for` token's own arena index, so nested range-for loops never collide.
/// All inserted tokens carry the original `for`'s location and are flagged
/// `INSERTED_BY_SIMPLIFIER`.
pub(super) fn canonicalize_range_based_for(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for for_tok in ids {
        if list.get(for_tok).text != "for" {
            continue;
        }
        if list.get(for_tok).flags_has_synthetic() {
            continue;
        }
        let Some(open) = list.next(for_tok) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(close) = list.link(open) else { continue };

        let mut colon = None;
        let mut has_semi = false;
        let mut depth = 0i32;
        let mut cur = list.next(open);
        while let Some(t) = cur {
            if t == close && depth == 0 {
                break;
            }
            let tok = list.get(t);
            if tok.is_opening_bracket() {
                depth += 1;
            } else if tok.is_closing_bracket() {
                depth -= 1;
            } else if depth == 0 && tok.text == ":" {
                colon = Some(t);
            } else if depth == 0 && tok.text == ";" {
                has_semi = true;
            }
            cur = list.next(t);
        }
        let Some(colon) = colon else { continue };
        if has_semi {
            continue;
        }

        let Some(body_open) = list.next(close) else { continue };
        if list.get(body_open).text != "{" {
            continue;
        }
        let Some(decl_start) = list.next(open) else { continue };
        let Some(decl_name) = list.prev(colon) else { continue };
        if decl_name == open || list.get(decl_name).kind != TokenKind::Identifier {
            continue;
        }

        let decl_tokens: Vec<Token> = {
            let mut v = Vec::new();
            let mut c = Some(decl_start);
            while let Some(t) = c {
                if t == colon {
                    break;
                }
                v.push(list.get(t).clone());
                c = list.next(t);
            }
            v
        };
        let container_tokens: Vec<Token> = {
            let mut v = Vec::new();
            let mut c = list.next(colon);
            while let Some(t) = c {
                if t == close {
                    break;
                }
                v.push(list.get(t).clone());
                c = list.next(t);
            }
            v
        };
        if container_tokens.is_empty() {
            continue;
        }

        let loc = (list.get(for_tok).file_index, list.line_of(for_tok), list.column_of(for_tok));
        let suffix = for_tok.index();
        let range_name = format!("__range{suffix}");
        let it_name = format!("__it{suffix}");

        // The original `( ... )` contents are replaced wholesale.
        let mut c = list.next(open);
        while let Some(t) = c {
            if t == close {
                break;
            }
            let next = list.next(t);
            list.erase(t);
            c = next;
        }

        let mut anchor = open;
        push_synth(list, &mut anchor, "auto", TokenKind::Keyword, loc);
        push_synth(list, &mut anchor, range_name.clone(), TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, "=", TokenKind::Operator, loc);
        for tok in container_tokens {
            anchor = list.insert_after(anchor, tok);
        }
        push_synth(list, &mut anchor, ",", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, "auto", TokenKind::Keyword, loc);
        push_synth(list, &mut anchor, it_name.clone(), TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, "=", TokenKind::Operator, loc);
        push_synth(list, &mut anchor, range_name.clone(), TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, ".", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, "begin", TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, "(", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, ")", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, ";", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, it_name.clone(), TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, "!=", TokenKind::Operator, loc);
        push_synth(list, &mut anchor, range_name, TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, ".", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, "end", TokenKind::Identifier, loc);
        push_synth(list, &mut anchor, "(", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, ")", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, ";", TokenKind::Punctuator, loc);
        push_synth(list, &mut anchor, "++", TokenKind::Operator, loc);
        push_synth(list, &mut anchor, it_name.clone(), TokenKind::Identifier, loc);

        let mut body_anchor = body_open;
        for tok in decl_tokens {
            body_anchor = list.insert_after(body_anchor, tok);
        }
        push_synth(list, &mut body_anchor, "=", TokenKind::Operator, loc);
        push_synth(list, &mut body_anchor, "*", TokenKind::Operator, loc);
        push_synth(list, &mut body_anchor, it_name, TokenKind::Identifier, loc);
        push_synth(list, &mut body_anchor, ";", TokenKind::Punctuator, loc);

        list.get_mut(for_tok).flags_set_synthetic();
        return true;
    }
    false
}

/// Known `enum { A, B = <lit>, C }` member values (`spec.md` §4.3 step 9),
/// keyed by member name. `declared_tokens` remembers which token *is* each
/// member's own declaration so [`resolve_enum_members`] never rewrites a
/// declaration site into a literal, only later uses of the name.
#[derive(Debug, Default)]
pub(super) struct EnumTable {
    values: HashMap<String, i64>,
    declared_tokens: HashSet<TokenId>,
}

/// Resolves `enum [Name] { A, B = <lit>, ... }` member declarations to
/// consecutive integer values (restarting the count after an explicit
/// `= <lit>`), then rewrites every later use of a member name into its
/// resolved integer literal. The enum declaration itself is left intact —
/// only uses elsewhere are folded — matching `spec.md` §4.3 step 9 ("where
/// declared").
pub(super) fn resolve_enum_members(list: &mut TokenList, table: &mut EnumTable) -> bool {
    let mut changed = false;

    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).text != "enum" {
            continue;
        }
        let mut cur = list.next(id);
        if let Some(c) = cur {
            if list.get(c).kind == TokenKind::Identifier {
                cur = list.next(c);
            }
        }
        let Some(open) = cur else { continue };
        if list.get(open).text != "{" {
            continue;
        }
        let Some(close) = list.link(open) else { continue };

        let mut members: Vec<Vec<TokenId>> = Vec::new();
        let mut segment: Vec<TokenId> = Vec::new();
        let mut depth = 0i32;
        let mut c = list.next(open);
        while let Some(t) = c {
            if t == close && depth == 0 {
                break;
            }
            let tok = list.get(t);
            if tok.is_opening_bracket() {
                depth += 1;
                segment.push(t);
            } else if tok.is_closing_bracket() {
                depth -= 1;
                segment.push(t);
            } else if tok.text == "," && depth == 0 {
                members.push(std::mem::take(&mut segment));
            } else {
                segment.push(t);
            }
            c = list.next(t);
        }
        if !segment.is_empty() {
            members.push(segment);
        }

        let mut next_value = 0i64;
        for member in &members {
            let Some(&name_id) = member.first() else { continue };
            if list.get(name_id).kind != TokenKind::Identifier {
                continue;
            }
            let value = if member.len() >= 3 && list.get(member[1]).text == "=" {
                member[2..]
                    .iter()
                    .find_map(|&t| list.get(t).text.parse::<i64>().ok())
                    .unwrap_or(next_value)
            } else {
                next_value
            };
            next_value = value + 1;

            if table.declared_tokens.contains(&name_id) {
                continue;
            }
            table.values.insert(list.get(name_id).text.clone(), value);
            table.declared_tokens.insert(name_id);
            changed = true;
        }
    }

    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).kind != TokenKind::Identifier || table.declared_tokens.contains(&id) {
            continue;
        }
        let Some(&value) = table.values.get(&list.get(id).text) else { continue };
        list.get_mut(id).text = value.to_string();
        list.get_mut(id).kind = TokenKind::Number;
        changed = true;
    }

    changed
}

/// Same canonicalization for `do { ... } while (cond);`.
pub(super) fn canonicalize_do_while_loops(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for do_tok in ids {
        if list.get(do_tok).text != "do" {
            continue;
        }
        if list.get(do_tok).flags_has_synthetic() {
            continue;
        }
        let Some(brace_open) = list.next(do_tok) else { continue };
        if list.get(brace_open).text != "{" {
            continue;
        }
        let Some(brace_close) = list.link(brace_open) else { continue };
        let Some(while_tok) = list.next(brace_close) else { continue };
        if list.get(while_tok).text != "while" {
            continue;
        }
        let Some(open) = list.next(while_tok) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(close) = list.link(open) else { continue };
        let Some(last_cond) = list.prev(close) else { continue };
        if last_cond == open {
            continue;
        }

        let loc = (list.get(open).file_index, list.line_of(open), list.column_of(open));
        list.insert_after(open, Token::new(";", TokenKind::Punctuator, loc.0, loc.1, loc.2));
        list.insert_after(last_cond, Token::new(";", TokenKind::Punctuator, loc.0, loc.1, loc.2));
        list.get_mut(do_tok).flags_set_synthetic();
        list.get_mut(while_tok).flags_set_synthetic();
        return true;
    }
    false
}

/// `*(p + i)` -> `p[i]`; the inverse direction (`p[i]` is already canonical
/// and left untouched).
pub(super) fn canonicalize_pointer_arithmetic(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for star in ids {
        if list.get(star).text != "*" {
            continue;
        }
        let Some(open) = list.next(star) else { continue };
        if list.get(open).text != "(" {
            continue;
        }
        let Some(ptr) = list.next(open) else { continue };
        if list.get(ptr).kind != TokenKind::Identifier {
            continue;
        }
        let Some(plus) = list.next(ptr) else { continue };
        if list.get(plus).text != "+" {
            continue;
        }
        let Some(offset) = list.next(plus) else { continue };
        if !matches!(list.get(offset).kind, TokenKind::Identifier | TokenKind::Number) {
            continue;
        }
        let Some(close) = list.next(offset) else { continue };
        if list.get(close).text != ")" || list.link(open) != Some(close) {
            continue;
        }

        list.erase(star);
        list.erase(open);
        list.get_mut(plus).text = "[".to_string();
        list.get_mut(plus).kind = TokenKind::Punctuator;
        list.get_mut(close).text = "]".to_string();
        list.get_mut(plus).link = Some(close);
        list.get_mut(close).link = Some(plus);
        return true;
    }
    false
}

/// Drops `register` storage-class specifiers and pre-C++11 `auto` used the
/// same way (`auto <type> name;`), leaving modern `auto` type deduction
/// alone since it isn't followed by another type keyword.
pub(super) fn remove_register_and_auto(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for id in ids {
        let text = list.get(id).text.clone();
        if text == "register" {
            list.erase(id);
            return true;
        }
        if text == "auto" {
            if let Some(next) = list.next(id) {
                if list.get(next).kind == TokenKind::Keyword {
                    list.erase(id);
                    return true;
                }
            }
        }
    }
    false
}

/// `; ;` -> `;`.
pub(super) fn collapse_empty_statements(list: &mut TokenList) -> bool {
    let ids = ids_in_order(list);
    for id in ids {
        if list.get(id).text != ";" {
            continue;
        }
        let Some(next) = list.next(id) else { continue };
        if list.get(next).text == ";" {
            list.erase(next);
            return true;
        }
    }
    false
}

/// Removes statements following an unconditional `return`/`break`/
/// `continue` up to (not including) the next `}`, emitting an
/// `unreachableCode` diagnostic at the dropped region's start.
pub(super) fn remove_dead_code_after_terminator(list: &mut TokenList, diagnostics: &mut Vec<Diagnostic>) -> bool {
    let ids = ids_in_order(list);
    for id in ids {
        if !matches!(list.get(id).text.as_str(), "return" | "break" | "continue") {
            continue;
        }
        let mut cur = list.next(id);
        while let Some(t) = cur {
            if list.get(t).text == ";" {
                cur = list.next(t);
                break;
            }
            cur = list.next(t);
        }
        let Some(first_dead) = cur else { continue };
        if list.get(first_dead).text == "}" {
            continue;
        }

        diagnostics.push(Diagnostic::new(
            "unreachableCode",
            Severity::Style,
            Certainty::Definite,
            list.get(first_dead).file_index,
            list.line_of(first_dead),
            list.column_of(first_dead),
            "unreachable code after return/break/continue",
        ));

        let mut dead = first_dead;
        loop {
            let next = list.next(dead);
            if list.get(dead).text == "}" {
                break;
            }
            list.erase(dead);
            match next {
                Some(n) => dead = n,
                None => break,
            }
        }
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileIndex;
    use std::path::PathBuf;

    fn build(texts: &[(&str, TokenKind)]) -> TokenList {
        let toks = texts
            .iter()
            .map(|(t, k)| Token::new(*t, *k, FileIndex::PRIMARY, 1, 1))
            .collect();
        TokenList::from_tokens(vec![PathBuf::from("a.cpp")], toks).0
    }

    #[test]
    fn folds_qualified_name() {
        let mut list = build(&[
            ("std", TokenKind::Identifier),
            ("::", TokenKind::Operator),
            ("vector", TokenKind::Identifier),
        ]);
        assert!(fold_qualified_names(&mut list));
        let head = list.tokens().unwrap();
        assert_eq!(list.get(head).text, "std::vector");
    }

    #[test]
    fn folds_constant_addition() {
        let mut list = build(&[
            ("2", TokenKind::Number),
            ("+", TokenKind::Operator),
            ("3", TokenKind::Number),
        ]);
        assert!(fold_constant_arithmetic(&mut list));
        let head = list.tokens().unwrap();
        assert_eq!(list.get(head).text, "5");
        assert_eq!(list.next(head), None);
    }

    #[test]
    fn division_by_zero_left_unfolded() {
        let mut list = build(&[
            ("1", TokenKind::Number),
            ("/", TokenKind::Operator),
            ("0", TokenKind::Number),
        ]);
        assert!(!fold_constant_arithmetic(&mut list));
    }

    #[test]
    fn while_loop_gets_canonical_semicolons() {
        let mut list = build(&[
            ("while", TokenKind::Keyword),
            ("(", TokenKind::Punctuator),
            ("x", TokenKind::Identifier),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        assert!(canonicalize_while_loops(&mut list));
        let while_tok = list.tokens().unwrap();
        assert!(list.get(while_tok).flags_has_synthetic());
        let open = list.next(while_tok).unwrap();
        let first_semi = list.next(open).unwrap();
        assert_eq!(list.get(first_semi).text, ";");
    }

    #[test]
    fn range_based_for_becomes_iterator_loop_with_synthetic_tokens() {
        let mut list = build(&[
            ("for", TokenKind::Keyword),
            ("(", TokenKind::Punctuator),
            ("int", TokenKind::Keyword),
            ("x", TokenKind::Identifier),
            (":", TokenKind::Punctuator),
            ("arr", TokenKind::Identifier),
            (")", TokenKind::Punctuator),
            ("{", TokenKind::Punctuator),
            ("}", TokenKind::Punctuator),
        ]);
        assert!(canonicalize_range_based_for(&mut list));
        let texts: Vec<String> = list.iter().map(|id| list.get(id).text.clone()).collect();
        assert!(texts.contains(&"__range0".to_string()) || texts.iter().any(|t| t.starts_with("__range")));
        assert!(texts.iter().any(|t| t.starts_with("__it")));
        assert!(texts.contains(&"begin".to_string()));
        assert!(texts.contains(&"end".to_string()));
        assert!(texts.contains(&"arr".to_string()));

        let for_tok = list.tokens().unwrap();
        assert!(list.get(for_tok).flags_has_synthetic());

        // Exactly two top-level semicolons inside the parens (three clauses),
        // matching every other `for` consumer's `split_top_level_semicolons`.
        let open = list.next(for_tok).unwrap();
        let close = list.link(open).unwrap();
        let mut semicolons = 0;
        let mut depth = 0i32;
        let mut cur = list.next(open);
        while let Some(t) = cur {
            if t == close {
                break;
            }
            let token = list.get(t);
            if token.is_opening_bracket() {
                depth += 1;
            } else if token.is_closing_bracket() {
                depth -= 1;
            } else if depth == 0 && token.text == ";" {
                semicolons += 1;
            }
            cur = list.next(t);
        }
        assert_eq!(semicolons, 2);

        // Idempotent: a second run over the already-rewritten loop is a no-op.
        assert!(!canonicalize_range_based_for(&mut list));
    }

    #[test]
    fn enum_members_resolve_to_consecutive_integers() {
        let mut list = build(&[
            ("enum", TokenKind::Keyword),
            ("{", TokenKind::Punctuator),
            ("RED", TokenKind::Identifier),
            (",", TokenKind::Punctuator),
            ("GREEN", TokenKind::Identifier),
            (",", TokenKind::Punctuator),
            ("BLUE", TokenKind::Identifier),
            ("}", TokenKind::Punctuator),
            (";", TokenKind::Punctuator),
            ("GREEN", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
        ]);
        let mut table = EnumTable::default();
        assert!(resolve_enum_members(&mut list, &mut table));

        let ids: Vec<TokenId> = list.iter().collect();
        // The declaration site keeps its name...
        assert_eq!(list.get(ids[2]).text, "RED");
        // ...but the later standalone use resolves to the literal value.
        let use_site = ids[9];
        assert_eq!(list.get(use_site).text, "1");
        assert_eq!(list.get(use_site).kind, TokenKind::Number);

        // A second pass changes nothing further.
        assert!(!resolve_enum_members(&mut list, &mut table));
    }

    #[test]
    fn enum_member_with_explicit_value_restarts_the_count() {
        let mut list = build(&[
            ("enum", TokenKind::Keyword),
            ("{", TokenKind::Punctuator),
            ("A", TokenKind::Identifier),
            (",", TokenKind::Punctuator),
            ("B", TokenKind::Identifier),
            ("=", TokenKind::Operator),
            ("5", TokenKind::Number),
            (",", TokenKind::Punctuator),
            ("C", TokenKind::Identifier),
            ("}", TokenKind::Punctuator),
            (";", TokenKind::Punctuator),
            ("C", TokenKind::Identifier),
            (";", TokenKind::Punctuator),
        ]);
        let mut table = EnumTable::default();
        resolve_enum_members(&mut list, &mut table);
        assert_eq!(table.values.get("C").copied(), Some(6));
    }

    #[test]
    fn sizeof_primitive_resolves_to_literal() {
        let mut list = build(&[
            ("sizeof", TokenKind::Keyword),
            ("(", TokenKind::Punctuator),
            ("int", TokenKind::Keyword),
            (")", TokenKind::Punctuator),
        ]);
        assert!(resolve_sizeof_of_primitive(&mut list));
        let head = list.tokens().unwrap();
        assert_eq!(list.get(head).text, "4");
        assert_eq!(list.get(head).kind, TokenKind::Number);
    }
}
