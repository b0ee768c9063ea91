//! Pattern mini-language (C3): the restricted matcher every check uses to
//! scan a token sequence. Deliberately not a general regex engine: each atom
//! matches exactly one token, there is no backtracking across atoms once one
//! has committed, and alternation is local to a single atom (`spec.md` §4.2).

use crate::error::SyntaxError;
use crate::ids::TokenId;
use crate::token::{Token, TokenKind, TokenList};

/// One position in a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    /// Exact source text, e.g. `return` or `;`.
    Literal(String),
    /// `%var%` — a token bound to a resolved variable.
    Var,
    /// `%type%` — a token bound to a resolved type.
    Type,
    /// `%num%`
    Num,
    /// `%str%`
    Str,
    /// `%char%`
    Char,
    /// `%bool%` — literal `true`/`false`.
    Bool,
    /// `%any%` — matches exactly one token, unconditionally.
    Any,
    /// `%op%` — any operator token.
    Op,
    /// `%name%` — any identifier, resolved or not.
    Name,
    /// `%comp%` — a comparison operator (`== != < <= > >=`).
    Comp,
    /// `%assign%` — an assignment operator (`= += -= *= /= %= &= |= ^= <<= >>=`).
    Assign,
    /// `[abc]` character-class: matches single-character punctuation/operator
    /// tokens whose text is one of the listed characters.
    CharClass(Vec<char>),
    /// `abc|def|ghi` literal alternation.
    Alternation(Vec<String>),
    /// Negated atom: `!!x` matches any token that the wrapped atom would not.
    Negated(Box<Atom>),
}

#[derive(Debug, Clone)]
struct Element {
    atom: Atom,
    /// `?` suffix: this element may be skipped entirely.
    optional: bool,
}

/// A compiled C3 pattern, ready to match starting at any token.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    elements: Vec<Element>,
}

impl Pattern {
    /// Compile `pattern_text`. Checks operate on `Pattern`s, typically built
    /// once at check-registration time and reused across every token in
    /// every TU, so malformed input is rejected here rather than at match
    /// time (`spec.md` §4.2 "Failure").
    pub fn compile(pattern_text: &str) -> Result<Self, SyntaxError> {
        let mut elements = Vec::new();
        for word in pattern_text.split_whitespace() {
            elements.push(Self::compile_word(word)?);
        }
        if elements.is_empty() {
            return Err(SyntaxError::MalformedTemplate(TokenId::from_index(0)));
        }
        Ok(Pattern {
            source: pattern_text.to_string(),
            elements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn compile_word(word: &str) -> Result<Element, SyntaxError> {
        let (body, optional) = match word.strip_suffix('?') {
            Some(b) if b.len() > 1 => (b, true),
            _ => (word, false),
        };

        let (body, negated) = match body.strip_prefix("!!") {
            Some(rest) if !rest.is_empty() => (rest, true),
            _ => (body, false),
        };

        let atom = Self::compile_atom(body)?;
        let atom = if negated { Atom::Negated(Box::new(atom)) } else { atom };
        Ok(Element { atom, optional })
    }

    fn compile_atom(body: &str) -> Result<Atom, SyntaxError> {
        if let Some(inner) = body.strip_prefix('%').and_then(|b| b.strip_suffix('%')) {
            return match inner {
                "var" => Ok(Atom::Var),
                "type" => Ok(Atom::Type),
                "num" => Ok(Atom::Num),
                "str" => Ok(Atom::Str),
                "char" => Ok(Atom::Char),
                "bool" => Ok(Atom::Bool),
                "any" => Ok(Atom::Any),
                "op" => Ok(Atom::Op),
                "name" => Ok(Atom::Name),
                "comp" => Ok(Atom::Comp),
                "assign" => Ok(Atom::Assign),
                _ => Err(SyntaxError::MalformedTemplate(TokenId::from_index(0))),
            };
        }

        if let Some(inner) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
            if inner.is_empty() {
                return Err(SyntaxError::MalformedTemplate(TokenId::from_index(0)));
            }
            return Ok(Atom::CharClass(inner.chars().collect()));
        }

        if body.contains('|') {
            let options: Vec<String> = body.split('|').map(str::to_string).collect();
            if options.iter().any(String::is_empty) {
                return Err(SyntaxError::MalformedTemplate(TokenId::from_index(0)));
            }
            return Ok(Atom::Alternation(options));
        }

        if body.is_empty() {
            return Err(SyntaxError::MalformedTemplate(TokenId::from_index(0)));
        }

        Ok(Atom::Literal(body.to_string()))
    }

    /// Attempt to match the pattern starting exactly at `start`. Returns the
    /// token one past the last matched element on success. Elements consume
    /// tokens strictly left to right; an optional element that doesn't match
    /// is skipped without consuming a token (no backtracking is needed
    /// because each element's match/no-match is decided independently).
    pub fn match_at(&self, list: &TokenList, start: TokenId) -> Option<TokenId> {
        let mut cur = Some(start);
        for element in &self.elements {
            match cur {
                Some(id) if Self::atom_matches(&element.atom, list.get(id)) => {
                    cur = list.next(id);
                }
                _ if element.optional => {
                    // Skip without consuming; `cur` unchanged.
                }
                _ => return None,
            }
        }
        cur.or(Some(start))
    }

    /// Scan forward from `start` (inclusive) for the first token at which the
    /// pattern matches, returning `(match_start, match_end)`.
    pub fn find_from(&self, list: &TokenList, start: TokenId) -> Option<(TokenId, TokenId)> {
        let mut cur = Some(start);
        while let Some(id) = cur {
            if let Some(end) = self.match_at(list, id) {
                return Some((id, end));
            }
            cur = list.next(id);
        }
        None
    }

    fn atom_matches(atom: &Atom, tok: &Token) -> bool {
        match atom {
            Atom::Literal(text) => tok.text == *text,
            Atom::Var => tok.variable_ref.is_some(),
            Atom::Type => tok.type_ref.is_some(),
            Atom::Num => tok.kind == TokenKind::Number,
            Atom::Str => tok.kind == TokenKind::StringLiteral,
            Atom::Char => tok.kind == TokenKind::CharLiteral,
            Atom::Bool => tok.text == "true" || tok.text == "false",
            Atom::Any => true,
            Atom::Op => tok.kind == TokenKind::Operator,
            Atom::Name => tok.kind == TokenKind::Identifier,
            Atom::Comp => matches!(tok.text.as_str(), "==" | "!=" | "<" | "<=" | ">" | ">="),
            Atom::Assign => matches!(
                tok.text.as_str(),
                "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>="
            ),
            Atom::CharClass(chars) => {
                let mut it = tok.text.chars();
                match (it.next(), it.next()) {
                    (Some(c), None) => chars.contains(&c),
                    _ => false,
                }
            }
            Atom::Alternation(options) => options.iter().any(|o| o == &tok.text),
            Atom::Negated(inner) => !Self::atom_matches(inner, tok),
        }
    }
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
        TokenList::from_tokens(vec![PathBuf::from("a.c")], toks).0
    }

    #[test]
    fn literal_sequence_matches() {
        let list = build(&[
            ("return", TokenKind::Keyword),
            ("0", TokenKind::Number),
            (";", TokenKind::Punctuator),
        ]);
        let pat = Pattern::compile("return %num% ;").unwrap();
        let start = list.tokens().unwrap();
        assert!(pat.match_at(&list, start).is_some());
    }

    #[test]
    fn optional_element_can_be_skipped() {
        let list = build(&[("delete", TokenKind::Keyword), (";", TokenKind::Punctuator)]);
        let pat = Pattern::compile("delete [ ]? ;").unwrap();
        let start = list.tokens().unwrap();
        assert!(pat.match_at(&list, start).is_some());
    }

    #[test]
    fn negation_rejects_matching_token() {
        let list = build(&[("0", TokenKind::Number)]);
        let pat = Pattern::compile("!!%str%").unwrap();
        let start = list.tokens().unwrap();
        assert!(pat.match_at(&list, start).is_some());

        let list2 = build(&[("\"x\"", TokenKind::StringLiteral)]);
        let pat2 = Pattern::compile("!!%str%").unwrap();
        let start2 = list2.tokens().unwrap();
        assert!(pat2.match_at(&list2, start2).is_none());
    }

    #[test]
    fn alternation_matches_any_option() {
        let list = build(&[("break", TokenKind::Keyword)]);
        let pat = Pattern::compile("break|continue|return").unwrap();
        let start = list.tokens().unwrap();
        assert!(pat.match_at(&list, start).is_some());
    }

    #[test]
    fn malformed_pattern_rejected_at_compile_time() {
        assert!(Pattern::compile("%nope%").is_err());
        assert!(Pattern::compile("[]").is_err());
        assert!(Pattern::compile("a|").is_err());
    }

    #[test]
    fn find_from_scans_forward() {
        let list = build(&[
            ("x", TokenKind::Identifier),
            ("=", TokenKind::Operator),
            ("strcpy", TokenKind::Identifier),
            ("(", TokenKind::Punctuator),
        ]);
        let pat = Pattern::compile("strcpy (").unwrap();
        let start = list.tokens().unwrap();
        let (match_start, _) = pat.find_from(&list, start).unwrap();
        assert_eq!(list.get(match_start).text, "strcpy");
    }
}
