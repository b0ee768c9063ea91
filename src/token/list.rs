//! Token list (C2): arena storage, O(1) navigation, bracket linking, splice.

use std::path::{Path, PathBuf};

use crate::error::SyntaxError;
use crate::ids::{FileIndex, TokenId};

use super::{Token, TokenKind};

/// One translation unit as an ordered token sequence.
///
/// Backed by an arena indexed by [`TokenId`]; `insert_after`/`erase` splice
/// the doubly-linked order without touching other tokens' storage slots, so
/// existing `TokenId`s into untouched tokens stay valid (invariant 1 in
/// `spec.md` §3: `t.next.prev == t` for every non-terminal `t`).
#[derive(Debug, Clone)]
pub struct TokenList {
    arena: Vec<Option<Token>>,
    head: Option<TokenId>,
    tail: Option<TokenId>,
    files: Vec<PathBuf>,
}

impl TokenList {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            arena: Vec::new(),
            head: None,
            tail: None,
            files,
        }
    }

    /// Build a list from a flat sequence of already-constructed tokens,
    /// wiring up `prev`/`next` in source order, then run bracket linking.
    pub fn from_tokens(files: Vec<PathBuf>, toks: Vec<Token>) -> (Self, Vec<SyntaxError>) {
        let mut list = Self::new(files);
        let mut prev: Option<TokenId> = None;
        for mut tok in toks {
            tok.prev = prev;
            tok.next = None;
            let id = TokenId::from_index(list.arena.len());
            list.arena.push(Some(tok));
            if let Some(p) = prev {
                list.arena[p.index()].as_mut().unwrap().next = Some(id);
            } else {
                list.head = Some(id);
            }
            prev = Some(id);
        }
        list.tail = prev;
        let errors = list.link_brackets();
        (list, errors)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn tokens(&self) -> Option<TokenId> {
        self.head
    }

    pub fn last(&self) -> Option<TokenId> {
        self.tail
    }

    pub fn get(&self, id: TokenId) -> &Token {
        self.arena[id.index()]
            .as_ref()
            .expect("TokenId referenced an erased token")
    }

    pub fn get_mut(&mut self, id: TokenId) -> &mut Token {
        self.arena[id.index()]
            .as_mut()
            .expect("TokenId referenced an erased token")
    }

    pub fn try_get(&self, id: TokenId) -> Option<&Token> {
        self.arena.get(id.index()).and_then(|o| o.as_ref())
    }

    pub fn next(&self, id: TokenId) -> Option<TokenId> {
        self.get(id).next
    }

    pub fn prev(&self, id: TokenId) -> Option<TokenId> {
        self.get(id).prev
    }

    pub fn link(&self, open: TokenId) -> Option<TokenId> {
        self.get(open).link
    }

    pub fn file_of(&self, t: TokenId) -> &Path {
        let idx = self.get(t).file_index.index();
        self.files.get(idx).map(PathBuf::as_path).unwrap_or(Path::new("<unknown>"))
    }

    pub fn line_of(&self, t: TokenId) -> u32 {
        self.get(t).line
    }

    pub fn column_of(&self, t: TokenId) -> u32 {
        self.get(t).column
    }

    /// Splice `new_tok` immediately after `t`, returning its id.
    pub fn insert_after(&mut self, t: TokenId, mut new_tok: Token) -> TokenId {
        let old_next = self.get(t).next;
        let id = TokenId::from_index(self.arena.len());
        new_tok.prev = Some(t);
        new_tok.next = old_next;
        self.arena.push(Some(new_tok));

        self.get_mut(t).next = Some(id);
        if let Some(n) = old_next {
            self.get_mut(n).prev = Some(id);
        } else {
            self.tail = Some(id);
        }
        id
    }

    /// Remove `t` from the sequence; its bracket partner (if any) loses its
    /// link, per the C2 contract.
    pub fn erase(&mut self, t: TokenId) {
        let (prev, next, link) = {
            let tok = self.get(t);
            (tok.prev, tok.next, tok.link)
        };

        match prev {
            Some(p) => self.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.get_mut(n).prev = prev,
            None => self.tail = prev,
        }
        if let Some(partner) = link {
            self.get_mut(partner).link = None;
        }
        self.arena[t.index()] = None;
    }

    /// Read-only forward iterator over `[start, end]` inclusive (or to the
    /// end of the list if `end` is `None`).
    pub fn slice(&self, start: TokenId, end: Option<TokenId>) -> Slice<'_> {
        Slice {
            list: self,
            cur: Some(start),
            end,
            done: false,
        }
    }

    pub fn iter(&self) -> Slice<'_> {
        match self.head {
            Some(h) => self.slice(h, None),
            None => Slice {
                list: self,
                cur: None,
                end: None,
                done: true,
            },
        }
    }

    /// One-pass bracket linker (C2 "Algorithm").
    ///
    /// `(`/`)`, `[`/`]`, `{`/`}` use a plain per-class stack. `<`/`>` are
    /// ambiguous with comparison operators: a `<` only becomes a candidate
    /// template opener when the preceding token is an identifier or
    /// keyword (the "declaration keyword or known template name" rule from
    /// `spec.md` §4.1, approximated here since the symbol database doesn't
    /// exist yet at this stage). Ties resolve to the innermost (shortest)
    /// span because the candidate stack is LIFO. Imbalanced brackets at
    /// end of input are reported as [`SyntaxError::UnmatchedBracket`] and
    /// left unlinked, matching the "Failure" clause in §4.1.
    fn link_brackets(&mut self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        let mut paren: Vec<TokenId> = Vec::new();
        let mut bracket: Vec<TokenId> = Vec::new();
        let mut brace: Vec<TokenId> = Vec::new();
        let mut angle: Vec<TokenId> = Vec::new();

        let mut cur = self.head;
        while let Some(id) = cur {
            let (text, prev_is_name, next_id) = {
                let tok = self.get(id);
                let prev_is_name = tok
                    .prev
                    .and_then(|p| self.try_get(p))
                    .map(|p| matches!(p.kind, TokenKind::Identifier | TokenKind::Keyword))
                    .unwrap_or(false);
                (tok.text.clone(), prev_is_name, tok.next)
            };

            match text.as_str() {
                "(" => paren.push(id),
                ")" => {
                    if let Some(open) = paren.pop() {
                        self.set_link(open, id);
                    } else {
                        errors.push(SyntaxError::UnmatchedBracket(id));
                    }
                }
                "[" => bracket.push(id),
                "]" => {
                    if let Some(open) = bracket.pop() {
                        self.set_link(open, id);
                    } else {
                        errors.push(SyntaxError::UnmatchedBracket(id));
                    }
                }
                "{" => brace.push(id),
                "}" => {
                    if let Some(open) = brace.pop() {
                        self.set_link(open, id);
                    } else {
                        errors.push(SyntaxError::UnmatchedBracket(id));
                    }
                }
                "<" if prev_is_name => angle.push(id),
                ">" => {
                    if let Some(open) = angle.pop() {
                        self.set_link(open, id);
                    }
                    // Unpaired '>' is almost always a comparison; not an error.
                }
                _ => {}
            }

            cur = next_id;
        }

        for leftover in paren.into_iter().chain(bracket).chain(brace) {
            errors.push(SyntaxError::UnmatchedBracket(leftover));
        }

        errors
    }

    fn set_link(&mut self, open: TokenId, close: TokenId) {
        self.get_mut(open).link = Some(close);
        self.get_mut(close).link = Some(open);
    }
}

/// Read-only forward view over a token range; no ownership transfer.
pub struct Slice<'a> {
    list: &'a TokenList,
    cur: Option<TokenId>,
    end: Option<TokenId>,
    done: bool,
}

impl<'a> Iterator for Slice<'a> {
    type Item = TokenId;

    fn next(&mut self) -> Option<TokenId> {
        if self.done {
            return None;
        }
        let id = self.cur?;
        if Some(id) == self.end {
            self.done = true;
        } else {
            self.cur = self.list.next(id);
            if self.cur.is_none() {
                self.done = true;
            }
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileIndex;

    fn tok(text: &str) -> Token {
        Token::new(text, super::TokenKind::Punctuator, FileIndex::PRIMARY, 1, 1)
    }

    fn ident(text: &str) -> Token {
        Token::new(text, super::TokenKind::Identifier, FileIndex::PRIMARY, 1, 1)
    }

    #[test]
    fn bracket_linking_balances_parens() {
        let toks = vec![tok("("), tok(")")];
        let (list, errors) = TokenList::from_tokens(vec![PathBuf::from("a.c")], toks);
        assert!(errors.is_empty());
        let open = list.tokens().unwrap();
        let close = list.next(open).unwrap();
        assert_eq!(list.link(open), Some(close));
        assert_eq!(list.link(close), Some(open));
    }

    #[test]
    fn unmatched_bracket_reported() {
        let toks = vec![tok("("), ident("x")];
        let (_, errors) = TokenList::from_tokens(vec![PathBuf::from("a.c")], toks);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SyntaxError::UnmatchedBracket(_)));
    }

    #[test]
    fn template_angle_brackets_require_preceding_name() {
        // vector<int> v;   -- "vector" then "<" makes "<" a candidate.
        let toks = vec![ident("vector"), tok("<"), ident("int"), tok(">")];
        let (list, errors) = TokenList::from_tokens(vec![PathBuf::from("a.cpp")], toks);
        assert!(errors.is_empty());
        let vector = list.tokens().unwrap();
        let lt = list.next(vector).unwrap();
        let int_tok = list.next(lt).unwrap();
        let gt = list.next(int_tok).unwrap();
        assert_eq!(list.link(lt), Some(gt));
    }

    #[test]
    fn comparison_less_than_not_linked_without_preceding_name() {
        // 1 < 2 -- "<" follows a number literal, not a name; no candidate.
        let num = Token::new("1", super::TokenKind::Number, FileIndex::PRIMARY, 1, 1);
        let toks = vec![num.clone(), tok("<"), num];
        let (list, _) = TokenList::from_tokens(vec![PathBuf::from("a.c")], toks);
        let one = list.tokens().unwrap();
        let lt = list.next(one).unwrap();
        assert_eq!(list.link(lt), None);
    }

    #[test]
    fn insert_and_erase_preserve_links() {
        let toks = vec![ident("a"), ident("c")];
        let (mut list, _) = TokenList::from_tokens(vec![PathBuf::from("a.c")], toks);
        let a = list.tokens().unwrap();
        let c = list.next(a).unwrap();
        let b = list.insert_after(a, ident("b"));
        assert_eq!(list.next(a), Some(b));
        assert_eq!(list.next(b), Some(c));
        assert_eq!(list.prev(c), Some(b));

        list.erase(b);
        assert_eq!(list.next(a), Some(c));
        assert_eq!(list.prev(c), Some(a));
    }
}
