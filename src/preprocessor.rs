//! Translation-unit input types and the C1/C2 lexer.
//!
//! `spec.md` §1 explicitly places the preprocessor itself out of scope
//! ("assumed to deliver expanded translation units; only its output
//! interface is specified"). [`TranslationUnit`] is that interface: the
//! primary file plus whatever headers it pulled in, already
//! macro-expanded, as the driver (C11) receives them. [`lex`] turns one
//! into a [`TokenList`] (C1/C2), stripping comments per `spec.md` §4.3
//! step 1 and recovering any `cppcheck-suppress` annotations they carried
//! before they're discarded.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::SyntaxError;
use crate::ids::FileIndex;
use crate::suppressions::InlineSuppressionComment;
use crate::token::{Token, TokenKind, TokenList};

/// One already-preprocessed source file contributing to a translation
/// unit. `index` 0 is always the primary TU; nonzero indices are included
/// headers (`spec.md` §3 "file-index").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// A translation unit as the analysis driver (C11) receives it: the
/// primary file's expanded source plus the expanded source of every header
/// it transitively included, in the order the preprocessor emitted them.
///
/// Also the on-disk JSON shape the CLI binary reads: the "preprocessor
/// output interface" `spec.md` §1 treats as external to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationUnit {
    pub files: Vec<SourceFile>,
}

impl TranslationUnit {
    /// A TU with no included headers, for tests and the demo binary's
    /// single-file mode.
    pub fn single(path: PathBuf, content: String) -> Self {
        Self { files: vec![SourceFile { path, content }] }
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.display().to_string()).collect()
    }
}

/// Keywords recognized as `TokenKind::Keyword` rather than `Identifier`;
/// covers the C and C++ core grammar `spec.md`'s checks reference.
const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "bool", "catch", "class", "constexpr",
    "delete", "explicit", "export", "false", "friend", "namespace", "new", "noexcept",
    "nullptr", "operator", "private", "protected", "public", "template", "this", "throw",
    "true", "try", "typename", "using", "virtual",
];

/// Multi-character operators, longest first so the scanner can try them in
/// order without backtracking.
const MULTI_CHAR_OPERATORS: &[&str] = &[
    "<<=", ">>=", "...", "->*", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&",
    "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
];

/// Lexes every file of `tu` into one [`TokenList`], in file order. Returns
/// any bracket-matching errors (`spec.md` §4.1 "Failure") alongside the
/// inline `cppcheck-suppress` comments recovered before they were
/// discarded (`spec.md` §4.3 step 1, §6 "Suppression syntax").
pub fn lex(tu: &TranslationUnit) -> (TokenList, Vec<InlineSuppressionComment>, Vec<SyntaxError>) {
    let mut tokens = Vec::new();
    let mut inline_suppressions = Vec::new();

    for (index, file) in tu.files.iter().enumerate() {
        let file_index = FileIndex(index as u32);
        lex_one_file(file_index, &file.content, &mut tokens, &mut inline_suppressions);
    }

    let files = tu.files.iter().map(|f| f.path.clone()).collect();
    let (list, errors) = TokenList::from_tokens(files, tokens);
    (list, inline_suppressions, errors)
}

fn lex_one_file(file_index: FileIndex, source: &str, out: &mut Vec<Token>, inline_suppressions: &mut Vec<InlineSuppressionComment>) {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;
    let mut line = 1u32;
    let mut column = 1u32;

    macro_rules! advance {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance!();
            continue;
        }

        // Line comment: // ... (captures a trailing cppcheck-suppress).
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            let start_line = line;
            let mut text = String::new();
            advance!();
            advance!();
            while i < chars.len() && chars[i] != '\n' {
                text.push(chars[i]);
                advance!();
            }
            if let Some(c) = InlineSuppressionComment::parse(file_index, start_line, &text) {
                inline_suppressions.push(c);
            }
            continue;
        }

        // Block comment: /* ... */, possibly multi-line.
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line;
            let mut text = String::new();
            advance!();
            advance!();
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                text.push(chars[i]);
                advance!();
            }
            if i < chars.len() {
                advance!();
                advance!();
            }
            if let Some(c) = InlineSuppressionComment::parse(file_index, start_line, text.trim()) {
                inline_suppressions.push(c);
            }
            continue;
        }

        let tok_line = line;
        let tok_col = column;

        if c.is_ascii_digit() {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                text.push(chars[i]);
                advance!();
            }
            out.push(Token::new(text, TokenKind::Number, file_index, tok_line, tok_col));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                text.push(chars[i]);
                advance!();
            }
            let kind = if KEYWORDS.contains(&text.as_str()) { TokenKind::Keyword } else { TokenKind::Identifier };
            out.push(Token::new(text, kind, file_index, tok_line, tok_col));
            continue;
        }

        if c == '"' {
            let mut text = String::from("\"");
            advance!();
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(chars[i]);
                    advance!();
                }
                text.push(chars[i]);
                advance!();
            }
            if i < chars.len() {
                text.push('"');
                advance!();
            }
            out.push(Token::new(text, TokenKind::StringLiteral, file_index, tok_line, tok_col));
            continue;
        }

        if c == '\'' {
            let mut text = String::from("'");
            advance!();
            while i < chars.len() && chars[i] != '\'' {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    text.push(chars[i]);
                    advance!();
                }
                text.push(chars[i]);
                advance!();
            }
            if i < chars.len() {
                text.push('\'');
                advance!();
            }
            out.push(Token::new(text, TokenKind::CharLiteral, file_index, tok_line, tok_col));
            continue;
        }

        if let Some(op) = MULTI_CHAR_OPERATORS.iter().find(|op| source_matches(&chars, i, op)) {
            for _ in 0..op.chars().count() {
                advance!();
            }
            out.push(Token::new(*op, TokenKind::Operator, file_index, tok_line, tok_col));
            continue;
        }

        advance!();
        let kind = if "+-*/%=<>!&|^~?:".contains(c) { TokenKind::Operator } else { TokenKind::Punctuator };
        out.push(Token::new(c.to_string(), kind, file_index, tok_line, tok_col));
    }
}

fn source_matches(chars: &[char], at: usize, needle: &str) -> bool {
    let needle: Vec<char> = needle.chars().collect();
    if at + needle.len() > chars.len() {
        return false;
    }
    chars[at..at + needle.len()] == needle[..]
}
