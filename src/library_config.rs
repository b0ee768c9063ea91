//! External library API description (`spec.md` §6 "Library config
//! (consumed)"). The core never parses the XML file cppcheck-style tools
//! ship this as — that loader lives outside this crate's scope (§1
//! Non-goals) — it consumes an already-parsed [`LibraryConfig`] value.
//!
//! `LibraryConfig::from_toml` is provided as a convenience for the demo
//! binary and tests, not as "the" format: any caller may build a
//! [`LibraryConfig`] directly from Rust.

use std::collections::HashMap;

use serde::Deserialize;

/// Whether an argument flows data into the call, out of it, or both
/// (`spec.md` §6 "argument directions").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgDirection {
    In,
    Out,
    InOut,
}

/// Per-argument shape the library description attaches (`spec.md` §6).
#[derive(Debug, Clone, Deserialize)]
pub struct ArgSpec {
    pub direction: ArgDirection,
    #[serde(default)]
    pub nullable: bool,
    /// True when a string argument is not guaranteed NUL-terminated (the
    /// `"not null-terminated" marker` in §6) — checks like the
    /// `bufferAccessOutOfBounds` scenario in §8 consult this.
    #[serde(default)]
    pub not_null_terminated: bool,
}

/// Allocation/free post-condition for a single argument or the return
/// value (`spec.md` §6 "allocates/frees").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocAction {
    Allocates,
    Frees,
}

/// A single external function's documented contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFunction {
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// Inclusive `(lo, hi)` range the return value is guaranteed to fall
    /// in, when documented (e.g. `strlen` -> `[0, SIZE_MAX)`, §4.5 step 6).
    #[serde(default)]
    pub return_range: Option<(i64, i64)>,
    #[serde(default)]
    pub alloc_action: Option<AllocAction>,
    /// No observable side effects beyond its return value; value-flow may
    /// treat repeated calls with the same arguments as equal.
    #[serde(default)]
    pub pure_function: bool,
    /// 1-based index of the `printf`-style format-string argument, if any.
    #[serde(default)]
    pub format_string_arg: Option<u32>,
}

impl LibraryFunction {
    pub fn pure(return_range: (i64, i64)) -> Self {
        Self {
            return_range: Some(return_range),
            pure_function: true,
            ..Self::default()
        }
    }
}

/// Pre-parsed library description keyed by symbol name (`spec.md` §6). The
/// core treats unknown symbols as "no contract known" rather than an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    functions: HashMap<String, LibraryFunction>,
}

impl LibraryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: LibraryFunction) -> &mut Self {
        self.functions.insert(name.into(), entry);
        self
    }

    pub fn function(&self, name: &str) -> Option<&LibraryFunction> {
        self.functions.get(name)
    }

    /// Parse a TOML representation of the pre-parsed library shape — a
    /// convenience constructor, not a claim that TOML is "the" library
    /// config format (`spec.md` §6 leaves that external).
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// A tiny built-in seed covering the functions named in `spec.md` §8's
    /// literal scenarios (`strcpy`, `strlen`), so the demo binary and tests
    /// can exercise C6 step 6 without hand-authoring TOML every time.
    pub fn with_libc_defaults() -> Self {
        let mut cfg = Self::default();
        cfg.insert(
            "strlen",
            LibraryFunction::pure((0, i64::MAX)),
        );
        cfg.insert(
            "strcpy",
            LibraryFunction {
                args: vec![
                    ArgSpec { direction: ArgDirection::Out, nullable: false, not_null_terminated: false },
                    ArgSpec { direction: ArgDirection::In, nullable: false, not_null_terminated: true },
                ],
                ..Default::default()
            },
        );
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_symbol_has_no_contract() {
        let cfg = LibraryConfig::new();
        assert!(cfg.function("frobnicate").is_none());
    }

    #[test]
    fn from_toml_parses_return_range() {
        let toml = r#"
            [functions.strlen]
            pure_function = true
            return_range = [0, 9223372036854775807]
        "#;
        let cfg = LibraryConfig::from_toml(toml).unwrap();
        let entry = cfg.function("strlen").unwrap();
        assert!(entry.pure_function);
        assert_eq!(entry.return_range, Some((0, i64::MAX)));
    }

    #[test]
    fn libc_defaults_mark_strcpy_source_not_null_terminated() {
        let cfg = LibraryConfig::with_libc_defaults();
        let strcpy = cfg.function("strcpy").unwrap();
        assert!(strcpy.args[1].not_null_terminated);
    }
}
