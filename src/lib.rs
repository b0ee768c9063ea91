//! # tucheck
//!
//! Static analysis engine for C and C++ translation units: a tokenizer,
//! simplifier, symbol database, value-flow engine and a check dispatcher
//! with suppressions and cross-translation-unit merging.
//!
//! ## Pipeline
//!
//! - [`preprocessor`] — translation-unit input types and the lexer (C1/C2)
//! - [`simplify`] — normalizing passes run to a fixed point (C4)
//! - [`symbols`] — scope/variable/function/type recovery and the
//!   token-level AST (C5)
//! - [`valueflow`] — the value-flow lattice and its fixpoint analysis (C6)
//! - [`checks`] — the check registry and runner (C7)
//! - [`ctu`] — cross-translation-unit merging of per-TU summaries (C8)
//! - [`suppressions`] — inline and global suppression resolution (C9)
//! - [`diagnostics`] — the shared finding type and its ordering bus (C10)
//! - [`driver`] — orchestrates the above into one run (C11)
//!
//! ## Supporting modules
//!
//! - [`token`] — the doubly-linked token arena (C1/C2 storage)
//! - [`ids`] — arena index newtypes shared across the pipeline
//! - [`error`] — typed error enums per stage
//! - [`config`] — run-wide settings loaded from `tucheck.toml`
//! - [`library_config`] — known-function contracts (e.g. libc) consumed by
//!   checks that reason about calls to undefined functions
//! - [`cache`] — the optional persistent build-dir cache
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,no_run
//! use tucheck::driver;
//! use tucheck::preprocessor::TranslationUnit;
//! use std::path::{Path, PathBuf};
//!
//! let tu = TranslationUnit::single(PathBuf::from("main.c"), "int main(){return 0;}".into());
//! let report = driver::analyze_project(Path::new("."), &[tu], true);
//! println!("{} diagnostics, exit code {}", report.diagnostics.len(), report.exit_code);
//! ```
//!
//! ## CLI Usage
//!
//! The `tucheck` binary walks its input directory recursively for
//! `tu.json` files, each deserializing to [`preprocessor::TranslationUnit`]
//! (the preprocessor output interface `spec.md` §1 leaves external to this
//! crate):
//!
//! ```bash
//! tucheck tus/                       # analyze every tu.json found under tus/
//! tucheck --jobs 1 --no-cache tus/   # run serially, bypass the persistent cache
//! tucheck --enable error,warning,style tus/
//! tucheck --inconclusive tus/        # also run checks that only produce inconclusive findings
//! ```

pub mod cache;
pub mod checks;
pub mod config;
pub mod ctu;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod ids;
pub mod library_config;
pub mod preprocessor;
pub mod simplify;
pub mod suppressions;
pub mod symbols;
pub mod token;
pub mod valueflow;

pub use diagnostics::{Certainty, Diagnostic, Severity};
pub use driver::{Driver, RunReport};
pub use error::CoreError;
pub use preprocessor::TranslationUnit;
