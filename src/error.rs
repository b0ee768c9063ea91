//! Error taxonomy for the analysis pipeline.
//!
//! Four classes, matching the design in `spec.md` §7: syntactic errors are
//! recovered at the call site and turned into a `syntaxError` diagnostic;
//! internal errors carry enough context to triage and abort only the
//! affected stage; configuration errors abort the whole run before analysis
//! starts; resource errors degrade gracefully.

use std::fmt;
use std::path::PathBuf;

use crate::ids::TokenId;

/// Which pipeline stage raised an [`InternalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lex,
    Simplify,
    Symbols,
    ValueFlow,
    Check,
    Ctu,
    Suppression,
    DiagnosticBus,
    Cache,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lex => "lex",
            Stage::Simplify => "simplify",
            Stage::Symbols => "symbols",
            Stage::ValueFlow => "valueflow",
            Stage::Check => "check",
            Stage::Ctu => "ctu",
            Stage::Suppression => "suppression",
            Stage::DiagnosticBus => "diagnostic-bus",
            Stage::Cache => "cache",
        };
        f.write_str(s)
    }
}

/// Malformed input that a single site cannot recover from.
///
/// Never propagated past the stage that detected it — the caller converts
/// this into a `syntaxError` diagnostic and continues with the offending
/// region left in its original form.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("unmatched bracket at token {0:?}")]
    UnmatchedBracket(TokenId),
    #[error("malformed declaration near token {0:?}")]
    MalformedDeclaration(TokenId),
    #[error("malformed template argument list near token {0:?}")]
    MalformedTemplate(TokenId),
}

/// Invariant violated, algorithm cap exhausted, or a check failed.
///
/// Carries the stage and, where known, a token location so an
/// `internalError` diagnostic can be built with the context §7 requires.
#[derive(Debug, thiserror::Error)]
#[error("internal error in stage {stage}: {message}")]
pub struct InternalError {
    pub stage: Stage,
    pub message: String,
    pub token: Option<TokenId>,
}

impl InternalError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            token: None,
        }
    }

    pub fn at(stage: Stage, message: impl Into<String>, token: TokenId) -> Self {
        Self {
            stage,
            message: message.into(),
            token: Some(token),
        }
    }
}

/// Bad command line, unreadable rule files, or a library-config parse
/// failure. Raised before analysis begins; the binary exits with a reserved
/// code without emitting anything through the diagnostic bus.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Timeouts, OOM, I/O errors. Degrades gracefully: the offending stage
/// yields its current partial result and an `internal` diagnostic records
/// which stage timed out.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("stage {stage} exceeded its deadline")]
    Timeout { stage: Stage },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error produced by the library's public API.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
