//! Persistent build-dir cache (`spec.md` §6 "Persistent cache layout", §10
//! Non-goals: "re-analysis is per translation unit with an optional
//! persistent cache keyed by a fingerprint of inputs").
//!
//! One file per TU, named by a fingerprint of `(source path, content hash,
//! configuration digest, tool version)`. Contents are a tagged, versioned
//! record — `#[serde(default)]` on every field means a future release can
//! add fields and an older cache entry still deserializes, skipping what it
//! doesn't recognize, per the "self-describing and forward-compatible"
//! requirement. Writes go through the same temp-file-then-rename pattern
//! the teacher repo uses for its snapshot file, so a crash mid-write never
//! leaves a torn cache entry for a later run to trip over.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ctu::CtuSummary;
use crate::diagnostics::Diagnostic;
use crate::suppressions::InlineSuppressionComment;

/// Schema tag stamped on every cache record; bumped only if a future change
/// can't be read by an older binary (additive changes don't need a bump —
/// `#[serde(default)]` absorbs them).
const CACHE_SCHEMA_VERSION: u32 = 1;

/// Inputs hashed into a cache key (`spec.md` §6 "a fingerprint of (source
/// path, mtime or content hash, configuration digest, tool version)").
#[derive(Debug, Clone)]
pub struct CacheFingerprintInput<'a> {
    pub source_path: &'a Path,
    pub content_hash: &'a str,
    pub config_digest: &'a str,
    pub tool_version: &'a str,
}

/// Computes the hex fingerprint identifying one cache entry.
pub fn fingerprint(input: &CacheFingerprintInput) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.source_path.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(input.content_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.config_digest.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.tool_version.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes file content for use as `CacheFingerprintInput::content_hash`
/// when a cheaper mtime-based key isn't available (e.g. content piped in).
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes the subset of run settings that change analysis results, so a
/// settings change invalidates the cache without needing its own version
/// bump (`spec.md` §6 "configuration digest").
pub fn config_digest(enabled_rule_ids: &[&str], inconclusive: bool, ctu_max_depth: u32) -> String {
    let mut hasher = Sha256::new();
    let mut sorted: Vec<&&str> = enabled_rule_ids.iter().collect();
    sorted.sort();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update([inconclusive as u8]);
    hasher.update(ctu_max_depth.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// What's stored for one TU: its emitted diagnostics, the per-TU CTU
/// summary the driver will later fold into the cross-TU pass, and the
/// inline suppression comments the lexer recovered from its source — a
/// cache hit skips re-lexing entirely, so without this field a cached TU
/// could never have its `cppcheck-suppress` comments honored again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheRecord {
    pub schema_version: u32,
    pub diagnostics: Vec<Diagnostic>,
    pub ctu_summary: CtuSummary,
    pub inline: Vec<InlineSuppressionComment>,
}

impl CacheRecord {
    pub fn new(diagnostics: Vec<Diagnostic>, ctu_summary: CtuSummary, inline: Vec<InlineSuppressionComment>) -> Self {
        Self { schema_version: CACHE_SCHEMA_VERSION, diagnostics, ctu_summary, inline }
    }
}

/// A build-dir cache rooted at one directory, one file per fingerprint.
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Resolves the cache directory from an explicit override, falling
    /// back to the platform cache directory (`spec.md` §6 "platform cache
    /// directory" default), and finally the OS temp dir if neither is
    /// available.
    pub fn resolve_dir(explicit: Option<&str>) -> PathBuf {
        if let Some(dir) = explicit {
            return PathBuf::from(dir);
        }
        dirs::cache_dir().map(|d| d.join("tucheck")).unwrap_or_else(|| std::env::temp_dir().join("tucheck"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Reads a cache entry. Any failure — missing file, unreadable,
    /// unparseable, or a `schema_version` this binary doesn't understand —
    /// is treated as a cache miss rather than an error; the cache is purely
    /// an optimization the driver can always fall back from.
    pub fn load(&self, key: &str) -> Option<CacheRecord> {
        let path = self.entry_path(key);
        let content = std::fs::read_to_string(&path).ok()?;
        let record: CacheRecord = serde_json::from_str(&content).ok()?;
        if record.schema_version > CACHE_SCHEMA_VERSION {
            tracing::warn!(path = %path.display(), found = record.schema_version, supported = CACHE_SCHEMA_VERSION, "cache entry from a newer schema, ignoring");
            return None;
        }
        Some(record)
    }

    /// Writes a cache entry atomically (write to a temp file in the same
    /// directory, then rename) so a crash mid-write can't corrupt it.
    pub fn store(&self, key: &str, record: &CacheRecord) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        let content = serde_json::to_string(record).map_err(io::Error::other)?;
        write_atomic(&path, content)
    }
}

fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    use std::io::Write;

    let dir = path.parent().ok_or_else(|| io::Error::other("cache entry path has no parent directory"))?;
    let mut tmp = tempfile::Builder::new().prefix("tucheck_cache_").tempfile_in(dir)?;
    tmp.write_all(contents.as_ref())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Certainty, Severity};
    use crate::ids::FileIndex;
    use tempfile::TempDir;

    #[test]
    fn fingerprint_changes_when_content_hash_changes() {
        let base = CacheFingerprintInput {
            source_path: Path::new("a.c"),
            content_hash: "aaa",
            config_digest: "cfg",
            tool_version: "1.0.0",
        };
        let changed = CacheFingerprintInput { content_hash: "bbb", ..base.clone() };
        assert_ne!(fingerprint(&base), fingerprint(&changed));
    }

    #[test]
    fn config_digest_is_order_independent() {
        let a = config_digest(&["zerodiv", "nullPointer"], false, 2);
        let b = config_digest(&["nullPointer", "zerodiv"], false, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn store_then_load_round_trips() {
        let temp = TempDir::new().expect("temp dir");
        let cache = Cache::new(temp.path().to_path_buf());

        let diag = Diagnostic::new("zerodiv", Severity::Error, Certainty::Definite, FileIndex::PRIMARY, 3, 1, "division by zero");
        let record = CacheRecord::new(vec![diag], CtuSummary::default(), Vec::new());
        cache.store("abc123", &record).expect("store");

        let loaded = cache.load("abc123").expect("load");
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].id, "zerodiv");
    }

    #[test]
    fn missing_entry_is_a_clean_miss() {
        let temp = TempDir::new().expect("temp dir");
        let cache = Cache::new(temp.path().to_path_buf());
        assert!(cache.load("nope").is_none());
    }

    #[test]
    fn corrupt_entry_is_a_clean_miss_not_a_panic() {
        let temp = TempDir::new().expect("temp dir");
        std::fs::write(temp.path().join("bad.json"), "not json").unwrap();
        let cache = Cache::new(temp.path().to_path_buf());
        assert!(cache.load("bad").is_none());
    }
}
