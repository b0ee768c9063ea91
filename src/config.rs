//! Run-wide settings (`spec.md` §12 "Settings"): severities enabled,
//! inconclusive mode, job count, per-stage timeouts, CTU depth, and the
//! cache directory. Loaded from an optional `tucheck.toml`, following the
//! teacher's `LoctreeConfig::load` shape exactly: missing file -> defaults,
//! unreadable/unparseable file -> a warning and defaults, never a hard
//! error — `spec.md` §6 treats configuration as "consumed", not validated
//! against a schema the core enforces.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::ctu::DEFAULT_MAX_DEPTH;
use crate::diagnostics::Severity;

fn default_enable() -> Vec<Severity> {
    vec![Severity::Error, Severity::Warning]
}

fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn default_check_timeout_ms() -> u64 {
    2_000
}

fn default_tu_timeout_ms() -> u64 {
    30_000
}

fn default_valueflow_timeout_ms() -> u64 {
    5_000
}

fn default_ctu_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

/// Root settings structure, deserialized from `tucheck.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Severities a run reports (`spec.md` §4.6 "Enablement resolution");
    /// `Severity::Internal` is always reported regardless of this list.
    #[serde(default = "default_enable")]
    pub enable: Vec<Severity>,
    /// Whether checks that only produce `Certainty::Inconclusive` findings
    /// run at all (`spec.md` §4.6).
    #[serde(default)]
    pub inconclusive: bool,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
    #[serde(default = "default_tu_timeout_ms")]
    pub tu_timeout_ms: u64,
    #[serde(default = "default_valueflow_timeout_ms")]
    pub valueflow_timeout_ms: u64,
    /// Call-graph hop bound for C8 (`spec.md` §4.7 "Recursion bound").
    #[serde(default = "default_ctu_max_depth")]
    pub ctu_max_depth: u32,
    /// `None` means fall back to `dirs::cache_dir()` at the point the cache
    /// is opened, matching `spec.md` §6's "platform cache directory" default.
    #[serde(default)]
    pub cache_dir: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable: default_enable(),
            inconclusive: false,
            jobs: default_jobs(),
            check_timeout_ms: default_check_timeout_ms(),
            tu_timeout_ms: default_tu_timeout_ms(),
            valueflow_timeout_ms: default_valueflow_timeout_ms(),
            ctu_max_depth: default_ctu_max_depth(),
            cache_dir: None,
        }
    }
}

impl Settings {
    /// Load `tucheck.toml` from `root`, falling back to defaults (with a
    /// `tracing::warn!`) if it's missing, unreadable, or malformed.
    pub fn load(root: &Path) -> Self {
        Self::load_from_path(&root.join("tucheck.toml"))
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse settings, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read settings, using defaults");
                Self::default()
            }
        }
    }

    /// `spec.md` §4.6 "Enablement resolution" step (a): a check's severity
    /// is reported. `Internal` is exempt — a crashing check must always be
    /// visible regardless of what the run enabled.
    pub fn severity_enabled(&self, severity: Severity) -> bool {
        severity == Severity::Internal || self.enable.contains(&severity)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn tu_timeout(&self) -> Duration {
        Duration::from_millis(self.tu_timeout_ms)
    }

    pub fn valueflow_timeout(&self) -> Duration {
        Duration::from_millis(self.valueflow_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn default_enables_error_and_warning_only() {
        let settings = Settings::default();
        assert!(settings.severity_enabled(Severity::Error));
        assert!(settings.severity_enabled(Severity::Warning));
        assert!(!settings.severity_enabled(Severity::Style));
        // internal diagnostics are never gated by `enable`.
        assert!(settings.severity_enabled(Severity::Internal));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let settings = Settings::load(temp.path());
        assert_eq!(settings.jobs, default_jobs());
    }

    #[test]
    fn load_valid_file_overrides_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tucheck.toml");
        let mut file = std::fs::File::create(&path).expect("create settings file");
        writeln!(
            file,
            r#"
            enable = ["error", "warning", "style"]
            inconclusive = true
            jobs = 4
            ctu_max_depth = 3
            "#
        )
        .expect("write settings");

        let settings = Settings::load_from_path(&path);
        assert!(settings.severity_enabled(Severity::Style));
        assert!(settings.inconclusive);
        assert_eq!(settings.jobs, 4);
        assert_eq!(settings.ctu_max_depth, 3);
    }

    #[test]
    fn load_malformed_file_warns_and_falls_back() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tucheck.toml");
        std::fs::write(&path, "not valid toml =====").expect("write garbage");

        let settings = Settings::load_from_path(&path);
        assert_eq!(settings.jobs, default_jobs());
    }
}
