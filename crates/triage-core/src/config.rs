use crate::classify::{AutoRule, ClassificationRules};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TriageConfig {
    pub ingest: IngestConfig,
    pub store: StoreConfig,
    pub classify: ClassifyConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Concurrent fetch+parse workers.
    pub worker_count: usize,
    /// Wall-clock budget for the whole ingestion; workers still running are abandoned.
    pub max_wait_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_wait_seconds: 300,
        }
    }
}

impl IngestConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("triage.db"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Extra substring rules, tried after the built-in ones.
    pub auto_rules: Vec<AutoRule>,
    /// Use `auto_rules` alone, without the built-in rules.
    pub replace_builtin_rules: bool,
}

impl ClassifyConfig {
    pub fn rules(&self) -> ClassificationRules {
        let base = if self.replace_builtin_rules {
            ClassificationRules::empty()
        } else {
            ClassificationRules::builtin()
        };
        base.with_rules(self.auto_rules.iter().cloned())
    }
}

impl TriageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.worker_count == 0 {
            return Err(ConfigError::Invalid(
                "ingest.worker_count must be at least 1".into(),
            ));
        }
        if let Some(rule) = self.classify.auto_rules.iter().find(|r| r.contains.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "classify.auto_rules entry for {} has no `contains` strings",
                rule.category
            )));
        }
        Ok(())
    }
}

/// Loads YAML config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<TriageConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(TriageConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: TriageConfig = if raw.trim().is_empty() {
        TriageConfig::default()
    } else {
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?
    };
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorCategory;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_config(Path::new("/definitely/not/here/triage.yaml")).unwrap();
        assert_eq!(cfg, TriageConfig::default());
        assert_eq!(cfg.ingest.worker_count, 10);
        assert_eq!(cfg.ingest.max_wait(), Duration::from_secs(300));
        assert_eq!(cfg.store.path, PathBuf::from("triage.db"));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "ingest:\n  worker_count: 4\nclassify:\n  auto_rules:\n    - category: timeout\n      contains: [\"test timed out after\"]"
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.ingest.worker_count, 4);
        assert_eq!(cfg.ingest.max_wait_seconds, 300);
        let rules = cfg.classify.rules();
        assert_eq!(rules.rules().len(), 3);
        assert_eq!(
            rules.classify("panic: test timed out after 5h0m0s"),
            Some(ErrorCategory::Timeout)
        );
    }

    #[test]
    fn replacing_builtin_rules() {
        let cfg = ClassifyConfig {
            auto_rules: vec![AutoRule::new(ErrorCategory::Timeout, ["timed out"])],
            replace_builtin_rules: true,
        };
        let rules = cfg.rules();
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.classify("OUT_OF_CAPACITY"), None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ingest:\n  worker_count: 0").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ingest: [not, a, map").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
