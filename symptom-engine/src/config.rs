use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

use crate::{
    dataset::DEFAULT_LABEL_COLUMN,
    error::{DiagnosisError, Result},
    matcher::DEFAULT_MATCH_THRESHOLD,
};

/// Where the engine finds its inputs, and how it matches symptoms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_training_path")]
    pub training_path: PathBuf,
    #[serde(default = "default_doctors_path")]
    pub doctors_path: PathBuf,
    #[serde(default = "default_tree_path")]
    pub tree_path: PathBuf,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

fn default_training_path() -> PathBuf {
    PathBuf::from("data/Training.csv")
}

fn default_doctors_path() -> PathBuf {
    PathBuf::from("data/doctors_dataset.csv")
}

fn default_tree_path() -> PathBuf {
    PathBuf::from("data/tree.json")
}

fn default_label_column() -> String {
    DEFAULT_LABEL_COLUMN.to_string()
}

fn default_match_threshold() -> f64 {
    DEFAULT_MATCH_THRESHOLD
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            training_path: default_training_path(),
            doctors_path: default_doctors_path(),
            tree_path: default_tree_path(),
            label_column: default_label_column(),
            match_threshold: default_match_threshold(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| DiagnosisError::Config(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML config file. Relative data paths are resolved against the
    /// file's directory.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            for data_path in [
                &mut config.training_path,
                &mut config.doctors_path,
                &mut config.tree_path,
            ] {
                if data_path.is_relative() {
                    *data_path = base.join(&*data_path);
                }
            }
        }
        Ok(config)
    }

    /// Configuration from the process environment.
    ///
    /// `DIAGNOSIS_CONFIG` names a YAML file that takes precedence. Otherwise
    /// `TRAINING_DATA`, `DOCTORS_DATA`, `TREE_ARTIFACT`, `LABEL_COLUMN` and
    /// `MATCH_THRESHOLD` override the defaults one by one.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(path) = lookup("DIAGNOSIS_CONFIG") {
            return Self::from_yaml_file(path);
        }

        let mut config = Self::default();
        if let Some(path) = lookup("TRAINING_DATA") {
            config.training_path = path.into();
        }
        if let Some(path) = lookup("DOCTORS_DATA") {
            config.doctors_path = path.into();
        }
        if let Some(path) = lookup("TREE_ARTIFACT") {
            config.tree_path = path.into();
        }
        if let Some(column) = lookup("LABEL_COLUMN") {
            config.label_column = column;
        }
        if let Some(threshold) = lookup("MATCH_THRESHOLD") {
            config.match_threshold = threshold.trim().parse().map_err(|_| {
                DiagnosisError::Config(format!("MATCH_THRESHOLD '{}' is not a number", threshold))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(DiagnosisError::Config(format!(
                "match_threshold must be in (0, 1], got {}",
                self.match_threshold
            )));
        }
        if self.label_column.trim().is_empty() {
            return Err(DiagnosisError::Config("label_column must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_yaml_defaults_fill_gaps() {
        let config = EngineConfig::from_yaml_str("match_threshold: 0.75\n").unwrap();
        assert_eq!(config.match_threshold, 0.75);
        assert_eq!(config.label_column, "prognosis");
        assert_eq!(config.tree_path, PathBuf::from("data/tree.json"));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let err = EngineConfig::from_yaml_str("match_threshold: 0\n").unwrap_err();
        assert!(matches!(err, DiagnosisError::Config(_)));
        assert!(EngineConfig::from_yaml_str("match_threshold: 1.2\n").is_err());
    }

    #[test]
    fn test_yaml_file_paths_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "training_path: train.csv\ntree_path: /abs/tree.json").unwrap();

        let config = EngineConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.training_path, dir.path().join("train.csv"));
        assert_eq!(config.tree_path, PathBuf::from("/abs/tree.json"));
        assert_eq!(config.doctors_path, dir.path().join("data/doctors_dataset.csv"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRAINING_DATA", "/srv/train.csv"),
            ("LABEL_COLUMN", "disease"),
            ("MATCH_THRESHOLD", "0.8"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.training_path, PathBuf::from("/srv/train.csv"));
        assert_eq!(config.label_column, "disease");
        assert_eq!(config.match_threshold, 0.8);
        assert_eq!(config.doctors_path, PathBuf::from("data/doctors_dataset.csv"));
    }

    #[test]
    fn test_bad_env_threshold() {
        let err = EngineConfig::from_lookup(|key| {
            (key == "MATCH_THRESHOLD").then(|| "high".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, DiagnosisError::Config(_)));
    }
}
