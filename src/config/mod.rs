use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::normalize::Vocabulary;

pub const DB_ENV_VAR: &str = "ROSTERLINK_DB";
const DEFAULT_DB_FILE: &str = "rosterlink.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub database: PathBuf,
    pub vocabularies: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: Option<PathBuf>,
    #[serde(default)]
    vocabularies: Option<HashMap<String, Vec<String>>>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Yaml(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl EngineConfig {
    pub fn vocabulary_for(&self, jurisdiction: &str) -> Vocabulary {
        match self.vocabularies.get(&jurisdiction.to_lowercase()) {
            Some(extras) => Vocabulary::with_extras(extras),
            None => Vocabulary::base(),
        }
    }

    // env wins over the config file, the config file over the default path
    pub fn resolve_database(&self) -> PathBuf {
        match std::env::var_os(DB_ENV_VAR) {
            Some(path) => PathBuf::from(path),
            None => self.database.clone(),
        }
    }
}

pub fn load_config(root: &Path) -> Result<EngineConfig, ConfigError> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(default_config(root));
    }
    let content = fs::read_to_string(&path)?;
    parse_config(root, &content)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config.yml")
}

fn parse_config(root: &Path, content: &str) -> Result<EngineConfig, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;
    let defaults = default_config(root);
    let vocabularies = raw
        .vocabularies
        .unwrap_or(defaults.vocabularies)
        .into_iter()
        .map(|(jurisdiction, terms)| (jurisdiction.to_lowercase(), terms))
        .collect();
    Ok(EngineConfig {
        database: raw.database.unwrap_or(defaults.database),
        vocabularies,
    })
}

pub fn default_config(root: &Path) -> EngineConfig {
    let mut vocabularies = HashMap::new();
    vocabularies.insert(
        "ms".to_string(),
        vec![
            "ssd".to_string(),
            "consolidated".to_string(),
            "ms".to_string(),
        ],
    );
    vocabularies.insert(
        "la".to_string(),
        vec!["parish".to_string(), "la".to_string()],
    );
    EngineConfig {
        database: root.join(DEFAULT_DB_FILE),
        vocabularies,
    }
}

pub fn default_config_yaml() -> String {
    r#"database: .rosterlink/rosterlink.sqlite
vocabularies:
  ms:
    - ssd
    - consolidated
    - ms
  la:
    - parish
    - la
"#
    .to_string()
}
