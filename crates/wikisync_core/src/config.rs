use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_WIKI_NAME: &str = "ProjectWiki";
pub const DEFAULT_KNOWLEDGE_ROOT: &str = "IT-knowledge";
pub const DEFAULT_OUTPUT_DIR: &str = "wiki-export";
pub const DEFAULT_CATALOG_FILE: &str = "it_knowledge.json";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONFIG_FILENAME: &str = "wikisync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: set {name} in the environment or .env")]
    Missing { name: &'static str },
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("failed to load config file {path}: {detail}")]
    File { path: String, detail: String },
}

/// Optional TOML configuration file. The PAT is never read from here; it is
/// environment-only so it cannot end up committed alongside project settings.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub azure: AzureSection,
    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct AzureSection {
    pub org_url: Option<String>,
    pub project: Option<String>,
    pub wiki: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct PathsSection {
    pub knowledge_root: Option<String>,
    pub output_dir: Option<String>,
}

/// Everything the exporter and importer need, resolved once at process entry.
/// Precedence per key: environment > config file > default.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub org_url: String,
    pub project: String,
    pub wiki_name: Option<String>,
    pub pat: String,
    pub knowledge_root: PathBuf,
    pub output_dir: PathBuf,
    pub timeout_ms: u64,
}

impl SyncConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(config_path, |key| env::var(key).ok())
    }

    pub fn resolve<F>(config_path: Option<&Path>, lookup_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = load_config_file_or_default(config_path)?;

        let org_url = required(
            "AZDO_ORG_URL",
            env_value(&lookup_env, "AZDO_ORG_URL").or_else(|| file.azure.org_url.clone()),
        )?;
        let project = required(
            "AZDO_PROJECT",
            env_value(&lookup_env, "AZDO_PROJECT").or_else(|| file.azure.project.clone()),
        )?;
        let pat = required("AZDO_PAT", env_value(&lookup_env, "AZDO_PAT"))?;

        let wiki_name = env_value(&lookup_env, "AZDO_WIKI").or_else(|| file.azure.wiki.clone());
        let knowledge_root = env_value(&lookup_env, "KNOWLEDGE_ROOT")
            .or_else(|| file.paths.knowledge_root.clone())
            .unwrap_or_else(|| DEFAULT_KNOWLEDGE_ROOT.to_string());
        let output_dir = env_value(&lookup_env, "OUTPUT_DIR")
            .or_else(|| file.paths.output_dir.clone())
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

        let timeout_ms = match env_value(&lookup_env, "AZDO_HTTP_TIMEOUT_MS") {
            None => DEFAULT_TIMEOUT_MS,
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "AZDO_HTTP_TIMEOUT_MS",
                value: raw.clone(),
            })?,
        };

        Ok(Self {
            org_url: org_url.trim_end_matches('/').to_string(),
            project,
            wiki_name,
            pat,
            knowledge_root: PathBuf::from(knowledge_root),
            output_dir: PathBuf::from(output_dir),
            timeout_ms,
        })
    }

    /// Wiki name used when the importer has to create the wiki.
    pub fn wiki_name_or_default(&self) -> &str {
        self.wiki_name.as_deref().unwrap_or(DEFAULT_WIKI_NAME)
    }
}

/// Configuration for the catalog builder. Needs no Azure credentials, so it is
/// resolved separately and never fails on missing AZDO_* variables.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
}

impl CatalogConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(config_path, |key| env::var(key).ok())
    }

    pub fn resolve<F>(config_path: Option<&Path>, lookup_env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = load_config_file_or_default(config_path)?;
        let input_dir = env_value(&lookup_env, "OUTPUT_DIR")
            .or_else(|| file.paths.output_dir.clone())
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());
        let output_path = env_value(&lookup_env, "CATALOG_JSON")
            .unwrap_or_else(|| DEFAULT_CATALOG_FILE.to_string());
        Ok(Self {
            input_dir: PathBuf::from(input_dir),
            output_path: PathBuf::from(output_path),
        })
    }
}

/// Load and parse a ConfigFile from TOML. Returns default if the file does not
/// exist; the file itself is optional.
pub fn load_config_file(config_path: &Path) -> Result<ConfigFile, ConfigError> {
    if !config_path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = fs::read_to_string(config_path).map_err(|error| ConfigError::File {
        path: config_path.display().to_string(),
        detail: error.to_string(),
    })?;
    toml::from_str(&content).map_err(|error| ConfigError::File {
        path: config_path.display().to_string(),
        detail: error.to_string(),
    })
}

fn load_config_file_or_default(config_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    match config_path {
        Some(path) => load_config_file(path),
        None => load_config_file(Path::new(DEFAULT_CONFIG_FILENAME)),
    }
}

fn env_value<F>(lookup_env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup_env(key)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or(ConfigError::Missing { name })
}
