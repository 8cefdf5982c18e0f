use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use paw_core::extract::RetryPolicy;
use paw_core::progress::{BodyProfile, DEFAULT_WINDOW};

const DEFAULT_SOURCE_URL: &str = "http://127.0.0.1:8765/api";

pub struct Config {
    pub db_path: PathBuf,
    pub source: SourceConfig,
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Name of the environment variable holding the bearer token, if any.
    pub token_env: Option<String>,
    pub concurrency: usize,
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_URL.to_string(),
            token_env: None,
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub name: String,
    #[serde(default = "default_measures")]
    pub measures: Vec<String>,
    pub progress: Option<ProgressConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressConfig {
    pub start_date: NaiveDate,
    pub end_goal: i64,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(flatten)]
    pub body: BodyProfile,
}

fn default_measures() -> Vec<String> {
    vec!["Weight".to_string()]
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    database_path: Option<PathBuf>,
    source: SourceConfig,
    users: Vec<UserConfig>,
}

impl Config {
    /// Load `paw.toml` from `path` or the platform config directory. A missing
    /// default file yields an empty configuration; a missing explicit one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "paw").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let text = match path {
            Some(p) => Some(
                std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?,
            ),
            None => {
                let default_path = proj_dirs.config_dir().join("paw.toml");
                if default_path.exists() {
                    Some(std::fs::read_to_string(&default_path).with_context(|| {
                        format!("Failed to read config file: {}", default_path.display())
                    })?)
                } else {
                    None
                }
            }
        };

        let mut config = Self::from_toml(text.as_deref().unwrap_or_default(), &data_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub(crate) fn from_toml(text: &str, data_dir: &Path) -> Result<Self> {
        let file: FileConfig = toml::from_str(text).context("Failed to parse config file")?;

        let mut seen = std::collections::HashSet::new();
        for user in &file.users {
            paw_core::models::validate_user(&user.name)?;
            if !seen.insert(user.name.as_str()) {
                bail!("User '{}' is configured more than once", user.name);
            }
        }

        Ok(Config {
            db_path: file
                .database_path
                .unwrap_or_else(|| data_dir.join("paw.db")),
            source: file.source,
            users: file.users,
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PAW_DATABASE_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("PAW_SOURCE_URL") {
            self.source.base_url = url;
        }
    }

    /// The named user, or every configured user when `name` is `None`.
    pub fn select_users(&self, name: Option<&str>) -> Result<Vec<&UserConfig>> {
        match name {
            Some(name) => Ok(vec![self.user(name)?]),
            None => {
                if self.users.is_empty() {
                    bail!("No users configured. Add a [[users]] entry to paw.toml");
                }
                Ok(self.users.iter().collect())
            }
        }
    }

    pub fn user(&self, name: &str) -> Result<&UserConfig> {
        self.users
            .iter()
            .find(|u| u.name == name)
            .with_context(|| format!("User '{name}' is not configured"))
    }

    pub fn source_token(&self) -> Option<String> {
        self.source
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
    }
}
