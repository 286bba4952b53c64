use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// `sqlite://<path>`, `sqlite::memory:` or a bare file path
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    /// Intermediate flat file written by collection and read by import
    pub flat_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collect {
    pub query: String,
    pub count: usize,
    pub base_url: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    pub max_rate_limit_waits: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: Database,
    pub pipeline: Pipeline,
    pub collect: Collect,
}

impl Settings {
    /// Load settings from `settings.toml` (current directory or `chirp-core/`),
    /// then apply environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        let candidates = [
            PathBuf::from(CONFIG_FILE_NAME),
            PathBuf::from("chirp-core").join(CONFIG_FILE_NAME),
        ];
        Self::from_files(candidates.iter().filter(|p| p.exists()), env_var)
    }

    /// Load settings from an explicit file, then apply environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_files(std::iter::once(path.as_ref()), env_var)
    }

    /// `env` resolves override variables; the process environment outside tests
    fn from_files<I, P, E>(files: I, env: E) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        E: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder()
            .set_default("database.url", "sqlite://chirp.db")?
            .set_default("pipeline.flat_file", "posts_flat.csv")?
            .set_default("collect.query", "")?
            .set_default("collect.count", 100)?
            .set_default("collect.base_url", "https://api.twitter.com/1.1")?
            .set_default("collect.max_rate_limit_waits", 3)?;

        for file in files {
            builder = builder.add_source(File::from(file.as_ref()).required(false));
        }

        // Environment variables win over every file
        let overrides = [
            ("DATABASE_URL", "database.url"),
            ("FLAT_FILE", "pipeline.flat_file"),
            ("SEARCH_QUERY", "collect.query"),
            ("SEARCH_COUNT", "collect.count"),
            ("SEARCH_API_URL", "collect.base_url"),
            ("SEARCH_BEARER_TOKEN", "collect.bearer_token"),
        ];
        for (var, key) in overrides {
            if let Some(value) = env(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
