use crate::matcher::DEFAULT_MIN_SCORE;
use crate::service::{DedupKey, QueryOptions, RefreshMode};
use crate::sources::dfx;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::warn;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default)]
    pub mode: RefreshMode,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_max_age_secs() -> u64 { 10 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age_secs(),
            mode: RefreshMode::default(),
            dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    #[serde(default)]
    pub dedup: DedupKey,
    #[serde(default)]
    pub check_exists: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_min_score() -> u32 { DEFAULT_MIN_SCORE }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            dedup: DedupKey::default(),
            check_exists: false,
            exclude: Vec::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "dfx::default_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_program() -> String { dfx::OSASCRIPT.to_string() }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: dfx::default_args(),
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.cache.max_age_secs)
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.source.timeout_secs.map(Duration::from_secs)
    }

    /// Where the snapshot, PID file and worker log live.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache.dir {
            return dir.clone();
        }
        match project_dirs() {
            Some(dirs) => dirs.cache_dir().to_path_buf(),
            None => {
                let fallback = std::env::temp_dir().join("dfx");
                warn!("No home directory, using {:?} for the cache", fallback);
                fallback
            }
        }
    }

    /// Search options. Bad `exclude` patterns are logged and skipped.
    pub fn query_options(&self) -> QueryOptions {
        let exclude = self
            .search
            .exclude
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, e);
                    None
                }
            })
            .collect();

        QueryOptions {
            mode: self.cache.mode,
            dedup: self.search.dedup,
            check_exists: self.search.check_exists,
            exclude,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "dfx", "dfx")
}

pub fn default_config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    if !config_path.exists() {
        if path.is_some() {
            anyhow::bail!("config file {:?} does not exist", config_path);
        }
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)
        .with_context(|| format!("reading {:?}", config_path))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing {:?}", config_path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_age(), Duration::from_secs(10));
        assert_eq!(config.cache.mode, RefreshMode::Background);
        assert_eq!(config.search.dedup, DedupKey::KindAndPath);
        assert_eq!(config.search.min_score, DEFAULT_MIN_SCORE);
        assert_eq!(config.source.program, "/usr/bin/osascript");
        assert_eq!(config.source.args[3], dfx::FOLDERS_SCRIPT);
        assert_eq!(config.source_timeout(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            max_age_secs = 30
            mode = "inline"
            dir = "/tmp/dfx-test"

            [search]
            min_score = 50
            dedup = "path"
            check_exists = true
            exclude = ['\.Trash', '[']

            [source]
            program = "sh"
            args = ["-c", "cat entries.tsv"]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.max_age(), Duration::from_secs(30));
        assert_eq!(config.cache.mode, RefreshMode::Inline);
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/dfx-test"));
        assert_eq!(config.search.dedup, DedupKey::Path);
        assert_eq!(config.source_timeout(), Some(Duration::from_secs(5)));

        let options = config.query_options();
        assert!(options.check_exists);
        // The unbalanced `[` is dropped.
        assert_eq!(options.exclude.len(), 1);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str("[search]\ncheck_exists = true\n").unwrap();
        assert!(config.search.check_exists);
        assert_eq!(config.search.min_score, DEFAULT_MIN_SCORE);
        assert_eq!(config.cache.max_age_secs, 10);
        assert_eq!(config.source.program, dfx::OSASCRIPT);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.toml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache]\nmax_age_secs = 3\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_age(), Duration::from_secs(3));
    }
}
