use anyhow::{Context, Result};
use kasboek_archive::EventRouter;
use kasboek_archive::events::DEFAULT_NOISE_SUBTYPES;
use kasboek_extract::Extractor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{default_config_path, default_store_path, ensure_kasboek_home};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extract: ExtractSection,
    pub archive: ArchiveSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    /// IANA zone whose calendar decides the fallback date of a message
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    /// Message store file (default: $KASBOEK_HOME/messages.json)
    pub store_path: Option<PathBuf>,
    /// Event subtypes dropped before they reach the store
    pub ignored_subtypes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// tracing filter directive, e.g. "kasboek_archive=info"; RUST_LOG wins
    pub filter: Option<String>,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            store_path: None,
            ignored_subtypes: DEFAULT_NOISE_SUBTYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn extractor(&self) -> Result<Extractor> {
        Extractor::from_timezone_name(&self.extract.timezone)
            .context("config: [extract] timezone")
    }

    pub fn router(&self) -> EventRouter {
        EventRouter::new(self.archive.ignored_subtypes.iter().cloned())
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.archive.store_path {
            Some(p) => Ok(p.clone()),
            None => default_store_path(),
        }
    }
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(p) => Ok(p.to_path_buf()),
        None => default_config_path(),
    }
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let p = config_path(explicit)?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("in {}", p.display()))
}

pub fn init_config(explicit: Option<&Path>) -> Result<()> {
    let p = config_path(explicit)?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    if explicit.is_none() {
        ensure_kasboek_home()?;
    }
    let s = toml::to_string_pretty(&Config::default()).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn render_config(cfg: &Config) -> Result<String> {
    toml::to_string_pretty(cfg).context("serialize config")
}
