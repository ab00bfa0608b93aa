use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use propsync_mapping::MapperConfig;
use serde::Deserialize;

pub const DEFAULT_MESSAGE_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub feed_path: PathBuf,
    pub dictionary_path: PathBuf,
    pub store_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub default_thumbnail: Option<PathBuf>,
    pub message_limit: usize,
    pub mapping_rules: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            feed_path: PathBuf::from("./data/sample-data.json"),
            dictionary_path: PathBuf::from("./data/dictionary.json"),
            store_dir: PathBuf::from("./store"),
            reports_dir: PathBuf::from("./reports"),
            user_agent: "propsync-bot/0.1".to_string(),
            http_timeout_secs: 20,
            default_thumbnail: Some(PathBuf::from("./data/default-thumbnail.webp")),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            mapping_rules: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            feed_path: std::env::var("PROPSYNC_FEED_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.feed_path),
            dictionary_path: std::env::var("PROPSYNC_DICTIONARY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dictionary_path),
            store_dir: std::env::var("PROPSYNC_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            reports_dir: std::env::var("PROPSYNC_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            user_agent: std::env::var("PROPSYNC_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout_secs: std::env::var("PROPSYNC_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
            // An empty value disables the placeholder fallback.
            default_thumbnail: match std::env::var("PROPSYNC_DEFAULT_THUMBNAIL") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(PathBuf::from(v)),
                Err(_) => defaults.default_thumbnail,
            },
            message_limit: std::env::var("PROPSYNC_MESSAGE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.message_limit),
            mapping_rules: std::env::var("PROPSYNC_MAPPING_RULES")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn mapper_config(&self) -> Result<MapperConfig> {
        match &self.mapping_rules {
            Some(path) => MappingRulesFile::load(path)?.into_mapper_config(),
            None => Ok(MapperConfig::default()),
        }
    }
}

/// Optional YAML overrides for the mapping layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MappingRulesFile {
    #[serde(default)]
    pub site_utc_offset: Option<String>,
    #[serde(default)]
    pub agency_contacts: Option<HashMap<i64, i64>>,
}

impl MappingRulesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn into_mapper_config(self) -> Result<MapperConfig> {
        let mut config = MapperConfig::default();
        if let Some(offset) = self.site_utc_offset {
            let parsed: FixedOffset = offset
                .trim()
                .parse()
                .with_context(|| format!("invalid site_utc_offset `{offset}`"))?;
            config = config.with_site_offset(parsed);
        }
        if let Some(contacts) = self.agency_contacts {
            config = config.with_agency_contacts(contacts);
        }
        Ok(config)
    }
}
