use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::imdb;

const DEFAULT_ENV_PREFIX: &str = "SHOWLAND";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_api_timeout(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_base_url() -> String {
    imdb::IMDB_API_BASE.to_string()
}

fn default_user_agent() -> String {
    format!("showland/{}", crate::VERSION)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_search_limit() -> usize {
    imdb::DEFAULT_SEARCH_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// Lines ahead of the sentinel at which the next page is requested.
    #[serde(default = "default_prefetch_margin")]
    pub prefetch_margin: usize,
    #[serde(default = "default_preloader_delay", with = "humantime_serde")]
    pub preloader_delay: Duration,
    #[serde(default = "default_card_height")]
    pub card_height: u16,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            prefetch_margin: default_prefetch_margin(),
            preloader_delay: default_preloader_delay(),
            card_height: default_card_height(),
        }
    }
}

fn default_prefetch_margin() -> usize {
    40
}

fn default_preloader_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_card_height() -> u16 {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_dynamic_theme")]
    pub dynamic_theme: bool,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            dynamic_theme: default_dynamic_theme(),
        }
    }
}

fn default_theme() -> String {
    "dark".into()
}

fn default_dynamic_theme() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    #[serde(default = "default_fallback_url")]
    pub fallback_url: String,
    #[serde(default = "default_image_width")]
    pub width: u32,
    #[serde(default = "default_image_height")]
    pub height: u32,
    #[serde(default = "default_image_quality")]
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_proxy_url(),
            fallback_url: default_fallback_url(),
            width: default_image_width(),
            height: default_image_height(),
            quality: default_image_quality(),
        }
    }
}

fn default_proxy_url() -> String {
    "https://wsrv.nl/".into()
}

fn default_fallback_url() -> String {
    "https://placehold.co/400x600?text=No+Image".into()
}

fn default_image_width() -> u32 {
    400
}

fn default_image_height() -> u32 {
    600
}

fn default_image_quality() -> u8 {
    55
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("showland").join("showland.log"))
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            cfg = read_config_file(path)?;
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = read_config_file(&default_path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "api.search_limit" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.api.search_limit = parsed;
            }
        }
        "feed.prefetch_margin" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.prefetch_margin = parsed;
            }
        }
        "feed.preloader_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.preloader_delay = duration;
            }
        }
        "feed.card_height" => {
            if let Ok(parsed) = value.parse::<u16>() {
                cfg.feed.card_height = parsed.max(1);
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "ui.dynamic_theme" => {
            cfg.ui.dynamic_theme = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "images.proxy_url" => cfg.images.proxy_url = value,
        "images.fallback_url" => cfg.images.fallback_url = value,
        "images.width" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.images.width = parsed;
            }
        }
        "images.height" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.images.height = parsed;
            }
        }
        "images.quality" => {
            if let Ok(parsed) = value.parse::<u8>() {
                cfg.images.quality = parsed;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("showland").join("config.yaml"))
}
