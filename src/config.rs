// ⚙️ Configuration - TOML over built-in defaults
//
// Search order:
// 1. Explicit path passed on the command line
// 2. `sales-dashboard.toml` in the working directory
// 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "sales-dashboard.toml";

pub const GREETING_REPLY: &str = "Hello! I'm your sales data assistant ~ ( ´ ▽ ` )ﾉ";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("sales_database.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { ttl_seconds: 600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub top_n: usize,
    pub pareto_fraction: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            top_n: 10,
            pareto_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub horizon_days: usize,
    /// Width of the confidence band, e.g. 0.95
    pub interval_width: f64,
    /// Below this many daily points the forecast carries a warning
    pub min_history_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            horizon_days: 30,
            interval_width: 0.95,
            min_history_days: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhraseMatch {
    /// Whole normalized query equals the phrase
    Exact,
    /// Phrase occurs anywhere in the normalized query
    Contains,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmallTalkRule {
    pub phrase: String,
    pub reply: String,
    #[serde(rename = "match", default = "default_phrase_match")]
    pub match_mode: PhraseMatch,
}

fn default_phrase_match() -> PhraseMatch {
    PhraseMatch::Exact
}

impl SmallTalkRule {
    pub fn exact(phrase: &str, reply: &str) -> Self {
        SmallTalkRule {
            phrase: phrase.to_string(),
            reply: reply.to_string(),
            match_mode: PhraseMatch::Exact,
        }
    }

    /// `normalized` must already be lowercased and trimmed.
    pub fn matches(&self, normalized: &str) -> bool {
        let phrase = self.phrase.trim().to_lowercase();
        match self.match_mode {
            PhraseMatch::Exact => normalized == phrase,
            PhraseMatch::Contains => !phrase.is_empty() && normalized.contains(&phrase),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub currency_symbol: String,
    /// Substrings that turn a data query into an order count
    pub order_count_phrases: Vec<String>,
    #[serde(default)]
    pub small_talk: Vec<SmallTalkRule>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            currency_symbol: "¥".to_string(),
            order_count_phrases: vec![
                "order".to_string(),
                "订单".to_string(),
                "卖了多少笔".to_string(),
            ],
            small_talk: vec![
                SmallTalkRule::exact("你好", GREETING_REPLY),
                SmallTalkRule::exact("hello", GREETING_REPLY),
                SmallTalkRule {
                    phrase: "不是哥们".to_string(),
                    reply: "Oops, never mind the details! Let's talk about the sales data instead ~ O(∩_∩)O"
                        .to_string(),
                    match_mode: PhraseMatch::Contains,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}

/// Load configuration following the search order above.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        tracing::info!("Loading config from: {}", path.display());
        return load_config_from(path);
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if local.exists() {
        tracing::info!("Loading config from: {}", local.display());
        return load_config_from(local);
    }

    tracing::info!("Using built-in default configuration");
    Ok(Config::default())
}
