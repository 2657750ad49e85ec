//! Application configuration for the campaign migrator.
//!
//! User config lives at `~/.campaign-migrator/migrator.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{MigratorError, Result};
use crate::types::SegmentRef;

/// Source segment id → target segment it migrates to.
pub type SegmentMap = BTreeMap<String, SegmentRef>;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "migrator.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".campaign-migrator";

/// Browser-like user agent sent when fetching source assets.
pub const DEFAULT_ASSET_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ---------------------------------------------------------------------------
// Config structs (matching migrator.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Asset re-hosting settings.
    #[serde(default)]
    pub assets: AssetsConfig,

    /// Source read API settings.
    #[serde(default)]
    pub source: SourceConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// IANA timezone name every schedule is emitted in.
    #[serde(default = "default_timezone_name")]
    pub timezone_name: String,

    /// UTC offset label paired with the timezone name in target payloads.
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset: String,

    /// Pause before each target write, in milliseconds.
    #[serde(default = "default_api_delay_ms")]
    pub api_delay_ms: u64,

    /// Source segments with a known target counterpart, keyed by source id.
    /// Unlisted segments fall back to all users.
    #[serde(default)]
    pub segment_map: SegmentMap,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timezone_name: default_timezone_name(),
            timezone_offset: default_timezone_offset(),
            api_delay_ms: default_api_delay_ms(),
            segment_map: SegmentMap::new(),
        }
    }
}

fn default_timezone_name() -> String {
    "Asia/Kolkata".into()
}
fn default_timezone_offset() -> String {
    "+0530".into()
}
fn default_api_delay_ms() -> u64 {
    500
}

/// `[assets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Timeout for each asset download.
    #[serde(default = "default_asset_timeout")]
    pub fetch_timeout_secs: u64,

    /// Timeout for each asset upload.
    #[serde(default = "default_asset_timeout")]
    pub upload_timeout_secs: u64,

    /// User agent for asset downloads.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional regex patterns for source-CDN URLs, appended to the built-in rules.
    #[serde(default)]
    pub extra_domain_patterns: Vec<String>,

    /// File extensions that mark a URL as an image.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_asset_timeout(),
            upload_timeout_secs: default_asset_timeout(),
            user_agent: default_user_agent(),
            extra_domain_patterns: Vec::new(),
            image_extensions: default_image_extensions(),
        }
    }
}

fn default_asset_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    DEFAULT_ASSET_USER_AGENT.into()
}
fn default_image_extensions() -> Vec<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".bmp", ".ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Items requested per campaign list page.
    #[serde(default = "default_campaign_page_size")]
    pub campaign_page_size: u32,

    /// Items requested per content-block list page.
    #[serde(default = "default_block_page_size")]
    pub content_block_page_size: u32,

    /// Pause between list pages, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Timeout for each source request.
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            campaign_page_size: default_campaign_page_size(),
            content_block_page_size: default_block_page_size(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_campaign_page_size() -> u32 {
    250
}
fn default_block_page_size() -> u32 {
    100
}
fn default_page_delay_ms() -> u64 {
    100
}
fn default_source_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Asset pipeline settings resolved for one run.
#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub fetch_timeout: Duration,
    pub upload_timeout: Duration,
    pub user_agent: String,
    pub extra_domain_patterns: Vec<String>,
    pub image_extensions: Vec<String>,
}

impl From<&AssetsConfig> for AssetSettings {
    fn from(config: &AssetsConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
            user_agent: config.user_agent.clone(),
            extra_domain_patterns: config.extra_domain_patterns.clone(),
            image_extensions: config.image_extensions.clone(),
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self::from(&AssetsConfig::default())
    }
}

/// Configuration handed explicitly to every migration call.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Zone schedules are interpreted and re-emitted in.
    pub timezone: Tz,
    /// Offset label paired with the zone name in target payloads.
    pub timezone_offset: String,
    /// Pause before each target write.
    pub api_delay: Duration,
    /// Asset pipeline settings.
    pub assets: AssetSettings,
    /// Source → target segment mapping for audiences.
    pub segment_map: SegmentMap,
}

impl MigrationConfig {
    /// The configured zone's IANA name.
    pub fn timezone_name(&self) -> &str {
        self.timezone.name()
    }
}

impl TryFrom<&AppConfig> for MigrationConfig {
    type Error = MigratorError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            timezone: parse_timezone(&config.defaults.timezone_name)?,
            timezone_offset: config.defaults.timezone_offset.clone(),
            api_delay: Duration::from_millis(config.defaults.api_delay_ms),
            assets: AssetSettings::from(&config.assets),
            segment_map: config.defaults.segment_map.clone(),
        })
    }
}

/// Source read settings resolved for one run.
#[derive(Debug, Clone)]
pub struct SourceReadConfig {
    pub campaign_page_size: u32,
    pub content_block_page_size: u32,
    pub page_delay: Duration,
    pub timeout: Duration,
}

impl SourceReadConfig {
    /// Page sizes must be at least 1 or pagination never advances.
    pub fn validate(&self) -> Result<()> {
        for (key, size) in [
            ("campaign_page_size", self.campaign_page_size),
            ("content_block_page_size", self.content_block_page_size),
        ] {
            if size == 0 {
                return Err(MigratorError::config(format!(
                    "[source] {key} must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<&AppConfig> for SourceReadConfig {
    type Error = MigratorError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let resolved = Self {
            campaign_page_size: config.source.campaign_page_size,
            content_block_page_size: config.source.content_block_page_size,
            page_delay: Duration::from_millis(config.source.page_delay_ms),
            timeout: Duration::from_secs(config.source.timeout_secs),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

/// Parse an IANA zone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| MigratorError::config(format!("unknown timezone '{name}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.campaign-migrator/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MigratorError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.campaign-migrator/migrator.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MigratorError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| MigratorError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MigratorError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| MigratorError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MigratorError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(toml_str.contains("timezone_name"));
        assert!(toml_str.contains("Asia/Kolkata"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
timezone_name = "America/New_York"

[assets]
extra_domain_patterns = ['https://media\.example-source\.net/[^"\s,]+']
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.timezone_name, "America/New_York");
        assert_eq!(config.defaults.api_delay_ms, 500);
        assert_eq!(config.assets.extra_domain_patterns.len(), 1);
        assert_eq!(config.assets.fetch_timeout_secs, 30);
        assert_eq!(config.source.campaign_page_size, 250);
    }

    #[test]
    fn segment_map_reads_from_defaults() {
        let toml_str = r#"
[defaults.segment_map]
"5f1c2a" = { id = "moe_vip", name = "VIP" }
"#;
        let app: AppConfig = toml::from_str(toml_str).expect("parse");
        let config = MigrationConfig::try_from(&app).expect("resolve");
        assert_eq!(config.segment_map.len(), 1);
        assert_eq!(config.segment_map["5f1c2a"].id, "moe_vip");
        assert_eq!(config.segment_map["5f1c2a"].name, "VIP");
    }

    #[test]
    fn migration_config_from_app_config() {
        let app = AppConfig::default();
        let config = MigrationConfig::try_from(&app).expect("resolve");
        assert_eq!(config.timezone_name(), "Asia/Kolkata");
        assert_eq!(config.api_delay, Duration::from_millis(500));
        assert_eq!(config.assets.fetch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_page_size_is_config_error() {
        let mut app = AppConfig::default();
        app.source.content_block_page_size = 0;
        let err = SourceReadConfig::try_from(&app).unwrap_err();
        assert!(matches!(err, MigratorError::Config { .. }));
        assert!(err.to_string().contains("content_block_page_size"));

        app.source.content_block_page_size = 100;
        let config = SourceReadConfig::try_from(&app).expect("resolve");
        assert_eq!(config.campaign_page_size, 250);
    }

    #[test]
    fn unknown_timezone_is_config_error() {
        let mut app = AppConfig::default();
        app.defaults.timezone_name = "Mars/Olympus_Mons".into();
        let err = MigrationConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("unknown timezone"));
    }
}
