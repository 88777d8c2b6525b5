//! Configuration types for edelstein-assets

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::AssetPlatform;

/// Current configuration format version
pub const CONFIG_VERSION: u32 = 1;

/// Release scheme used to address the asset CDN
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadScheme {
    /// Direct single-region scheme: `{platform}/{hash}/...`
    #[default]
    Jp,
    /// Multi-language CDN scheme: `{platform}/{language}/{hash}/...`
    Global,
}

impl DownloadScheme {
    /// Default asset CDN host for this scheme
    pub fn default_assets_host(&self) -> &'static str {
        match self {
            DownloadScheme::Jp => "lovelive-schoolidolfestival2-assets.akamaized.net",
            DownloadScheme::Global => "img-sif2.lovelive-sif2.com",
        }
    }

    /// Default game API host for this scheme
    pub fn default_api_host(&self) -> &'static str {
        match self {
            DownloadScheme::Jp => "api.app.lovelive-sif2.bushimo.jp",
            DownloadScheme::Global => "api-sif2.lovelive-sif2.com",
        }
    }
}

/// Which platforms a run covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSelection {
    /// Include Android assets (default: true)
    #[serde(default = "default_true")]
    pub android: bool,

    /// Include iOS assets (default: true)
    #[serde(default = "default_true")]
    pub ios: bool,
}

impl Default for PlatformSelection {
    fn default() -> Self {
        Self {
            android: true,
            ios: true,
        }
    }
}

impl PlatformSelection {
    /// Selected platforms in processing order
    pub fn selected(&self) -> Vec<AssetPlatform> {
        AssetPlatform::ALL
            .into_iter()
            .filter(|p| match p {
                AssetPlatform::Android => self.android,
                AssetPlatform::Ios => self.ios,
            })
            .collect()
    }
}

/// Default operator recovery behavior for failed fetches
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryMode {
    /// Ask on the console for every failure incident
    #[default]
    Prompt,
    /// Record failures and keep going without asking
    Skip,
    /// Stop admitting work on the first failure
    Abort,
}

/// Restructure pass settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestructureConfig {
    /// Platform (and language) directory of a downloaded tree (default: "./assets")
    #[serde(default = "default_download_dir")]
    pub input_dir: PathBuf,

    /// Root of the human-readable tree (default: "./assets-restructured")
    #[serde(default = "default_restructured_dir")]
    pub output_dir: PathBuf,

    /// Write `.sourcename` provenance sidecars (default: true)
    #[serde(default = "default_true")]
    pub write_sourcenames: bool,
}

impl Default for RestructureConfig {
    fn default() -> Self {
        Self {
            input_dir: default_download_dir(),
            output_dir: default_restructured_dir(),
            write_sourcenames: true,
        }
    }
}

/// Main configuration for a synchronization run
///
/// One versioned struct replaces per-command option sets. Every field has a
/// default so an empty JSON object deserializes to a usable configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration format version (must equal [`CONFIG_VERSION`])
    #[serde(default = "default_version")]
    pub version: u32,

    /// Release scheme (default: jp)
    #[serde(default)]
    pub scheme: DownloadScheme,

    /// Asset CDN host override
    #[serde(default)]
    pub assets_host: Option<String>,

    /// Game API host override
    #[serde(default)]
    pub api_host: Option<String>,

    /// Use plain HTTP instead of HTTPS (default: false)
    #[serde(default)]
    pub plain_http: bool,

    /// Languages to synchronize under the global scheme (default: EN, ZH, KR)
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Where extracted manifest payloads and dumps go (default: "./manifests")
    #[serde(default = "default_manifests_dir")]
    pub manifests_dir: PathBuf,

    /// Root of the hash-addressed download tree (default: "./assets")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrently admitted fetches (default: 10)
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,

    /// Platforms to include
    #[serde(default)]
    pub platforms: PlatformSelection,

    /// Dump decoded manifests as JSON next to the payloads (default: true)
    #[serde(default = "default_true")]
    pub dump_manifest_json: bool,

    /// Recovery behavior on fetch failures (default: prompt)
    #[serde(default)]
    pub recovery: RecoveryMode,

    /// Restructure pass settings
    #[serde(default)]
    pub restructure: RestructureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            scheme: DownloadScheme::default(),
            assets_host: None,
            api_host: None,
            plain_http: false,
            languages: default_languages(),
            manifests_dir: default_manifests_dir(),
            download_dir: default_download_dir(),
            parallel_downloads: default_parallel_downloads(),
            platforms: PlatformSelection::default(),
            dump_manifest_json: true,
            recovery: RecoveryMode::default(),
            restructure: RestructureConfig::default(),
        }
    }
}

impl Config {
    /// Check the configuration for values a run cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(config_error(
                format!(
                    "unsupported configuration version {} (expected {})",
                    self.version, CONFIG_VERSION
                ),
                "version",
            ));
        }

        if self.parallel_downloads == 0 {
            return Err(config_error(
                "parallel_downloads must be at least 1",
                "parallel_downloads",
            ));
        }

        if self.platforms.selected().is_empty() {
            return Err(config_error(
                "at least one platform must be selected",
                "platforms",
            ));
        }

        if self.scheme == DownloadScheme::Global {
            if self.languages.is_empty() {
                return Err(config_error(
                    "the global scheme needs at least one language",
                    "languages",
                ));
            }
            if let Some(bad) = self
                .languages
                .iter()
                .find(|l| l.is_empty() || l.contains(['/', '\\']))
            {
                return Err(config_error(
                    format!("invalid language segment {:?}", bad),
                    "languages",
                ));
            }
        }

        for (key, host) in [("assets_host", &self.assets_host), ("api_host", &self.api_host)] {
            if let Some(host) = host
                && (host.is_empty() || host.contains("://"))
            {
                return Err(config_error(
                    format!("{} must be a bare host, got {:?}", key, host),
                    key,
                ));
            }
        }

        Ok(())
    }

    /// Base URL of the asset CDN, e.g. `https://img-sif2.lovelive-sif2.com`
    pub fn assets_base_url(&self) -> String {
        let host = self
            .assets_host
            .as_deref()
            .unwrap_or_else(|| self.scheme.default_assets_host());
        format!("{}://{}", self.url_scheme(), host)
    }

    /// Base URL of the game API
    pub fn api_base_url(&self) -> String {
        let host = self
            .api_host
            .as_deref()
            .unwrap_or_else(|| self.scheme.default_api_host());
        format!("{}://{}", self.url_scheme(), host)
    }

    /// Language segments a run iterates over (`[None]` for the direct scheme)
    pub fn language_runs(&self) -> Vec<Option<String>> {
        match self.scheme {
            DownloadScheme::Jp => vec![None],
            DownloadScheme::Global => self.languages.iter().cloned().map(Some).collect(),
        }
    }

    fn url_scheme(&self) -> &'static str {
        if self.plain_http { "http" } else { "https" }
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["EN".to_string(), "ZH".to_string(), "KR".to_string()]
}

fn default_manifests_dir() -> PathBuf {
    PathBuf::from("./manifests")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./assets")
}

fn default_restructured_dir() -> PathBuf {
    PathBuf::from("./assets-restructured")
}

fn default_parallel_downloads() -> usize {
    10
}
