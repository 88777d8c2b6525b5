//! End-to-end synchronization run
//!
//! ```text
//! for each platform:          ManifestHashClient  -> hashes.txt
//! for each language (or once):
//!   for each platform:        ManifestFetcher -> UriPlanner -> ConcurrentDownloader
//! ```
//!
//! Platforms and languages run one after another; only the per-locator
//! fetches of a single run overlap.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::cipher::{ManifestCipher, PayloadCipher, PlaintextCipher};
use crate::config::Config;
use crate::downloader::{
    ConcurrentDownloader, DownloadReport, HttpLocatorFetcher, LocatorFetcher, RecoveryPolicy,
    policy_for,
};
use crate::error::{Error, Result};
use crate::fetcher::{ManifestFetcher, ManifestFetcherParams, find_container};
use crate::handshake::ManifestHashClient;
use crate::manifest::{ContainerReader, JsonManifestCodec, ManifestDecoder};
use crate::planner::UriPlanner;
use crate::restructure::{RestructureReport, Restructurer};
use crate::types::{AssetPlatform, Event};

/// File listing the content hash of every synchronized platform
pub const HASHES_FILE: &str = "hashes.txt";

/// External collaborators a synchronizer depends on
pub struct Collaborators {
    /// Handshake payload cipher
    pub payload_cipher: Arc<dyn PayloadCipher>,
    /// Manifest payload cipher
    pub manifest_cipher: Arc<dyn ManifestCipher>,
    /// Asset-bundle container reader
    pub container: Arc<dyn ContainerReader>,
    /// Manifest payload decoder
    pub decoder: Arc<dyn ManifestDecoder>,
    /// Recovery policy; `None` uses the one selected by `Config::recovery`
    pub recovery: Option<Arc<dyn RecoveryPolicy>>,
    /// Locator fetcher; `None` uses HTTP with the synchronizer's client
    pub fetcher: Option<Arc<dyn LocatorFetcher>>,
}

impl Collaborators {
    /// Collaborators for unencrypted JSON manifests read through `container`
    pub fn plaintext(container: Arc<dyn ContainerReader>) -> Self {
        Self {
            payload_cipher: Arc::new(PlaintextCipher),
            manifest_cipher: Arc::new(PlaintextCipher),
            container,
            decoder: Arc::new(JsonManifestCodec),
            recovery: None,
            fetcher: None,
        }
    }
}

/// Result of one platform (and language) download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformRun {
    /// Platform
    pub platform: AssetPlatform,
    /// Language segment, if any
    pub language: Option<String>,
    /// Content hash used
    pub hash: String,
    /// Download outcome
    pub report: DownloadReport,
}

/// Result of [`AssetSynchronizer::run`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// One entry per platform and language, in processing order
    pub runs: Vec<PlatformRun>,
}

impl SyncReport {
    /// URLs recorded as failed across all runs
    pub fn failed(&self) -> Vec<&str> {
        self.runs
            .iter()
            .flat_map(|r| r.report.failed.iter().map(String::as_str))
            .collect()
    }
}

/// Drives handshake, manifest fetch, planning and download for every selected platform
pub struct AssetSynchronizer {
    config: Arc<Config>,
    hash_client: ManifestHashClient,
    manifests: ManifestFetcher,
    planner: UriPlanner,
    downloader: ConcurrentDownloader,
    event_tx: broadcast::Sender<Event>,
}

impl AssetSynchronizer {
    /// Create a synchronizer
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` fails validation and
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("edelstein-assets/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let planner = UriPlanner::new(&config.assets_base_url())?;
        let fetcher = collaborators
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpLocatorFetcher::new(http.clone())));
        let policy = collaborators
            .recovery
            .unwrap_or_else(|| policy_for(config.recovery));

        // Capacity covers a burst of progress events between subscriber polls
        let (event_tx, _rx) = broadcast::channel(1000);

        let hash_client =
            ManifestHashClient::new(http, &config.api_base_url(), collaborators.payload_cipher);
        let manifests = ManifestFetcher::new(ManifestFetcherParams {
            fetcher: fetcher.clone(),
            planner: planner.clone(),
            container: collaborators.container,
            cipher: collaborators.manifest_cipher,
            decoder: collaborators.decoder,
            download_dir: config.download_dir.clone(),
            manifests_dir: config.manifests_dir.clone(),
            dump_json: config.dump_manifest_json,
        });
        let downloader = ConcurrentDownloader::new(fetcher, policy, config.parallel_downloads)
            .with_event_sender(event_tx.clone());

        Ok(Self {
            config: Arc::new(config),
            hash_client,
            manifests,
            planner,
            downloader,
            event_tx,
        })
    }

    /// Subscribe to download and restructure events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Synchronize every selected platform (and language)
    ///
    /// Fatal errors end the run; failed locators are handled by the recovery
    /// policy and listed in the report.
    pub async fn run(&self) -> Result<SyncReport> {
        let mut hashes = Vec::new();
        for platform in self.config.platforms.selected() {
            let hash = self.hash_client.retrieve_hash(platform).await?;
            hashes.push((platform, hash));
        }
        self.write_hashes(&hashes).await?;

        let mut report = SyncReport::default();
        for language in self.config.language_runs() {
            if let Some(language) = &language {
                tracing::info!(language = %language, "processing language");
            }
            for (platform, hash) in &hashes {
                let manifests = self
                    .manifests
                    .fetch(*platform, language.as_deref(), hash)
                    .await?;
                let locators = self
                    .planner
                    .plan(*platform, language.as_deref(), &manifests)?;

                tracing::info!(
                    platform = %platform,
                    locators = locators.len(),
                    "starting asset download"
                );
                let download = self
                    .downloader
                    .run(locators, &self.config.download_dir)
                    .await?;

                report.runs.push(PlatformRun {
                    platform: *platform,
                    language: language.clone(),
                    hash: hash.clone(),
                    report: download,
                });
            }
        }

        tracing::info!(
            runs = report.runs.len(),
            failed = report.failed().len(),
            "synchronization complete"
        );
        Ok(report)
    }

    /// Restructure the tree at `restructure.input_dir` into `restructure.output_dir`
    ///
    /// Manifests are read from the first `manifest.unity3d` found below the input
    /// directory, which should therefore be a single platform (and language)
    /// directory of the download tree.
    pub async fn restructure(&self) -> Result<RestructureReport> {
        let settings = &self.config.restructure;
        let manifests = self.manifests.load_local(&settings.input_dir).await?;

        // the container sits at `{root}/{hash}/manifest.unity3d`
        let container = find_container(&settings.input_dir).await?;
        let source_root = container
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| settings.input_dir.clone());

        Restructurer::new(manifests)
            .with_event_sender(self.event_tx.clone())
            .restructure(
                &source_root,
                &settings.output_dir,
                settings.write_sourcenames,
            )
            .await
    }

    async fn write_hashes(&self, hashes: &[(AssetPlatform, String)]) -> Result<()> {
        let dir = &self.config.manifests_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::fs(dir, e))?;

        let path = dir.join(HASHES_FILE);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::fs(&path, e))?;
        for (platform, hash) in hashes {
            let line = format!("{} manifest hash is {}\n", platform.path_segment(), hash);
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| Error::fs(&path, e))?;
        }
        file.flush().await.map_err(|e| Error::fs(&path, e))?;
        Ok(())
    }
}
