//! # edelstein-assets
//!
//! Manifest-driven synchronization of a game's content-addressed asset CDN.
//!
//! A run asks the game API for the current content hash of each platform,
//! downloads and decodes the bundle, sound and movie manifests published
//! under that hash, plans every remote object they imply and fetches them
//! under bounded concurrency. A separate restructure pass turns the
//! hash-addressed tree into a readable one, merging split `.ppart`/`.spart`
//! files on the way.
//!
//! ## Design
//!
//! - **Library-first** - no CLI; progress is published as [`Event`]s
//! - **Pluggable collaborators** - ciphers, the asset-bundle container reader,
//!   the manifest decoder and the recovery policy are traits
//! - **Operator-driven recovery** - a failed fetch halts admission of new
//!   fetches until a [`RecoveryPolicy`] decides to skip, retry or abort
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use edelstein_assets::{AssetSynchronizer, Collaborators, Config, ContainerReader, TextAsset};
//!
//! struct MyBundleReader;
//!
//! impl ContainerReader for MyBundleReader {
//!     fn read_text_assets(&self, path: &Path) -> edelstein_assets::Result<Vec<TextAsset>> {
//!         unimplemented!("read TextAssets out of {}", path.display())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sync = AssetSynchronizer::new(
//!         Config::default(),
//!         Collaborators::plaintext(Arc::new(MyBundleReader)),
//!     )?;
//!
//!     let mut events = sync.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = sync.run().await?;
//!     println!("{} files failed", report.failed().len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cipher seams
pub mod cipher;
/// Configuration types
pub mod config;
/// Concurrent locator downloads with pause-on-error recovery
pub mod downloader;
/// Error types
pub mod error;
/// Manifest container download and extraction
pub mod fetcher;
/// Asset-hash handshake
pub mod handshake;
/// Manifest entries and decoding
pub mod manifest;
/// Split-file reassembly
pub mod merger;
/// Locator planning
pub mod planner;
/// Readable-tree restructuring
pub mod restructure;
/// End-to-end synchronization
pub mod sync;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use cipher::{ManifestCipher, PayloadCipher, PlaintextCipher};
pub use config::{Config, DownloadScheme, PlatformSelection, RecoveryMode, RestructureConfig};
pub use downloader::{
    ConcurrentDownloader, ConsolePrompt, DownloadReport, FailureIncident, FixedDecision,
    HttpLocatorFetcher, LocatorFetcher, RecoveryDecision, RecoveryPolicy,
};
pub use error::{Error, Result};
pub use fetcher::{ManifestFetcher, ManifestFetcherParams};
pub use handshake::ManifestHashClient;
pub use manifest::{
    BundleEntry, ContainerReader, JsonManifestCodec, Manifest, ManifestDecoder, ManifestEntries,
    ManifestSet, MovieEntry, SoundEntry, TextAsset,
};
pub use merger::PartMerger;
pub use planner::{AssetExtension, AssetFile, PartSuffix, RemoteLocator, UriPlanner};
pub use restructure::{RestructureReport, Restructurer};
pub use sync::{AssetSynchronizer, Collaborators, PlatformRun, SyncReport};
pub use types::{AssetPlatform, Event, ManifestKind};

/// Run a synchronization, stopping early on a termination signal.
///
/// Returns `Ok(None)` if a signal arrived first. Partially written files are
/// left behind; the next run downloads everything again.
///
/// - **Unix:** listens for SIGTERM and SIGINT
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`
pub async fn run_with_shutdown(sync: &AssetSynchronizer) -> Result<Option<SyncReport>> {
    run_until(sync, wait_for_signal()).await
}

/// Run a synchronization until it finishes or `shutdown` resolves.
///
/// Returns `Ok(None)` if `shutdown` resolved first; the run is dropped at
/// its current await point.
pub async fn run_until<F>(sync: &AssetSynchronizer, shutdown: F) -> Result<Option<SyncReport>>
where
    F: std::future::Future<Output = ()>,
{
    tokio::select! {
        report = sync.run() => report.map(Some),
        _ = shutdown => {
            tracing::warn!("synchronization interrupted");
            Ok(None)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            ctrl_c().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
    tracing::info!("Received Ctrl+C signal");
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}
