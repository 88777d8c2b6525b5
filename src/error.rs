//! Error types for edelstein-assets
//!
//! Every failure the synchronization pipeline can produce is a variant of [`Error`].
//! Only [`Error::LocatorFetch`] is recoverable: the downloader contains it and hands
//! it to a [`RecoveryPolicy`](crate::downloader::RecoveryPolicy). Everything else
//! unwinds to the caller and ends the run.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ManifestKind;

/// Result type alias for edelstein-assets operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for edelstein-assets
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "parallel_downloads")
        key: Option<String>,
    },

    /// The encrypted asset-hash handshake failed (transport, crypto or envelope)
    #[error("asset hash handshake failed: {0}")]
    Handshake(String),

    /// A manifest payload was absent from the manifest container
    #[error("{kind} manifest was not found in the manifest container")]
    MissingManifest {
        /// Which of the three manifests is missing
        kind: ManifestKind,
    },

    /// A manifest payload could not be decrypted or deserialized
    #[error("failed to decode {kind} manifest: {reason}")]
    ManifestDecode {
        /// Which manifest failed to decode
        kind: ManifestKind,
        /// Underlying decoder message
        reason: String,
    },

    /// A single remote object could not be fetched
    #[error("failed to fetch {url}: {reason}")]
    LocatorFetch {
        /// The locator URL
        url: String,
        /// HTTP status or transport error description
        reason: String,
    },

    /// The secondary part stream had a byte but the primary stream was exhausted
    #[error(
        "part streams are mismatched: secondary byte {chunk} has no primary chunk \
         ({primary_bytes_read} primary bytes consumed)"
    )]
    MergeIntegrity {
        /// Zero-based index of the secondary byte that had no primary chunk
        chunk: u64,
        /// Primary bytes consumed before the mismatch was detected
        primary_bytes_read: u64,
    },

    /// A local file operation failed
    #[error("file system error at {}: {source}", path.display())]
    FileSystem {
        /// The path involved in the failed operation
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The operator chose to abort the download run
    #[error("download aborted by operator: {failed} failed, {remaining} not started")]
    Aborted {
        /// Number of locators recorded as failed before the abort
        failed: usize,
        /// Number of locators that were never admitted
        remaining: usize,
    },

    /// A locator URL could not be built from its parts
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a [`Error::FileSystem`] from a path and an I/O error
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must terminate the run
    ///
    /// Per-locator fetch failures are contained by the downloader's recovery
    /// protocol; every other error is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::LocatorFetch { .. })
    }
}
