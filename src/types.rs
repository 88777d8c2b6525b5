//! Core types for edelstein-assets

use serde::{Deserialize, Serialize};

use crate::downloader::RecoveryDecision;

/// Platform an asset set is built for
///
/// A platform has two independent string projections that are not
/// interchangeable: the token sent in the handshake header and the
/// segment used in asset URLs and local paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetPlatform {
    /// Android build
    Android,
    /// iOS build
    Ios,
}

impl AssetPlatform {
    /// All platforms in processing order
    pub const ALL: [AssetPlatform; 2] = [AssetPlatform::Android, AssetPlatform::Ios];

    /// Token for the `Aoharu-Platform` handshake header
    pub fn player_token(&self) -> &'static str {
        match self {
            AssetPlatform::Android => "Android",
            AssetPlatform::Ios => "IPhonePlayer",
        }
    }

    /// Segment used in asset URLs and the local hash-addressed layout
    pub fn path_segment(&self) -> &'static str {
        match self {
            AssetPlatform::Android => "Android",
            AssetPlatform::Ios => "iOS",
        }
    }
}

impl std::fmt::Display for AssetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// The three manifests shipped inside a manifest container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestKind {
    /// Unity asset bundles
    Bundle,
    /// CRI sound banks
    Sound,
    /// CRI movies
    Movie,
}

impl ManifestKind {
    /// All kinds in planning order
    pub const ALL: [ManifestKind; 3] = [ManifestKind::Bundle, ManifestKind::Sound, ManifestKind::Movie];

    /// Name of the text asset carrying this manifest inside the container
    pub fn asset_name(&self) -> &'static str {
        match self {
            ManifestKind::Bundle => "Bundle",
            ManifestKind::Sound => "Sound",
            ManifestKind::Movie => "Movie",
        }
    }

    /// Top-level directory of this kind in the restructured tree
    pub fn restructured_dir(&self) -> &'static str {
        match self {
            ManifestKind::Bundle => "Bundles",
            ManifestKind::Sound => "Sounds",
            ManifestKind::Movie => "Movies",
        }
    }

    /// Look up a kind by its container asset name
    pub fn from_asset_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.asset_name() == name)
    }
}

impl std::fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.asset_name())
    }
}

/// Progress and recovery events emitted while synchronizing
///
/// Subscribe with [`ConcurrentDownloader::subscribe`](crate::ConcurrentDownloader::subscribe)
/// or [`AssetSynchronizer::subscribe`](crate::AssetSynchronizer::subscribe).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A locator was admitted and its fetch started
    LocatorStarted {
        /// Locator URL
        url: String,
    },

    /// Bytes were copied for an in-flight locator
    LocatorProgress {
        /// Locator URL
        url: String,
        /// Bytes copied so far
        bytes: u64,
        /// Fraction of the declared length copied (None when the length is unknown)
        fraction: Option<f64>,
    },

    /// A locator finished, successfully or as a recorded failure
    LocatorCompleted {
        /// Locator URL
        url: String,
        /// Whether the fetch succeeded
        success: bool,
        /// Locators completed so far in this run
        completed: usize,
        /// Locators in this run
        total: usize,
    },

    /// A locator fetch failed
    LocatorFailed {
        /// Locator URL
        url: String,
        /// Error description
        error: String,
    },

    /// Admission of new fetches was halted by a failure incident
    Paused {
        /// Locator whose failure opened the incident
        url: String,
    },

    /// The operator resolved a failure incident
    Resumed {
        /// The decision that resolved the incident
        decision: RecoveryDecision,
    },

    /// A manifest entry was moved into the restructured tree
    Restructured {
        /// Logical identifier of the entry
        identifier: String,
        /// Entries restructured so far
        completed: usize,
        /// Entries to restructure
        total: usize,
    },
}
