//! Typed manifest entries

use serde::{Deserialize, Serialize};

use crate::types::ManifestKind;

/// One asset bundle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BundleEntry {
    /// Content hash directory the object is stored under
    pub hash: String,
    /// Object name (without extension)
    pub name: String,
    /// Slash-delimited logical path used for restructuring
    pub identifier: String,
}

/// One movie
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovieEntry {
    /// Content hash directory the object is stored under
    pub hash: String,
    /// Object name (without extension)
    pub name: String,
    /// Slash-delimited logical path used for restructuring
    pub identifier: String,
    /// Whether the object is delivered as a `.ppart`/`.spart` pair
    pub enable_split: bool,
}

/// One sound bank, optionally with a companion stream file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SoundEntry {
    /// Content hash directory the object is stored under
    pub hash: String,
    /// Object name (without extension)
    pub name: String,
    /// Slash-delimited logical path used for restructuring
    pub identifier: String,
    /// Whether the objects are delivered as `.ppart`/`.spart` pairs
    pub enable_split: bool,
    /// Hash of the companion stream; empty when there is none
    #[serde(rename = "AwbHash", alias = "SecondaryHash", default)]
    pub secondary_hash: String,
}

impl SoundEntry {
    /// Whether a companion stream object exists for this entry
    pub fn has_companion(&self) -> bool {
        !self.secondary_hash.is_empty()
    }
}

/// Ordered entries of one manifest kind
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest<T> {
    /// Entries in source order
    pub entries: Vec<T>,
}

impl<T> Manifest<T> {
    /// Wrap entries into a manifest
    pub fn new(entries: Vec<T>) -> Self {
        Self { entries }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Manifest<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

/// A decoded manifest, tagged with its kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestEntries {
    /// Decoded `Bundle` payload
    Bundle(Manifest<BundleEntry>),
    /// Decoded `Sound` payload
    Sound(Manifest<SoundEntry>),
    /// Decoded `Movie` payload
    Movie(Manifest<MovieEntry>),
}

impl ManifestEntries {
    /// Kind of the decoded manifest
    pub fn kind(&self) -> ManifestKind {
        match self {
            ManifestEntries::Bundle(_) => ManifestKind::Bundle,
            ManifestEntries::Sound(_) => ManifestKind::Sound,
            ManifestEntries::Movie(_) => ManifestKind::Movie,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            ManifestEntries::Bundle(m) => m.len(),
            ManifestEntries::Sound(m) => m.len(),
            ManifestEntries::Movie(m) => m.len(),
        }
    }

    /// Whether the manifest has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The three manifests of one platform (and language)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManifestSet {
    /// Bundle manifest
    pub bundles: Manifest<BundleEntry>,
    /// Sound manifest
    pub sounds: Manifest<SoundEntry>,
    /// Movie manifest
    pub movies: Manifest<MovieEntry>,
}

impl ManifestSet {
    /// Total number of entries across all kinds
    pub fn entry_count(&self) -> usize {
        self.bundles.len() + self.sounds.len() + self.movies.len()
    }

    /// Borrow one kind as a tagged value (cloned), e.g. for dumping
    pub fn entries_of(&self, kind: ManifestKind) -> ManifestEntries {
        match kind {
            ManifestKind::Bundle => ManifestEntries::Bundle(self.bundles.clone()),
            ManifestKind::Sound => ManifestEntries::Sound(self.sounds.clone()),
            ManifestKind::Movie => ManifestEntries::Movie(self.movies.clone()),
        }
    }

    /// Store a decoded manifest in its slot
    pub fn insert(&mut self, entries: ManifestEntries) {
        match entries {
            ManifestEntries::Bundle(m) => self.bundles = m,
            ManifestEntries::Sound(m) => self.sounds = m,
            ManifestEntries::Movie(m) => self.movies = m,
        }
    }
}
