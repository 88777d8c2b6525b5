//! Locator planning
//!
//! Expands decoded manifests into the physical files they imply. The
//! expansion ([`asset_files`]) is shared by [`UriPlanner`], which turns each
//! file into a [`RemoteLocator`], and by the restructure pass, which turns the
//! same files into source and target paths. Suffix and extension rules live
//! only here.
//!
//! Hashes, names and identifiers come from remote manifests. Every path and
//! URL builder accepts them only as plain path segments, so a manifest cannot
//! address anything outside the download or restructure root.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::ManifestSet;
use crate::types::{AssetPlatform, ManifestKind};

/// Physical file extension of a stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetExtension {
    /// Unity asset bundle
    Unity3d,
    /// CRI movie
    Usm,
    /// CRI sound bank
    Acb,
    /// CRI companion stream
    Awb,
}

impl AssetExtension {
    /// Extension without the leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetExtension::Unity3d => "unity3d",
            AssetExtension::Usm => "usm",
            AssetExtension::Acb => "acb",
            AssetExtension::Awb => "awb",
        }
    }
}

impl std::fmt::Display for AssetExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of a split object a locator addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartSuffix {
    /// The whole object
    None,
    /// Primary part (`.ppart`), carrying 1023 of every 1024 bytes
    Primary,
    /// Secondary part (`.spart`), carrying the remaining byte
    Secondary,
}

impl PartSuffix {
    /// Suffix appended after the extension, including the dot
    pub fn as_str(&self) -> &'static str {
        match self {
            PartSuffix::None => "",
            PartSuffix::Primary => ".ppart",
            PartSuffix::Secondary => ".spart",
        }
    }
}

/// One physical file implied by a manifest entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetFile {
    /// Manifest the entry came from
    pub kind: ManifestKind,
    /// Storage hash of the entry
    pub hash: String,
    /// Stored object name
    pub name: String,
    /// Logical identifier of the entry
    pub identifier: String,
    /// Physical extension
    pub extension: AssetExtension,
    /// Whether the file is delivered as a part pair
    pub split: bool,
    /// Whether this is the entry's main file (not a companion stream)
    pub is_primary: bool,
}

impl AssetFile {
    /// `{name}.{ext}{suffix}`
    pub fn file_name(&self, suffix: PartSuffix) -> String {
        format!("{}.{}{}", self.name, self.extension, suffix.as_str())
    }

    /// Part suffixes this file is delivered as, in download order
    pub fn parts(&self) -> &'static [PartSuffix] {
        if self.split {
            &[PartSuffix::Primary, PartSuffix::Secondary]
        } else {
            &[PartSuffix::None]
        }
    }

    /// `{hash}/{name}.{ext}{suffix}` relative to a platform (and language) directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if the hash or name is not a plain path segment.
    pub fn stored_path(&self, suffix: PartSuffix) -> Result<PathBuf> {
        checked_segment(&self.name, "name")?;
        Ok(PathBuf::from(checked_segment(&self.hash, "hash")?).join(self.file_name(suffix)))
    }

    /// `{Bundles|Sounds|Movies}/{identifier segments}.{ext}` in the restructured tree
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if the identifier is empty or has a
    /// segment such as `..` that would leave the kind directory.
    pub fn restructured_path(&self) -> Result<PathBuf> {
        let segments: Vec<&str> = self
            .identifier
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::InvalidLocator(format!(
                "{} entry {} has an empty identifier",
                self.kind.asset_name(),
                self.source_name()
            )));
        };

        let mut path = PathBuf::from(self.kind.restructured_dir());
        for segment in parents {
            path.push(checked_segment(segment, "identifier segment")?);
        }
        path.push(format!(
            "{}.{}",
            checked_segment(last, "identifier segment")?,
            self.extension
        ));
        Ok(path)
    }

    /// `{hash}/{name}`, the content of the provenance sidecar
    pub fn source_name(&self) -> String {
        format!("{}/{}", self.hash, self.name)
    }
}

/// Expand every entry of `manifests` into its physical files
///
/// Order: bundles, movies, sounds, each in manifest order. A sound entry
/// yields its `.acb` file and, when it declares a companion, an `.awb` file
/// that shares the entry's split flag.
pub fn asset_files(manifests: &ManifestSet) -> Vec<AssetFile> {
    let mut files = Vec::with_capacity(manifests.entry_count());

    for entry in &manifests.bundles.entries {
        files.push(AssetFile {
            kind: ManifestKind::Bundle,
            hash: entry.hash.clone(),
            name: entry.name.clone(),
            identifier: entry.identifier.clone(),
            extension: AssetExtension::Unity3d,
            split: false,
            is_primary: true,
        });
    }

    for entry in &manifests.movies.entries {
        files.push(AssetFile {
            kind: ManifestKind::Movie,
            hash: entry.hash.clone(),
            name: entry.name.clone(),
            identifier: entry.identifier.clone(),
            extension: AssetExtension::Usm,
            split: entry.enable_split,
            is_primary: true,
        });
    }

    for entry in &manifests.sounds.entries {
        let sound = AssetFile {
            kind: ManifestKind::Sound,
            hash: entry.hash.clone(),
            name: entry.name.clone(),
            identifier: entry.identifier.clone(),
            extension: AssetExtension::Acb,
            split: entry.enable_split,
            is_primary: true,
        };
        if entry.has_companion() {
            files.push(sound.clone());
            files.push(AssetFile {
                extension: AssetExtension::Awb,
                is_primary: false,
                ..sound
            });
        } else {
            files.push(sound);
        }
    }

    files
}

/// Accept `segment` only if it is a single normal path component
fn checked_segment<'a>(segment: &'a str, field: &str) -> Result<&'a str> {
    let mut components = Path::new(segment).components();
    let plain = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !segment.contains(['/', '\\']);
    if plain {
        Ok(segment)
    } else {
        Err(Error::InvalidLocator(format!(
            "{} {:?} is not a plain path segment",
            field, segment
        )))
    }
}

/// A remote object to fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocator {
    base: url::Url,
    /// Platform the object belongs to
    pub platform: AssetPlatform,
    /// Language segment (multi-language scheme only)
    pub language: Option<String>,
    /// Storage hash
    pub hash: String,
    /// Object name
    pub name: String,
    /// Physical extension
    pub extension: AssetExtension,
    /// Part of a split object, or [`PartSuffix::None`]
    pub suffix: PartSuffix,
}

impl RemoteLocator {
    /// Fully-qualified URL, each segment percent-encoded
    pub fn url(&self) -> String {
        let mut url = self.base.clone();
        // http(s) bases always have path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.push(self.platform.path_segment());
            if let Some(language) = &self.language {
                segments.push(language);
            }
            segments.push(&self.hash);
            segments.push(&self.file_name());
        }
        url.into()
    }

    /// `{name}.{ext}{suffix}`
    pub fn file_name(&self) -> String {
        format!("{}.{}{}", self.name, self.extension, self.suffix.as_str())
    }

    /// `{platform}/[{language}/]{hash}/{file}`, the local path below the download root
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if the language, hash or name is not a
    /// plain path segment.
    pub fn relative_path(&self) -> Result<PathBuf> {
        let mut path = PathBuf::from(self.platform.path_segment());
        if let Some(language) = &self.language {
            path.push(checked_segment(language, "language")?);
        }
        path.push(checked_segment(&self.hash, "hash")?);
        checked_segment(&self.name, "name")?;
        path.push(self.file_name());
        Ok(path)
    }
}

/// Turns manifests into the ordered list of locators to download
#[derive(Clone, Debug)]
pub struct UriPlanner {
    base: url::Url,
}

impl UriPlanner {
    /// Create a planner for an asset CDN base URL (e.g. `https://cdn.example`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if `assets_base` is not an absolute
    /// http(s) URL.
    pub fn new(assets_base: &str) -> Result<Self> {
        let parsed = url::Url::parse(assets_base)
            .map_err(|e| Error::InvalidLocator(format!("{}: {}", assets_base, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(Error::InvalidLocator(format!(
                "{} is not an http(s) base URL",
                assets_base
            )));
        }
        Ok(Self { base: parsed })
    }

    /// URL of the manifest container for a content hash
    pub fn manifest_locator(
        &self,
        platform: AssetPlatform,
        language: Option<&str>,
        hash: &str,
    ) -> RemoteLocator {
        RemoteLocator {
            base: self.base.clone(),
            platform,
            language: language.map(str::to_string),
            hash: hash.to_string(),
            name: crate::manifest::MANIFEST_NAME.to_string(),
            extension: AssetExtension::Unity3d,
            suffix: PartSuffix::None,
        }
    }

    /// Plan every locator implied by `manifests`
    ///
    /// Deterministic: identical input always yields the identical ordered list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if any locator would not map to a
    /// path below the download root; nothing is planned in that case.
    pub fn plan(
        &self,
        platform: AssetPlatform,
        language: Option<&str>,
        manifests: &ManifestSet,
    ) -> Result<Vec<RemoteLocator>> {
        let mut locators = Vec::new();
        for file in asset_files(manifests) {
            for suffix in file.parts() {
                let locator = RemoteLocator {
                    base: self.base.clone(),
                    platform,
                    language: language.map(str::to_string),
                    hash: file.hash.clone(),
                    name: file.name.clone(),
                    extension: file.extension,
                    suffix: *suffix,
                };
                locator.relative_path()?;
                locators.push(locator);
            }
        }

        tracing::debug!(
            platform = %platform,
            language = language.unwrap_or("-"),
            entries = manifests.entry_count(),
            locators = locators.len(),
            "planned locators"
        );

        Ok(locators)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BundleEntry, Manifest, MovieEntry, SoundEntry};

    fn sound(name: &str, split: bool, secondary: &str) -> SoundEntry {
        SoundEntry {
            hash: "cd34".to_string(),
            name: name.to_string(),
            identifier: format!("sound/{}", name),
            enable_split: split,
            secondary_hash: secondary.to_string(),
        }
    }

    fn movie(name: &str, split: bool) -> MovieEntry {
        MovieEntry {
            hash: "ef56".to_string(),
            name: name.to_string(),
            identifier: format!("movie/{}", name),
            enable_split: split,
        }
    }

    fn bundle_set() -> ManifestSet {
        ManifestSet {
            bundles: Manifest::new(vec![BundleEntry {
                hash: "ab12".to_string(),
                name: "char01".to_string(),
                identifier: "characters/char01".to_string(),
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_bundle_yields_one_locator() {
        let planner = UriPlanner::new("https://cdn.example").unwrap();
        let locators = planner.plan(AssetPlatform::Android, None, &bundle_set()).unwrap();

        assert_eq!(locators.len(), 1);
        assert_eq!(
            locators[0].url(),
            "https://cdn.example/Android/ab12/char01.unity3d"
        );
        assert_eq!(
            locators[0].relative_path().unwrap(),
            PathBuf::from("Android/ab12/char01.unity3d")
        );
    }

    #[test]
    fn test_split_sound_without_companion_yields_part_pair() {
        let planner = UriPlanner::new("https://cdn.example/").unwrap();
        let set = ManifestSet {
            sounds: Manifest::new(vec![sound("bgm01", true, "")]),
            ..Default::default()
        };

        let urls: Vec<String> = planner
            .plan(AssetPlatform::Android, None, &set)
            .unwrap()
            .iter()
            .map(RemoteLocator::url)
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://cdn.example/Android/cd34/bgm01.acb.ppart",
                "https://cdn.example/Android/cd34/bgm01.acb.spart",
            ]
        );
    }

    #[test]
    fn test_language_segment_and_ios_path() {
        let planner = UriPlanner::new("https://cdn.example").unwrap();
        let locators = planner.plan(AssetPlatform::Ios, Some("EN"), &bundle_set()).unwrap();

        assert_eq!(
            locators[0].url(),
            "https://cdn.example/iOS/EN/ab12/char01.unity3d"
        );
        assert_eq!(
            locators[0].relative_path().unwrap(),
            PathBuf::from("iOS/EN/ab12/char01.unity3d")
        );
    }

    #[test]
    fn test_locator_count_matches_split_rules() {
        let planner = UriPlanner::new("https://cdn.example").unwrap();
        let mut set = bundle_set();
        set.movies = Manifest::new(vec![movie("op", true), movie("ed", false)]);
        set.sounds = Manifest::new(vec![
            sound("a", true, "99aa"),
            sound("b", false, "99bb"),
            sound("c", false, ""),
        ]);

        // bundles 1, movies 2 + 1, sounds (2 + 2) + (1 + 1) + 1
        let locators = planner.plan(AssetPlatform::Android, None, &set).unwrap();
        assert_eq!(locators.len(), 11);

        let names: Vec<String> = locators.iter().map(RemoteLocator::file_name).collect();
        assert_eq!(
            names,
            vec![
                "char01.unity3d",
                "op.usm.ppart",
                "op.usm.spart",
                "ed.usm",
                "a.acb.ppart",
                "a.acb.spart",
                "a.awb.ppart",
                "a.awb.spart",
                "b.acb",
                "b.awb",
                "c.acb",
            ]
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = UriPlanner::new("https://cdn.example").unwrap();
        let mut set = bundle_set();
        set.sounds = Manifest::new(vec![sound("a", true, "99aa")]);

        let first = planner.plan(AssetPlatform::Ios, Some("KR"), &set).unwrap();
        let second = planner.plan(AssetPlatform::Ios, Some("KR"), &set).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_restructured_path_splits_identifier() {
        let files = asset_files(&bundle_set());
        assert_eq!(
            files[0].restructured_path().unwrap(),
            PathBuf::from("Bundles/characters/char01.unity3d")
        );
        assert_eq!(files[0].source_name(), "ab12/char01");
        assert_eq!(
            files[0].stored_path(PartSuffix::None).unwrap(),
            PathBuf::from("ab12/char01.unity3d")
        );
    }

    #[test]
    fn test_companion_file_is_not_primary() {
        let set = ManifestSet {
            sounds: Manifest::new(vec![sound("voice", false, "77cc")]),
            ..Default::default()
        };
        let files = asset_files(&set);
        assert_eq!(files.len(), 2);
        assert!(files[0].is_primary);
        assert_eq!(files[1].extension, AssetExtension::Awb);
        assert!(!files[1].is_primary);
        assert_eq!(
            files[1].restructured_path().unwrap(),
            PathBuf::from("Sounds/sound/voice.awb")
        );
    }

    #[test]
    fn test_manifest_locator() {
        let planner = UriPlanner::new("http://127.0.0.1:9000").unwrap();
        let locator = planner.manifest_locator(AssetPlatform::Android, Some("ZH"), "ff00");
        assert_eq!(
            locator.url(),
            "http://127.0.0.1:9000/Android/ZH/ff00/manifest.unity3d"
        );
    }

    fn bundle(hash: &str, name: &str, identifier: &str) -> ManifestSet {
        ManifestSet {
            bundles: Manifest::new(vec![BundleEntry {
                hash: hash.to_string(),
                name: name.to_string(),
                identifier: identifier.to_string(),
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_restructured_path_rejects_escaping_identifier() {
        for identifier in ["../../escaped", "characters/../../x", "./char01", "a\\..\\b", ""] {
            let files = asset_files(&bundle("ab12", "char01", identifier));
            assert!(
                matches!(files[0].restructured_path(), Err(Error::InvalidLocator(_))),
                "identifier {:?} was accepted",
                identifier
            );
        }
    }

    #[test]
    fn test_stored_path_rejects_traversal_in_hash_or_name() {
        let files = asset_files(&bundle("..", "char01", "characters/char01"));
        assert!(matches!(
            files[0].stored_path(PartSuffix::None),
            Err(Error::InvalidLocator(_))
        ));

        let files = asset_files(&bundle("ab12", "../char01", "characters/char01"));
        assert!(matches!(
            files[0].stored_path(PartSuffix::Primary),
            Err(Error::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_relative_path_rejects_traversal() {
        let planner = UriPlanner::new("https://cdn.example").unwrap();

        for (hash, name) in [("..", "char01"), ("ab12", "../../etc/passwd"), ("/abs", "x")] {
            let result = planner.plan(AssetPlatform::Android, None, &bundle(hash, name, "c/x"));
            assert!(
                matches!(result, Err(Error::InvalidLocator(_))),
                "{}/{} was accepted",
                hash,
                name
            );
        }

        let locator = planner.manifest_locator(AssetPlatform::Android, Some(".."), "ff00");
        assert!(locator.relative_path().is_err());
        let locator = planner.manifest_locator(AssetPlatform::Android, None, "../ff00");
        assert!(locator.relative_path().is_err());
    }

    #[test]
    fn test_url_segments_are_percent_encoded() {
        let planner = UriPlanner::new("https://cdn.example/").unwrap();
        let locators = planner
            .plan(AssetPlatform::Android, None, &bundle("ab12", "bgm 01#a?b", "c/x"))
            .unwrap();
        assert_eq!(
            locators[0].url(),
            "https://cdn.example/Android/ab12/bgm%2001%23a%3Fb.unity3d"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let planner = UriPlanner::new("https://cdn.example/assets/").unwrap();
        let locator = planner.manifest_locator(AssetPlatform::Ios, None, "ff00");
        assert_eq!(
            locator.url(),
            "https://cdn.example/assets/iOS/ff00/manifest.unity3d"
        );
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            UriPlanner::new("ftp://cdn.example"),
            Err(Error::InvalidLocator(_))
        ));
        assert!(UriPlanner::new("not a url").is_err());
    }
}
