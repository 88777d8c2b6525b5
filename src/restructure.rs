//! Restructuring a hash-addressed download tree into a readable hierarchy

use std::path::{Path, PathBuf};

use tokio::io::{BufReader, BufWriter};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::manifest::ManifestSet;
use crate::merger::PartMerger;
use crate::planner::{AssetFile, PartSuffix, asset_files};
use crate::types::Event;

/// Summary of a restructure pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestructureReport {
    /// Manifest entries processed
    pub entries: usize,
    /// Files copied as-is
    pub copied: usize,
    /// Files reassembled from part pairs
    pub merged: usize,
    /// Provenance sidecars written
    pub sourcenames: usize,
}

/// Copies and merges downloaded files into `{Bundles|Sounds|Movies}/{identifier}.{ext}`
pub struct Restructurer {
    manifests: ManifestSet,
    merger: PartMerger,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl Restructurer {
    /// Create a restructurer for the entries of `manifests`
    pub fn new(manifests: ManifestSet) -> Self {
        Self {
            manifests,
            merger: PartMerger,
            event_tx: None,
        }
    }

    /// Emit a [`Event::Restructured`] per entry on `event_tx`
    pub fn with_event_sender(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Restructure the tree at `source_root` into `dest_root`
    ///
    /// `source_root` is one platform (and language) directory of the download
    /// tree, holding `{hash}/{name}.{ext}` files. Existing targets are
    /// overwritten, so a repeated pass over the same input yields the same tree.
    ///
    /// # Errors
    ///
    /// A missing source file or any read/write failure ends the pass with
    /// [`Error::FileSystem`]; mismatched part files end it with
    /// [`Error::MergeIntegrity`]. An entry whose hash, name or identifier would
    /// leave `source_root` or `dest_root` ends it with [`Error::InvalidLocator`].
    pub async fn restructure(
        &self,
        source_root: &Path,
        dest_root: &Path,
        write_provenance: bool,
    ) -> Result<RestructureReport> {
        let files = asset_files(&self.manifests);
        let total = self.manifests.entry_count();
        let mut report = RestructureReport::default();

        tracing::info!(
            source = %source_root.display(),
            dest = %dest_root.display(),
            entries = total,
            "restructuring assets"
        );

        for (index, file) in files.iter().enumerate() {
            let target = dest_root.join(file.restructured_path()?);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::fs(parent, e))?;
            }

            if file.split {
                self.merge_parts(source_root, file, &target).await?;
                report.merged += 1;
            } else {
                let source = source_root.join(file.stored_path(PartSuffix::None)?);
                tokio::fs::copy(&source, &target)
                    .await
                    .map_err(|e| Error::fs(&source, e))?;
                report.copied += 1;
            }

            if write_provenance && file.is_primary {
                let sidecar = sourcename_path(&target);
                tokio::fs::write(&sidecar, file.source_name())
                    .await
                    .map_err(|e| Error::fs(&sidecar, e))?;
                report.sourcenames += 1;
            }

            // an entry is done once its companion stream (if any) is handled
            let entry_done = files.get(index + 1).is_none_or(|next| next.is_primary);
            if entry_done {
                report.entries += 1;
                tracing::trace!(identifier = %file.identifier, "restructured entry");
                if let Some(tx) = &self.event_tx {
                    tx.send(Event::Restructured {
                        identifier: file.identifier.clone(),
                        completed: report.entries,
                        total,
                    })
                    .ok();
                }
            }
        }

        tracing::info!(
            entries = report.entries,
            copied = report.copied,
            merged = report.merged,
            "restructure finished"
        );
        Ok(report)
    }

    async fn merge_parts(&self, source_root: &Path, file: &AssetFile, target: &Path) -> Result<()> {
        let primary_path = source_root.join(file.stored_path(PartSuffix::Primary)?);
        let secondary_path = source_root.join(file.stored_path(PartSuffix::Secondary)?);

        let primary = open(&primary_path).await?;
        let secondary = open(&secondary_path).await?;
        let output = tokio::fs::File::create(target)
            .await
            .map_err(|e| Error::fs(target, e))?;

        let mut primary = BufReader::new(primary);
        let mut secondary = BufReader::new(secondary);
        let mut output = BufWriter::new(output);

        let merged = self
            .merger
            .merge(&mut primary, &mut secondary, &mut output)
            .await;
        drop(output);

        let written = match merged {
            Ok(written) => written,
            Err(e) => {
                // no truncated target is left behind
                tokio::fs::remove_file(target).await.ok();
                return Err(match e {
                    Error::Io(source) => Error::fs(target, source),
                    other => other,
                });
            }
        };

        tracing::debug!(target = %target.display(), bytes = written, "merged part files");
        Ok(())
    }
}

async fn open(path: &Path) -> Result<tokio::fs::File> {
    tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::fs(path, e))
}

/// `{target}.sourcename`
fn sourcename_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".sourcename");
    PathBuf::from(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{BundleEntry, Manifest, MovieEntry, SoundEntry};

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn bundle_manifests() -> ManifestSet {
        ManifestSet {
            bundles: Manifest::new(vec![BundleEntry {
                hash: "ab12".to_string(),
                name: "char01".to_string(),
                identifier: "characters/char01".to_string(),
            }]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bundle_is_copied_with_sourcename() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(&src.path().join("ab12/char01.unity3d"), b"UnityFS bundle");

        let report = Restructurer::new(bundle_manifests())
            .restructure(src.path(), out.path(), true)
            .await
            .unwrap();

        let target = out.path().join("Bundles/characters/char01.unity3d");
        assert_eq!(std::fs::read(&target).unwrap(), b"UnityFS bundle");
        assert_eq!(
            std::fs::read_to_string(out.path().join("Bundles/characters/char01.unity3d.sourcename"))
                .unwrap(),
            "ab12/char01"
        );
        assert_eq!(report.entries, 1);
        assert_eq!(report.copied, 1);
        assert_eq!(report.sourcenames, 1);
    }

    #[tokio::test]
    async fn test_split_sound_is_merged() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        // 1023 primary bytes per secondary byte
        let primary: Vec<u8> = (0..1030).map(|i| (i % 200) as u8).collect();
        let secondary = vec![0xAA, 0xBB];
        write(&src.path().join("cd34/bgm01.acb.ppart"), &primary);
        write(&src.path().join("cd34/bgm01.acb.spart"), &secondary);

        let manifests = ManifestSet {
            sounds: Manifest::new(vec![SoundEntry {
                hash: "cd34".to_string(),
                name: "bgm01".to_string(),
                identifier: "bgm/bgm01".to_string(),
                enable_split: true,
                secondary_hash: String::new(),
            }]),
            ..Default::default()
        };

        let report = Restructurer::new(manifests)
            .restructure(src.path(), out.path(), false)
            .await
            .unwrap();

        let merged = std::fs::read(out.path().join("Sounds/bgm/bgm01.acb")).unwrap();
        let mut expected = primary[..1023].to_vec();
        expected.push(0xAA);
        expected.extend_from_slice(&primary[1023..]);
        expected.push(0xBB);
        assert_eq!(merged, expected);
        assert_eq!(report.merged, 1);
        assert!(!out.path().join("Sounds/bgm/bgm01.awb").exists());
        assert!(!out.path().join("Sounds/bgm/bgm01.acb.sourcename").exists());
    }

    #[tokio::test]
    async fn test_companion_stream_follows_entry_and_counts_once() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(&src.path().join("ee77/voice.acb"), b"acb");
        write(&src.path().join("ee77/voice.awb"), b"awb");
        write(&src.path().join("ef56/op.usm"), b"usm");

        let manifests = ManifestSet {
            sounds: Manifest::new(vec![SoundEntry {
                hash: "ee77".to_string(),
                name: "voice".to_string(),
                identifier: "voice/voice".to_string(),
                enable_split: false,
                secondary_hash: "ee88".to_string(),
            }]),
            movies: Manifest::new(vec![MovieEntry {
                hash: "ef56".to_string(),
                name: "op".to_string(),
                identifier: "op".to_string(),
                enable_split: false,
            }]),
            ..Default::default()
        };

        let (tx, mut rx) = broadcast::channel(16);
        let report = Restructurer::new(manifests)
            .with_event_sender(tx)
            .restructure(src.path(), out.path(), true)
            .await
            .unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.copied, 3);
        assert_eq!(report.sourcenames, 2);
        assert_eq!(std::fs::read(out.path().join("Sounds/voice/voice.awb")).unwrap(), b"awb");
        assert_eq!(std::fs::read(out.path().join("Movies/op.usm")).unwrap(), b"usm");
        assert!(!out.path().join("Sounds/voice/voice.awb.sourcename").exists());

        let mut completed = Vec::new();
        while let Ok(Event::Restructured { completed: c, total, .. }) = rx.try_recv() {
            assert_eq!(total, 2);
            completed.push(c);
        }
        assert_eq!(completed, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_rerun_produces_identical_files() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(&src.path().join("ab12/char01.unity3d"), b"same bytes");
        let restructurer = Restructurer::new(bundle_manifests());

        restructurer.restructure(src.path(), out.path(), true).await.unwrap();
        let first = std::fs::read(out.path().join("Bundles/characters/char01.unity3d")).unwrap();
        restructurer.restructure(src.path(), out.path(), true).await.unwrap();
        let second = std::fs::read(out.path().join("Bundles/characters/char01.unity3d")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let result = Restructurer::new(bundle_manifests())
            .restructure(src.path(), out.path(), true)
            .await;

        match result {
            Err(Error::FileSystem { path, .. }) => {
                assert!(path.ends_with("ab12/char01.unity3d"));
            }
            other => panic!("expected file system error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mismatched_parts_fail_the_pass() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(&src.path().join("ef56/op.usm.ppart"), &[1u8; 100]);
        write(&src.path().join("ef56/op.usm.spart"), &[2u8; 3]);

        let manifests = ManifestSet {
            movies: Manifest::new(vec![MovieEntry {
                hash: "ef56".to_string(),
                name: "op".to_string(),
                identifier: "movies/op".to_string(),
                enable_split: true,
            }]),
            ..Default::default()
        };

        let result = Restructurer::new(manifests)
            .restructure(src.path(), out.path(), false)
            .await;
        assert!(matches!(result, Err(Error::MergeIntegrity { chunk: 1, .. })));
        assert!(!out.path().join("Movies/movies/op.usm").exists());
    }

    #[tokio::test]
    async fn test_identifier_cannot_leave_destination() {
        let base = tempfile::tempdir().unwrap();
        let src = base.path().join("src");
        let out = base.path().join("out");
        write(&src.join("ab12/char01.unity3d"), b"bundle");

        let manifests = ManifestSet {
            bundles: Manifest::new(vec![BundleEntry {
                hash: "ab12".to_string(),
                name: "char01".to_string(),
                identifier: "../../escaped".to_string(),
            }]),
            ..Default::default()
        };

        let result = Restructurer::new(manifests)
            .restructure(&src, &out, true)
            .await;

        assert!(matches!(result, Err(Error::InvalidLocator(_))));
        assert!(!base.path().join("escaped.unity3d").exists());
    }
}
