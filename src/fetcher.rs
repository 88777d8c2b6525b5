//! Manifest container download and extraction

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cipher::ManifestCipher;
use crate::downloader::LocatorFetcher;
use crate::error::{Error, Result};
use crate::manifest::{
    ContainerReader, JsonManifestCodec, MANIFEST_NAME, ManifestDecoder, ManifestSet, TextAsset,
};
use crate::planner::UriPlanner;
use crate::types::{AssetPlatform, ManifestKind};

/// Parameters for creating a [`ManifestFetcher`]
pub struct ManifestFetcherParams {
    /// Fetches the manifest container
    pub fetcher: Arc<dyn LocatorFetcher>,
    /// Builds the manifest container URL
    pub planner: UriPlanner,
    /// Lists text assets inside the container
    pub container: Arc<dyn ContainerReader>,
    /// Decrypts each manifest payload
    pub cipher: Arc<dyn ManifestCipher>,
    /// Decodes decrypted payloads
    pub decoder: Arc<dyn ManifestDecoder>,
    /// Root of the hash-addressed download tree
    pub download_dir: PathBuf,
    /// Where extracted payloads and JSON dumps are written
    pub manifests_dir: PathBuf,
    /// Write `{platform}_[{language}_]{Kind}.json` dumps
    pub dump_json: bool,
}

/// Downloads a manifest container and decodes the three manifests inside it
pub struct ManifestFetcher {
    fetcher: Arc<dyn LocatorFetcher>,
    planner: UriPlanner,
    container: Arc<dyn ContainerReader>,
    cipher: Arc<dyn ManifestCipher>,
    decoder: Arc<dyn ManifestDecoder>,
    download_dir: PathBuf,
    manifests_dir: PathBuf,
    dump_json: bool,
}

impl ManifestFetcher {
    /// Create a fetcher
    pub fn new(params: ManifestFetcherParams) -> Self {
        let ManifestFetcherParams {
            fetcher,
            planner,
            container,
            cipher,
            decoder,
            download_dir,
            manifests_dir,
            dump_json,
        } = params;
        Self {
            fetcher,
            planner,
            container,
            cipher,
            decoder,
            download_dir,
            manifests_dir,
            dump_json,
        }
    }

    /// Fetch and decode the manifests served for `hash`
    ///
    /// 1. Download `manifest.unity3d` into the download tree
    /// 2. Write each manifest payload to `{manifests_dir}/{platform}/[{language}/]{Kind}.bytes`
    /// 3. Decrypt and decode the `Bundle`, `Sound` and `Movie` payloads
    /// 4. Optionally dump each manifest as JSON
    ///
    /// # Errors
    ///
    /// - [`Error::LocatorFetch`] if the container cannot be downloaded
    /// - [`Error::MissingManifest`] if a payload is absent from the container
    /// - [`Error::ManifestDecode`] if a payload cannot be decrypted or decoded
    /// - [`Error::InvalidLocator`] if the hash or language is not a plain path segment
    pub async fn fetch(
        &self,
        platform: AssetPlatform,
        language: Option<&str>,
        hash: &str,
    ) -> Result<ManifestSet> {
        let locator = self.planner.manifest_locator(platform, language, hash);
        let container_path = self.download_dir.join(locator.relative_path()?);

        tracing::info!(url = %locator.url(), "downloading manifest container");
        let bytes = self
            .fetcher
            .fetch(&locator, &container_path, &|_, _| {})
            .await?;
        tracing::debug!(path = %container_path.display(), bytes, "manifest container stored");

        let assets = self.read_container(&container_path).await?;

        let mut extracted_dir = self.manifests_dir.join(platform.path_segment());
        if let Some(language) = language {
            extracted_dir.push(language);
        }
        write_text_assets(&extracted_dir, &assets).await?;

        let manifests = self.decode_assets(&assets)?;
        tracing::info!(
            platform = %platform,
            language = language.unwrap_or("-"),
            bundles = manifests.bundles.len(),
            sounds = manifests.sounds.len(),
            movies = manifests.movies.len(),
            "decoded manifests"
        );

        if self.dump_json {
            self.dump(platform, language, &manifests).await?;
        }

        Ok(manifests)
    }

    /// Decode the first `manifest.unity3d` found below `root`
    ///
    /// Used by the restructure pass, which runs on an already downloaded tree.
    pub async fn load_local(&self, root: &Path) -> Result<ManifestSet> {
        let path = find_container(root).await?;
        tracing::info!(path = %path.display(), "loading manifests from local container");
        let assets = self.read_container(&path).await?;
        self.decode_assets(&assets)
    }

    async fn read_container(&self, path: &Path) -> Result<Vec<TextAsset>> {
        let container = self.container.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || container.read_text_assets(&path))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("container reader failed: {}", e))))?
    }

    fn decode_assets(&self, assets: &[TextAsset]) -> Result<ManifestSet> {
        let mut manifests = ManifestSet::default();
        for kind in ManifestKind::ALL {
            let asset = assets
                .iter()
                .find(|a| a.name == kind.asset_name())
                .ok_or(Error::MissingManifest { kind })?;

            let payload = self
                .cipher
                .decrypt(&asset.bytes)
                .map_err(|e| Error::ManifestDecode {
                    kind,
                    reason: format!("decryption failed: {}", e),
                })?;

            let entries = self.decoder.decode(kind, &payload)?;
            if entries.kind() != kind {
                return Err(Error::ManifestDecode {
                    kind,
                    reason: format!("decoder returned a {} manifest", entries.kind()),
                });
            }
            manifests.insert(entries);
        }
        Ok(manifests)
    }

    async fn dump(
        &self,
        platform: AssetPlatform,
        language: Option<&str>,
        manifests: &ManifestSet,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.manifests_dir)
            .await
            .map_err(|e| Error::fs(&self.manifests_dir, e))?;

        for kind in ManifestKind::ALL {
            let file_name = match language {
                Some(language) => format!("{}_{}_{}.json", platform.path_segment(), language, kind),
                None => format!("{}_{}.json", platform.path_segment(), kind),
            };
            let path = self.manifests_dir.join(file_name);
            let json = JsonManifestCodec.encode(&manifests.entries_of(kind))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| Error::fs(&path, e))?;
            tracing::debug!(path = %path.display(), "dumped manifest");
        }
        Ok(())
    }
}

/// Write the payloads named after a [`ManifestKind`]; other text assets are skipped
async fn write_text_assets(dir: &Path, assets: &[TextAsset]) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::fs(dir, e))?;
    for asset in assets {
        let Some(kind) = ManifestKind::from_asset_name(&asset.name) else {
            tracing::debug!(name = %asset.name, "skipping non-manifest text asset");
            continue;
        };
        let path = dir.join(format!("{}.bytes", kind.asset_name()));
        tokio::fs::write(&path, &asset.bytes)
            .await
            .map_err(|e| Error::fs(&path, e))?;
    }
    Ok(())
}

/// First `manifest.unity3d` below `root`, in file-name order
pub(crate) async fn find_container(root: &Path) -> Result<PathBuf> {
    let root = root.to_path_buf();
    let file_name = format!("{}.unity3d", MANIFEST_NAME);
    let found = tokio::task::spawn_blocking({
        let root = root.clone();
        move || {
            walkdir::WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name.as_str())
                .map(|entry| entry.into_path())
        }
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(format!("directory walk failed: {}", e))))?;

    found.ok_or_else(|| {
        Error::fs(
            root,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no manifest.unity3d below this directory",
            ),
        )
    })
}
