//! Manifest container fixtures and split-file generators

use std::path::Path;

use edelstein_assets::{ContainerReader, Error, Result, TextAsset};

/// Bundle manifest with one entry
pub const BUNDLE_MANIFEST: &str =
    r#"{"Entries":[{"Hash":"ab12","Name":"char01","Identifier":"characters/char01"}]}"#;

/// Sound manifest with one split entry and no companion stream
pub const SOUND_MANIFEST: &str = r#"{"Entries":[{"Hash":"cd34","Name":"bgm01","Identifier":"bgm/bgm01","EnableSplit":true,"AwbHash":""}]}"#;

/// Movie manifest with one plain entry
pub const MOVIE_MANIFEST: &str =
    r#"{"Entries":[{"Hash":"ef56","Name":"op","Identifier":"movies/opening","EnableSplit":false}]}"#;

/// Reads test containers: a JSON array of `{"name": ..., "text": ...}`
pub struct JsonContainerReader;

#[derive(serde::Deserialize, serde::Serialize)]
struct JsonTextAsset {
    name: String,
    text: String,
}

impl ContainerReader for JsonContainerReader {
    fn read_text_assets(&self, path: &Path) -> Result<Vec<TextAsset>> {
        let raw = std::fs::read(path).map_err(|e| Error::fs(path, e))?;
        let assets: Vec<JsonTextAsset> = serde_json::from_slice(&raw)?;
        Ok(assets
            .into_iter()
            .map(|a| TextAsset {
                name: a.name,
                bytes: a.text.into_bytes(),
            })
            .collect())
    }
}

/// Container body holding the given `(name, text)` assets
pub fn container(assets: &[(&str, &str)]) -> String {
    let assets: Vec<JsonTextAsset> = assets
        .iter()
        .map(|(name, text)| JsonTextAsset {
            name: name.to_string(),
            text: text.to_string(),
        })
        .collect();
    serde_json::to_string(&assets).unwrap_or_default()
}

/// Container body with the three standard manifests
pub fn standard_container() -> String {
    container(&[
        ("Bundle", BUNDLE_MANIFEST),
        ("Sound", SOUND_MANIFEST),
        ("Movie", MOVIE_MANIFEST),
    ])
}

/// Deterministic content of `len` bytes
pub fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(17).wrapping_add(seed))
        .collect()
}

/// Split `original` into (`.ppart`, `.spart`) contents
pub fn split_parts(original: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    for block in original.chunks(1024) {
        let (head, tail) = block.split_at(block.len() - 1);
        primary.extend_from_slice(head);
        secondary.extend_from_slice(tail);
    }
    (primary, secondary)
}
