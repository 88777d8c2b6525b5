//! Manifest payload decoding

use serde::de::DeserializeOwned;

use super::entries::{Manifest, ManifestEntries};
use crate::error::{Error, Result};
use crate::types::ManifestKind;

/// Decodes a decrypted manifest payload of a known kind
///
/// Implementations select the entry shape from `kind`; they must not guess it
/// from the payload contents.
pub trait ManifestDecoder: Send + Sync {
    /// Decode one payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestDecode`] if the payload does not match the
    /// entry shape of `kind`.
    fn decode(&self, kind: ManifestKind, payload: &[u8]) -> Result<ManifestEntries>;
}

/// JSON manifest codec
///
/// Reads manifests encoded as `{"Entries": [...]}` with PascalCase fields, the
/// same layout the optional `{platform}_{Kind}.json` dumps are written in, so a
/// dump can be decoded again.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonManifestCodec;

impl JsonManifestCodec {
    /// Encode a manifest as indented JSON
    pub fn encode(&self, entries: &ManifestEntries) -> Result<Vec<u8>> {
        let bytes = match entries {
            ManifestEntries::Bundle(m) => serde_json::to_vec_pretty(m)?,
            ManifestEntries::Sound(m) => serde_json::to_vec_pretty(m)?,
            ManifestEntries::Movie(m) => serde_json::to_vec_pretty(m)?,
        };
        Ok(bytes)
    }
}

impl ManifestDecoder for JsonManifestCodec {
    fn decode(&self, kind: ManifestKind, payload: &[u8]) -> Result<ManifestEntries> {
        Ok(match kind {
            ManifestKind::Bundle => ManifestEntries::Bundle(parse(kind, payload)?),
            ManifestKind::Sound => ManifestEntries::Sound(parse(kind, payload)?),
            ManifestKind::Movie => ManifestEntries::Movie(parse(kind, payload)?),
        })
    }
}

fn parse<T: DeserializeOwned>(kind: ManifestKind, payload: &[u8]) -> Result<Manifest<T>> {
    serde_json::from_slice(payload).map_err(|e| Error::ManifestDecode {
        kind,
        reason: e.to_string(),
    })
}
