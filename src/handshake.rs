//! Asset-hash handshake with the game API

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cipher::PayloadCipher;
use crate::error::{Error, Result};
use crate::types::AssetPlatform;

/// Handshake endpoint path, relative to the API base URL
pub const ASSET_HASH_PATH: &str = "/api/start/assetHash";

/// Header carrying the platform's player token
pub const PLATFORM_HEADER: &str = "Aoharu-Platform";

#[derive(Serialize)]
struct AssetHashRequest<'a> {
    asset_version: &'a str,
    environment: &'a str,
}

#[derive(Deserialize)]
struct ServerResponse<T> {
    data: T,
}

#[derive(Deserialize)]
struct AssetHashResponse {
    asset_hash: String,
}

/// Retrieves the current content hash for a platform
///
/// One encrypted POST per call, no retry. Any failure (transport, status,
/// cipher or envelope) is reported as [`Error::Handshake`].
pub struct ManifestHashClient {
    http: reqwest::Client,
    endpoint: String,
    cipher: Arc<dyn PayloadCipher>,
}

impl ManifestHashClient {
    /// Create a client for the API at `api_base` (e.g. `https://api.example`)
    pub fn new(http: reqwest::Client, api_base: &str, cipher: Arc<dyn PayloadCipher>) -> Self {
        Self {
            http,
            endpoint: format!("{}{}", api_base.trim_end_matches('/'), ASSET_HASH_PATH),
            cipher,
        }
    }

    /// Ask the API for the content hash currently served to `platform`
    pub async fn retrieve_hash(&self, platform: AssetPlatform) -> Result<String> {
        let body = serde_json::to_string(&AssetHashRequest {
            asset_version: "0",
            environment: "release",
        })?;
        let encrypted = self
            .cipher
            .encrypt(&body)
            .map_err(|e| Error::Handshake(format!("failed to encrypt request: {}", e)))?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(PLATFORM_HEADER, platform.player_token())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(encrypted)
            .send()
            .await
            .map_err(|e| Error::Handshake(format!("request to {} failed: {}", self.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Handshake(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Handshake(format!("failed to read response body: {}", e)))?;
        let decrypted = self
            .cipher
            .decrypt(&text)
            .map_err(|e| Error::Handshake(format!("failed to decrypt response: {}", e)))?;

        let envelope: ServerResponse<AssetHashResponse> = serde_json::from_str(&decrypted)
            .map_err(|e| Error::Handshake(format!("unexpected response envelope: {}", e)))?;
        let hash = envelope.data.asset_hash;
        if hash.is_empty() {
            return Err(Error::Handshake("server returned an empty asset hash".into()));
        }

        tracing::info!(platform = %platform, hash = %hash, "retrieved manifest hash");
        Ok(hash)
    }
}
