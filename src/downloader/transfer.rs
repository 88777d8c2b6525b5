//! Fetching a single locator to disk

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::planner::RemoteLocator;

/// Progress callback: bytes copied so far and the declared length, if any
pub type ProgressFn<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Abstraction over fetching one remote object, enabling testability
#[async_trait::async_trait]
pub trait LocatorFetcher: Send + Sync {
    /// Copy `locator` to `dest`, creating parent directories, and return the byte count
    ///
    /// # Errors
    ///
    /// Transport failures and non-success statuses are [`Error::LocatorFetch`];
    /// local write failures are [`Error::FileSystem`].
    async fn fetch(
        &self,
        locator: &RemoteLocator,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64>;
}

/// Production [`LocatorFetcher`] over HTTP(S)
#[derive(Clone, Debug)]
pub struct HttpLocatorFetcher {
    http: reqwest::Client,
}

impl HttpLocatorFetcher {
    /// Create a fetcher sharing `http`'s connection pool
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl LocatorFetcher for HttpLocatorFetcher {
    async fn fetch(
        &self,
        locator: &RemoteLocator,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64> {
        let url = locator.url();
        let fetch_error = |reason: String| Error::LocatorFetch {
            url: url.clone(),
            reason,
        };

        let mut response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        let declared = response.content_length();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::fs(parent, e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::fs(dest, e))?;

        let mut copied: u64 = 0;
        let copy_result: Result<()> = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| fetch_error(e.to_string()))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| Error::fs(dest, e))?;
                copied += chunk.len() as u64;
                progress(copied, declared);
            }
            file.flush().await.map_err(|e| Error::fs(dest, e))?;
            Ok(())
        }
        .await;

        if let Err(e) = copy_result {
            drop(file);
            // a truncated file must not look like a finished download
            tokio::fs::remove_file(dest).await.ok();
            return Err(e);
        }

        tracing::trace!(url = %url, bytes = copied, "fetched locator");
        Ok(copied)
    }
}
