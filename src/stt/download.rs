//! Fetches catalog models into a [`ModelStore`].
//!
//! Bytes are streamed into `ggml-<name>.bin.part` and renamed on success, so
//! an interrupted download never looks like an available model.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::stt::engine::SttError;
use crate::stt::model::{find_model, ModelInfo, ModelStore};

fn download_error(e: impl std::fmt::Display) -> SttError {
    SttError::Download(e.to_string())
}

/// Downloads model files over HTTP(S).
pub struct ModelDownloader {
    client: reqwest::Client,
    store: ModelStore,
}

impl ModelDownloader {
    pub fn new(store: ModelStore) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, store }
    }

    /// Download catalog model `name`.  Returns the final path.
    ///
    /// An already-present file is returned as-is.
    pub async fn download(&self, name: &str) -> Result<PathBuf, SttError> {
        let info = find_model(name).ok_or_else(|| SttError::ModelNotFound(name.to_string()))?;
        if let Ok(path) = self.store.resolve(name) {
            log::info!("stt: model '{name}' already present at {}", path.display());
            return Ok(path);
        }
        self.download_from(info, info.url).await
    }

    /// Download `info` from an explicit URL (mirrors, tests).
    pub async fn download_from(&self, info: &ModelInfo, url: &str) -> Result<PathBuf, SttError> {
        tokio::fs::create_dir_all(self.store.dir())
            .await
            .map_err(download_error)?;

        let dest = self.store.path_for(info.name);
        let part = dest.with_extension("bin.part");

        log::info!("stt: downloading '{}' (~{} MB) from {url}", info.name, info.file_size_mb);
        match self.fetch_into(url, &part).await {
            Ok(bytes) => {
                tokio::fs::rename(&part, &dest).await.map_err(download_error)?;
                log::info!("stt: saved {} bytes to {}", bytes, dest.display());
                Ok(dest)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                log::error!("stt: download of '{}' failed: {e}", info.name);
                Err(e)
            }
        }
    }

    async fn fetch_into(&self, url: &str, part: &std::path::Path) -> Result<u64, SttError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(download_error)?;

        let total = response.content_length();
        let mut file = tokio::fs::File::create(part).await.map_err(download_error)?;
        let mut written: u64 = 0;
        let mut next_report: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(download_error)? {
            file.write_all(&chunk).await.map_err(download_error)?;
            written += chunk.len() as u64;
            if written >= next_report {
                match total {
                    Some(t) if t > 0 => log::debug!("stt: {}%", written * 100 / t),
                    _ => log::debug!("stt: {written} bytes"),
                }
                next_report = written + 16 * 1024 * 1024;
            }
        }
        file.flush().await.map_err(download_error)?;

        if written == 0 {
            return Err(SttError::Download("server returned an empty body".into()));
        }
        Ok(written)
    }
}
