//! Perception model asset staging.
//!
//! The external detector loads its model from disk. Before a sensor enters
//! its loop the model file must exist; when it doesn't, it is downloaded
//! once and written next to its final path before being moved into place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

/// Connection timeout for the model download.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that make a model asset unavailable.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to download model from {url}: {source}")]
    Download { url: String, source: reqwest::Error },

    #[error("Model download from {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to write model to '{}': {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
}

/// Make sure the model at `path` exists, fetching it from `url` if needed.
pub async fn ensure_asset(path: &Path, url: &str) -> Result<PathBuf, AssetError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        log::debug!("Model already present at {}", path.display());
        return Ok(path.to_path_buf());
    }

    log::info!("Downloading model from {}...", url);
    let io_err = |source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|source| AssetError::Download {
            url: url.to_string(),
            source,
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| AssetError::Download {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(AssetError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let partial = partial_path(path);
    let mut file = tokio::fs::File::create(&partial).await.map_err(io_err)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(source) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(AssetError::Download {
                    url: url.to_string(),
                    source,
                });
            }
        };
        file.write_all(&chunk).await.map_err(io_err)?;
    }
    file.flush().await.map_err(io_err)?;
    drop(file);

    tokio::fs::rename(&partial, path).await.map_err(io_err)?;
    log::info!("Model saved to {}", path.display());
    Ok(path.to_path_buf())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
