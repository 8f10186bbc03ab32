//! Streaming document downloads.
//!
//! [`Downloader`] writes the body of an article's resolved source URL to
//! `{output_dir}/{file_name}.pdf`, chunk by chunk. On any error after the file
//! was created, the partial file is removed; there is no resumption.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::article::Article;
use crate::fetch::StageError;
use crate::registry::ApiClient;

use super::filename::DOCUMENT_EXTENSION;

/// Streams resolved source documents to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    api: ApiClient,
    output_dir: PathBuf,
    download_timeout: Duration,
}

impl Downloader {
    /// Creates a downloader writing into `output_dir`, using `download_timeout`
    /// as the per-request deadline.
    pub fn new(api: ApiClient, output_dir: impl Into<PathBuf>, download_timeout: Duration) -> Self {
        Self {
            api,
            output_dir: output_dir.into(),
            download_timeout,
        }
    }

    /// Path the document for `article` is (or would be) written to.
    #[must_use]
    pub fn target_path(&self, article: &Article) -> PathBuf {
        self.output_dir
            .join(format!("{}{DOCUMENT_EXTENSION}", article.file_name()))
    }

    /// Downloads the article's source document, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// - [`StageError::Precondition`] if the article has no resolved source URL
    /// - transport errors from the request or body stream
    /// - [`StageError::Io`] if the file cannot be created or written
    #[instrument(skip(self, article), fields(identifier = %article.handle()))]
    pub async fn download(&self, article: &Article) -> Result<PathBuf, StageError> {
        let Some(url) = article.source_url() else {
            return Err(StageError::precondition(
                article.handle().value(),
                "a resolved source URL",
            ));
        };
        let url = url.as_str();

        let response = self
            .api
            .get_with_timeout(url, self.download_timeout)
            .await?;

        let path = self.target_path(article);
        let mut file = File::create(&path)
            .await
            .map_err(|e| StageError::io(&path, e))?;

        match stream_to_file(&mut file, response, url, &path).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "document downloaded");
                Ok(path)
            }
            Err(error) => {
                drop(file);
                if let Err(remove_error) = tokio::fs::remove_file(&path).await {
                    warn!(
                        path = %path.display(),
                        error = %remove_error,
                        "failed to remove partial download"
                    );
                } else {
                    debug!(path = %path.display(), "removed partial download");
                }
                Err(error)
            }
        }
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, StageError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| StageError::from_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| StageError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| StageError::io(file_path, e))?;

    Ok(bytes_written)
}
