//! Citation file assembly.
//!
//! Runs once, sequentially, after every citation fetch has finished. Any
//! IO error aborts the remaining writes: a broken output medium will not
//! recover for the next article.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use crate::article::Article;
use crate::fetch::StageError;

use super::CitationFormat;

/// Stem of the default combined citation file.
const COMBINED_STEM: &str = "citations";

/// How citations are laid out on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CitationLayout {
    /// All citations in `{output_dir}/citations{ext}`.
    #[default]
    Combined,
    /// All citations in the given file.
    CombinedAt(PathBuf),
    /// One `{file_name}{ext}` per article in the output directory.
    Separate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Combined(PathBuf),
    Separate(PathBuf),
}

/// Writes fetched citations to disk.
#[derive(Debug, Clone)]
pub struct CitationWriter {
    target: Target,
    format: CitationFormat,
    append: bool,
}

impl CitationWriter {
    /// Builds a writer for `layout`, resolving default paths under `output_dir`.
    #[must_use]
    pub fn new(layout: &CitationLayout, output_dir: &Path, format: CitationFormat) -> Self {
        let target = match layout {
            CitationLayout::Combined => Target::Combined(
                output_dir.join(format!("{COMBINED_STEM}{}", format.extension())),
            ),
            CitationLayout::CombinedAt(path) => Target::Combined(path.clone()),
            CitationLayout::Separate => Target::Separate(output_dir.to_path_buf()),
        };
        Self {
            target,
            format,
            append: false,
        }
    }

    /// Appends to existing files instead of truncating them.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Writes every non-empty citation, in iteration order.
    ///
    /// Articles without citation bytes are skipped; their failure was already
    /// reported upstream. Returns the files written.
    ///
    /// # Errors
    ///
    /// [`StageError::Io`] on the first open/write failure; nothing further is written.
    #[instrument(skip_all, fields(format = %self.format, append = self.append))]
    pub async fn write_all<'a, I>(&self, articles: I) -> Result<Vec<PathBuf>, StageError>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let with_citations = articles.into_iter().filter(|a| a.has_citation());
        match &self.target {
            Target::Combined(path) => self.write_combined(path, with_citations).await,
            Target::Separate(dir) => self.write_separate(dir, with_citations).await,
        }
    }

    async fn write_combined<'a>(
        &self,
        path: &Path,
        articles: impl Iterator<Item = &'a Article>,
    ) -> Result<Vec<PathBuf>, StageError> {
        let mut writer: Option<BufWriter<File>> = None;
        let mut count = 0usize;

        for article in articles {
            // Opened lazily so a run without citations leaves no empty file.
            if writer.is_none() {
                writer = Some(BufWriter::new(self.open(path).await?));
            }
            if let Some(out) = writer.as_mut() {
                write_normalized(out, article.citation())
                    .await
                    .map_err(|e| StageError::io(path, e))?;
                count += 1;
            }
        }

        let Some(mut out) = writer else {
            debug!("no citations to write");
            return Ok(Vec::new());
        };
        out.flush().await.map_err(|e| StageError::io(path, e))?;
        info!(path = %path.display(), citations = count, "citation file written");
        Ok(vec![path.to_path_buf()])
    }

    async fn write_separate<'a>(
        &self,
        dir: &Path,
        articles: impl Iterator<Item = &'a Article>,
    ) -> Result<Vec<PathBuf>, StageError> {
        let mut written = Vec::new();
        for article in articles {
            let path = dir.join(format!("{}{}", article.file_name(), self.format.extension()));
            let mut out = BufWriter::new(self.open(&path).await?);
            write_normalized(&mut out, article.citation())
                .await
                .map_err(|e| StageError::io(&path, e))?;
            out.flush().await.map_err(|e| StageError::io(&path, e))?;
            debug!(identifier = %article.handle(), path = %path.display(), "citation written");
            written.push(path);
        }
        info!(files = written.len(), "citation files written");
        Ok(written)
    }

    async fn open(&self, path: &Path) -> Result<File, StageError> {
        let mut options = OpenOptions::new();
        options.create(true);
        if self.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        options.open(path).await.map_err(|e| StageError::io(path, e))
    }
}

/// Writes `citation` so that it ends with exactly one newline.
async fn write_normalized<W>(out: &mut W, citation: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let end = citation
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    out.write_all(&citation[..end]).await?;
    out.write_all(b"\n").await
}
