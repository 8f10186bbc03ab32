//! Two-phase fetch orchestration.
//!
//! Phase 1 resolves metadata for every admitted handle and joins. Phase 2
//! runs, per handle, the source-resolver/downloader chain and the citation
//! fetch side by side, then joins. The citation writer runs once after that.
//! A failure in one handle's pipeline never cancels another's work; all
//! failures are collected and returned together at the end.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::article::Article;
use crate::citation::{CitationFetcher, CitationWriter};
use crate::download::{Downloader, RateLimiter};
use crate::parser::Handle;
use crate::registry::{ApiClient, CrossrefClient, DoiRegistry};
use crate::source::{MirrorList, SourceResolver};
use crate::user_agent::user_agent;

use super::error::{BatchError, SetupError, Stage, StageError, StageFailure};
use super::gate::{GateOutcome, IdentifierGate, UNKNOWN_IDENTIFIER};
use super::metadata::MetadataResolver;
use super::{ArticleSummary, FetchConfig, FetchMode, RunReport};

/// One article after Phase 2, with its input position.
struct Finished {
    index: usize,
    article: Article,
    document: Option<PathBuf>,
}

/// Runs the full pipeline for a batch of identifiers.
#[derive(Debug, Clone)]
pub struct Fetcher {
    mode: FetchMode,
    gate: IdentifierGate,
    metadata: MetadataResolver,
    sources: SourceResolver,
    downloader: Downloader,
    citations: CitationFetcher,
    writer: CitationWriter,
}

impl Fetcher {
    /// Builds every component from `config` with a fresh rate limiter.
    ///
    /// # Errors
    ///
    /// [`SetupError`] if the HTTP client cannot be built or a base URL or
    /// mirror entry is invalid.
    pub fn new(config: &FetchConfig) -> Result<Self, SetupError> {
        let burst = config.rate_burst.unwrap_or(config.rate_limit);
        let limiter = Arc::new(RateLimiter::with_capacity(config.rate_limit, burst));
        Self::with_rate_limiter(config, limiter)
    }

    /// Builds every component from `config`, sharing `limiter` across all of them.
    ///
    /// # Errors
    ///
    /// Same as [`Fetcher::new`].
    pub fn with_rate_limiter(
        config: &FetchConfig,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, SetupError> {
        check_base_url("crossref_url", &config.crossref_url)?;
        check_base_url("doi_registry_url", &config.doi_registry_url)?;

        let api = ApiClient::new(
            &user_agent(config.mailto.as_deref()),
            limiter,
            config.request_timeout,
        )?;
        let crossref = CrossrefClient::new(api.clone(), &config.crossref_url, config.mailto.clone());

        let sources = SourceResolver::new(
            api.clone(),
            MirrorList::parse_all(config.document_mirrors.as_slice())?,
            MirrorList::parse_all(config.catalog_mirrors.as_slice())?,
        )
        .with_catalog_path(config.catalog_path.as_str())
        .allow_insecure(config.allow_insecure_mirrors);

        Ok(Self {
            mode: config.mode,
            gate: IdentifierGate::new(DoiRegistry::new(api.clone(), &config.doi_registry_url)),
            metadata: MetadataResolver::new(crossref.clone()),
            sources,
            downloader: Downloader::new(api, &config.output_dir, config.download_timeout),
            citations: CitationFetcher::new(crossref, config.format),
            writer: CitationWriter::new(&config.citation_layout, &config.output_dir, config.format)
                .append(config.append),
        })
    }

    /// The run's mode.
    #[must_use]
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Runs the whole pipeline over `inputs`.
    ///
    /// Output for identifiers that succeeded stays on disk whatever happens
    /// to the others.
    ///
    /// # Errors
    ///
    /// [`BatchError`] when any stage failed for any identifier, including
    /// inputs rejected by the gate. It carries the same report a
    /// successful run returns.
    #[instrument(skip_all, fields(inputs = inputs.len(), mode = %self.mode))]
    pub async fn run<S: AsRef<str>>(&self, inputs: &[S]) -> Result<RunReport, BatchError> {
        let GateOutcome {
            handles,
            mut failures,
        } = self.gate.admit(inputs).await;
        info!(
            admitted = handles.len(),
            rejected = failures.len(),
            "identifier gate complete"
        );

        let articles = self.resolve_metadata(handles, &mut failures).await;
        info!(articles = articles.len(), "metadata phase complete");
        warn_shared_file_names(&articles);

        let finished = self.fetch_artifacts(articles, &mut failures).await;
        info!(articles = finished.len(), "source and citation phase complete");

        let citation_files = if self.mode.fetches_citations() {
            match self
                .writer
                .write_all(finished.iter().map(|f| &f.article))
                .await
            {
                Ok(files) => files,
                Err(error) => {
                    warn!(error = %error, "citation writer aborted");
                    let identifier = match &error {
                        StageError::Io { path, .. } => path.display().to_string(),
                        _ => UNKNOWN_IDENTIFIER.to_string(),
                    };
                    failures.push(StageFailure::new(identifier, Stage::CitationOutput, error));
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let report = RunReport {
            articles: finished.into_iter().map(summarize).collect(),
            citation_files,
        };

        info!(
            documents = report.documents(),
            citations = report.citations(),
            failures = failures.len(),
            "fetch run complete"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(BatchError { failures, report })
        }
    }

    /// Phase 1: metadata for every handle, concurrently. Every handle comes
    /// back as an article, enriched or not, in input order.
    async fn resolve_metadata(
        &self,
        handles: Vec<Handle>,
        failures: &mut Vec<StageFailure>,
    ) -> Vec<Article> {
        let mut tasks = JoinSet::new();
        for (index, handle) in handles.into_iter().enumerate() {
            let metadata = self.metadata.clone();
            tasks.spawn(async move {
                let mut article = Article::new(handle);
                let result = AssertUnwindSafe(metadata.enrich(&mut article))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(StageError::panicked(article.handle().value(), payload.as_ref()))
                    });
                (index, article, result)
            });
        }

        let mut articles = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, article, result)) => {
                    if let Err(error) = result {
                        warn!(
                            identifier = %article.handle(),
                            error = %error,
                            "metadata lookup failed; continuing with identifier as title"
                        );
                        failures.push(StageFailure::new(
                            article.handle().value(),
                            Stage::Metadata,
                            error,
                        ));
                    }
                    articles.push((index, article));
                }
                Err(join_error) => record_lost_task(failures, Stage::Metadata, &join_error),
            }
        }

        articles.sort_by_key(|(index, _)| *index);
        articles.into_iter().map(|(_, article)| article).collect()
    }

    /// Phase 2: per article, the source chain and the citation fetch run
    /// side by side in one task that owns the article.
    async fn fetch_artifacts(
        &self,
        articles: Vec<Article>,
        failures: &mut Vec<StageFailure>,
    ) -> Vec<Finished> {
        let mut tasks = JoinSet::new();
        for (index, article) in articles.into_iter().enumerate() {
            let fetcher = self.clone();
            tasks.spawn(async move { fetcher.fetch_one(index, article).await });
        }

        let mut finished = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((done, stage_failures)) => {
                    failures.extend(stage_failures);
                    finished.push(done);
                }
                Err(join_error) => {
                    let stage = if self.mode.fetches_source() {
                        Stage::Source
                    } else {
                        Stage::Citation
                    };
                    record_lost_task(failures, stage, &join_error);
                }
            }
        }

        finished.sort_by_key(|f| f.index);
        finished
    }

    async fn fetch_one(&self, index: usize, mut article: Article) -> (Finished, Vec<StageFailure>) {
        let handle = article.handle().clone();
        let citation_doi = article.citation_doi().map(str::to_owned);
        let mut stage_failures = Vec::new();

        let source = async {
            if !self.mode.fetches_source() {
                return None;
            }
            let chain = self.fetch_source(&mut article);
            Some(
                AssertUnwindSafe(chain)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(StageFailure::new(
                            handle.value(),
                            Stage::Source,
                            StageError::panicked(handle.value(), payload.as_ref()),
                        ))
                    }),
            )
        };

        let citation = async {
            if !self.mode.fetches_citations() {
                return None;
            }
            let fetch = self.citations.fetch(&handle, citation_doi.as_deref());
            Some(
                AssertUnwindSafe(fetch)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(StageError::panicked(handle.value(), payload.as_ref()))
                    }),
            )
        };

        let (source, citation) = tokio::join!(source, citation);

        let document = match source {
            Some(Ok(path)) => Some(path),
            Some(Err(failure)) => {
                warn!(
                    identifier = %handle,
                    stage = %failure.stage,
                    error = %failure.error,
                    "source stage failed"
                );
                stage_failures.push(failure);
                None
            }
            None => None,
        };

        match citation {
            Some(Ok(bytes)) => article.set_citation(bytes),
            Some(Err(error)) => {
                warn!(identifier = %handle, error = %error, "citation fetch failed");
                stage_failures.push(StageFailure::new(handle.value(), Stage::Citation, error));
            }
            None => {}
        }

        (
            Finished {
                index,
                article,
                document,
            },
            stage_failures,
        )
    }

    /// Resolves a source URL, records it on the article, then downloads it.
    async fn fetch_source(&self, article: &mut Article) -> Result<PathBuf, StageFailure> {
        let identifier = article.handle().value().to_string();

        let url: Url = self
            .sources
            .resolve(article.handle())
            .await
            .map_err(|e| StageFailure::new(identifier.as_str(), Stage::Source, e))?;
        debug!(identifier = %identifier, url = %url, "source resolved");
        article.set_source_url(url);

        let path = self
            .downloader
            .download(article)
            .await
            .map_err(|e| StageFailure::new(identifier.as_str(), Stage::Download, e))?;
        debug!(identifier = %identifier, path = %path.display(), "download stage complete");
        Ok(path)
    }
}

/// Warns for every article whose file stem an earlier article already uses.
/// Such articles write to the same document and citation paths.
/// Returns how many collided.
fn warn_shared_file_names(articles: &[Article]) -> usize {
    let mut owners: HashMap<&str, &Handle> = HashMap::new();
    let mut collisions = 0;
    for article in articles {
        if let Some(first) = owners.get(article.file_name()) {
            warn!(
                identifier = %article.handle(),
                shares_with = %first,
                file_name = article.file_name(),
                "identifiers map to the same file name; later output overwrites earlier"
            );
            collisions += 1;
        } else {
            owners.insert(article.file_name(), article.handle());
        }
    }
    collisions
}

fn record_lost_task(
    failures: &mut Vec<StageFailure>,
    stage: Stage,
    join_error: &tokio::task::JoinError,
) {
    warn!(stage = %stage, error = %join_error, "pipeline task did not complete");
    failures.push(StageFailure::new(
        UNKNOWN_IDENTIFIER,
        stage,
        StageError::Panicked {
            identifier: UNKNOWN_IDENTIFIER.to_string(),
            message: join_error.to_string(),
        },
    ));
}

fn summarize(finished: Finished) -> ArticleSummary {
    let Finished {
        article, document, ..
    } = finished;
    ArticleSummary {
        identifier: article.handle().value().to_string(),
        kind: article.handle().kind(),
        title: article.title().to_string(),
        canonical_doi: article.canonical_doi().map(str::to_owned),
        source_url: article.source_url().cloned(),
        document,
        citation_bytes: article.citation().len(),
    }
}

fn check_base_url(what: &'static str, value: &str) -> Result<(), SetupError> {
    let url = Url::parse(value).map_err(|e| SetupError::invalid_url(what, value, e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(()),
        _ => Err(SetupError::invalid_url(
            what,
            value,
            "expected an http(s) URL with a host",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::fetch::FailureKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn config(server: &MockServer, dir: &TempDir, mode: FetchMode) -> FetchConfig {
        FetchConfig {
            mode,
            output_dir: dir.path().to_path_buf(),
            rate_limit: 0,
            request_timeout: Duration::from_secs(5),
            crossref_url: server.uri(),
            doi_registry_url: server.uri(),
            document_mirrors: vec![server.uri()],
            allow_insecure_mirrors: true,
            ..FetchConfig::default()
        }
    }

    async fn mount_work(server: &MockServer, doi: &str, title: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/handles/{doi}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"responseCode": 1})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/works/{}", urlencoding::encode(doi))))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "message": {"title": [title], "DOI": doi}
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_shared_file_names_are_counted() {
        let titled = |raw: &str, title: &str| {
            let mut article = Article::new(crate::parser::parse_handle(raw).unwrap());
            article.set_title(title);
            article
        };
        let articles = [
            titled("10.1000/one", "Same Title"),
            titled("10.1000/two", "same title!"),
            titled("10.1000/three", "Other"),
            titled("9780136091813", "Same  Title"),
        ];
        assert_eq!(warn_shared_file_names(&articles), 2);
        assert_eq!(warn_shared_file_names(&articles[2..3]), 0);
    }

    #[test]
    fn test_check_base_url_rejects_non_http() {
        assert!(check_base_url("crossref_url", "https://api.crossref.org").is_ok());
        assert!(check_base_url("crossref_url", "ftp://api.crossref.org").is_err());
        assert!(check_base_url("crossref_url", "not a url").is_err());
    }

    #[test]
    fn test_new_rejects_bad_mirror() {
        let config = FetchConfig {
            document_mirrors: vec!["ftp://mirror.example".to_string()],
            ..FetchConfig::default()
        };
        assert!(matches!(
            Fetcher::new(&config),
            Err(SetupError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_with_no_inputs_succeeds_with_empty_report() {
        let fetcher = Fetcher::new(&FetchConfig::default()).unwrap();
        let report = fetcher.run::<&str>(&[]).await.unwrap();
        assert!(report.articles.is_empty());
        assert!(report.citation_files.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_keeps_handle_in_phase_two() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        Mock::given(method("GET"))
            .and(path("/api/handles/10.1000/nometa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"responseCode": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works/10.1000%2Fnometa"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/works/10.1000%2Fnometa/transform/application/x-bibtex"))
            .respond_with(ResponseTemplate::new(200).set_body_string("@misc{nometa}"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server, &dir, FetchMode::CiteOnly)).unwrap();
        let err = fetcher.run(&["10.1000/nometa"]).await.unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].stage, Stage::Metadata);
        let summary = &err.report.articles[0];
        assert_eq!(summary.title, "10.1000/nometa");
        assert_eq!(summary.citation_bytes, "@misc{nometa}".len());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("citations.bib")).unwrap(),
            "@misc{nometa}\n"
        );
    }

    #[tokio::test]
    async fn test_source_only_skips_citations_and_writer() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_work(&server, "10.1000/src", "Source Only").await;
        Mock::given(method("GET"))
            .and(path_regex(r"/transform/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("@misc{x}"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/10.1000/src"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><embed src="/files/src.pdf"></body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/src.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&config(&server, &dir, FetchMode::SourceOnly)).unwrap();
        assert_eq!(fetcher.mode(), FetchMode::SourceOnly);
        let report = fetcher.run(&["10.1000/src"]).await.unwrap();

        assert_eq!(report.documents(), 1);
        assert_eq!(report.citations(), 0);
        assert!(report.citation_files.is_empty());
        assert_eq!(
            std::fs::read(dir.path().join("source_only.pdf")).unwrap(),
            b"%PDF-1.4"
        );
        assert!(!dir.path().join("citations.bib").exists());
    }

    #[tokio::test]
    async fn test_writer_io_failure_is_citation_output_stage() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let dir = TempDir::new().unwrap();
        mount_work(&server, "10.1000/w", "Writer").await;
        Mock::given(method("GET"))
            .and(path("/works/10.1000%2Fw/transform/application/x-bibtex"))
            .respond_with(ResponseTemplate::new(200).set_body_string("@misc{w}"))
            .mount(&server)
            .await;

        let mut cfg = config(&server, &dir, FetchMode::CiteOnly);
        cfg.citation_layout = crate::citation::CitationLayout::CombinedAt(
            dir.path().join("missing").join("out.bib"),
        );
        let err = Fetcher::new(&cfg).unwrap().run(&["10.1000/w"]).await.unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].stage, Stage::CitationOutput);
        assert_eq!(err.failures[0].error.kind(), FailureKind::Io);
        assert_eq!(err.report.citations(), 1);
    }
}
