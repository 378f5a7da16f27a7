//! Documentation tree fetcher
//!
//! Resolves the parameter metadata XML in this order, stopping at the first
//! hit:
//!
//! ```text
//! <directory>/<filename> → ./<filename> → primary URL → fallback URL → DEV URL
//!                                              └──────── persist to <directory>/<filename>
//! ```
//!
//! Each remote request is bounded by the configured timeout and tried once.

use crate::config::FetchConfig;
use crate::error::{DocError, DocResult, SourceError};
use crate::vehicle::VehicleType;
use std::path::{Path, PathBuf};

/// Remote document source
///
/// Implemented over HTTP by [`HttpDocumentSource`]; tests substitute an
/// in-memory map.
pub trait DocumentSource {
    /// GET `url` and return the body of a 200 response
    ///
    /// # Errors
    /// Any non-200 status or transport failure.
    fn get(&self, url: &str) -> Result<String, SourceError>;
}

/// Blocking HTTP source honoring the configured timeout and proxies
#[derive(Debug, Clone)]
pub struct HttpDocumentSource {
    client: reqwest::blocking::Client,
}

impl HttpDocumentSource {
    /// Build the HTTP client
    ///
    /// Environment proxies are not picked up implicitly; only those in
    /// `config.proxies` are installed.
    ///
    /// # Errors
    /// Returns [`DocError::Client`] for an unparsable proxy URL or a client
    /// backend failure.
    pub fn new(config: &FetchConfig) -> DocResult<Self> {
        let no_proxy = config
            .proxies
            .no_proxy
            .as_deref()
            .and_then(reqwest::NoProxy::from_string);
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .no_proxy();
        if let Some(url) = &config.proxies.http {
            let proxy = reqwest::Proxy::http(url).map_err(|e| DocError::Client(e.to_string()))?;
            builder = builder.proxy(proxy.no_proxy(no_proxy.clone()));
        }
        if let Some(url) = &config.proxies.https {
            let proxy = reqwest::Proxy::https(url).map_err(|e| DocError::Client(e.to_string()))?;
            builder = builder.proxy(proxy.no_proxy(no_proxy));
        }
        let client = builder.build().map_err(|e| DocError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl DocumentSource for HttpDocumentSource {
    fn get(&self, url: &str) -> Result<String, SourceError> {
        let transport = |e: reqwest::Error| SourceError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().map_err(transport)
    }
}

/// Where a fetched document came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// `<directory>/<filename>`
    Cache(PathBuf),
    /// `<filename>` in the working directory
    WorkingDir(PathBuf),
    /// Remote URL; the body was persisted to the cache
    Remote(String),
}

/// Raw XML text plus its origin
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// XML text
    pub text: String,
    /// Where `text` was found
    pub origin: DocumentOrigin,
}

impl FetchedDocument {
    /// Human-readable origin, used in parse error messages
    #[must_use]
    pub fn origin_label(&self) -> String {
        match &self.origin {
            DocumentOrigin::Cache(path) | DocumentOrigin::WorkingDir(path) => {
                path.display().to_string()
            }
            DocumentOrigin::Remote(url) => url.clone(),
        }
    }
}

/// One fetch: cache location plus the remote URLs to try
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    /// Cache directory
    pub directory: &'a Path,
    /// File name inside the cache directory
    pub filename: &'a str,
    /// Vehicle/firmware specific URL
    pub primary_url: String,
    /// Optional second URL supplied by the caller
    pub fallback_url: Option<String>,
    /// Vehicle used for the DEV fallback URL
    pub vehicle: VehicleType,
}

/// Documentation fetcher over a [`DocumentSource`]
#[derive(Debug, Clone)]
pub struct DocumentFetcher<S> {
    source: S,
    working_dir: PathBuf,
}

impl<S: DocumentSource> DocumentFetcher<S> {
    /// Create fetcher resolving relative lookups against the working directory
    #[inline]
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            working_dir: PathBuf::from("."),
        }
    }

    /// With a different working directory for the second lookup step
    #[inline]
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Underlying source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve the document for `request`
    ///
    /// # Errors
    /// - [`DocError::Io`] if a local file exists but cannot be read
    /// - [`DocError::FetchExhausted`] if every URL fails
    /// - [`DocError::CacheWrite`] if a fetched document cannot be persisted
    pub fn fetch(&self, request: &FetchRequest<'_>) -> DocResult<FetchedDocument> {
        let cache_path = request.directory.join(request.filename);
        if cache_path.is_file() {
            tracing::debug!("Using cached documentation {}", cache_path.display());
            return read_local(cache_path, DocumentOrigin::Cache);
        }

        let local_path = self.working_dir.join(request.filename);
        if local_path.is_file() {
            tracing::debug!("Using documentation {} from working directory", local_path.display());
            return read_local(local_path, DocumentOrigin::WorkingDir);
        }

        let (url, text) = self.fetch_remote(request, &cache_path)?;
        persist(&cache_path, &text)?;
        Ok(FetchedDocument {
            text,
            origin: DocumentOrigin::Remote(url),
        })
    }

    fn fetch_remote(
        &self,
        request: &FetchRequest<'_>,
        cache_path: &Path,
    ) -> DocResult<(String, String)> {
        let mut urls = vec![request.primary_url.clone()];
        urls.extend(request.fallback_url.clone());
        urls.push(request.vehicle.dev_fallback_url());

        let mut last_url = String::new();
        for (attempt, url) in urls.into_iter().enumerate() {
            if attempt > 0 {
                tracing::warn!("Falling back to {url}");
            }
            match self.source.get(&url) {
                Ok(text) => {
                    tracing::info!("Fetched parameter documentation from {url}");
                    return Ok((url, text));
                }
                Err(e) => {
                    tracing::warn!("Unable to fetch XML data: {e}");
                    last_url = url;
                }
            }
        }

        tracing::error!("Unable to fetch XML data, last attempted URL: {last_url}");
        Err(DocError::FetchExhausted {
            last_url,
            cache_path: cache_path.to_path_buf(),
        })
    }
}

fn read_local(path: PathBuf, origin: fn(PathBuf) -> DocumentOrigin) -> DocResult<FetchedDocument> {
    let text = std::fs::read_to_string(&path).map_err(|e| DocError::io_error(&path, e))?;
    Ok(FetchedDocument {
        text,
        origin: origin(path),
    })
}

fn persist(cache_path: &Path, text: &str) -> DocResult<()> {
    if let Some(dir) = cache_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| DocError::CacheWrite {
            path: cache_path.to_path_buf(),
            source,
        })?;
    }
    apm_params::write_atomically(text, cache_path).map_err(|e| match e {
        apm_params::ParamFileError::Io { source, .. } => DocError::CacheWrite {
            path: cache_path.to_path_buf(),
            source,
        },
        other => DocError::ParamFile(other),
    })?;
    tracing::info!("Saved parameter documentation to {}", cache_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapSource {
        bodies: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl DocumentSource for MapSource {
        fn get(&self, url: &str) -> Result<String, SourceError> {
            self.requested.borrow_mut().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| SourceError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn request(dir: &Path) -> FetchRequest<'_> {
        FetchRequest {
            directory: dir,
            filename: "apm.pdef.xml",
            primary_url: "https://example.test/stable/apm.pdef.xml".to_string(),
            fallback_url: Some("https://example.test/fallback/apm.pdef.xml".to_string()),
            vehicle: VehicleType::ArduCopter,
        }
    }

    #[test]
    fn cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("apm.pdef.xml"), "<paramfile/>").unwrap();
        let fetcher =
            DocumentFetcher::new(MapSource::default()).with_working_dir(dir.path().join("cwd"));

        let doc = fetcher.fetch(&request(dir.path())).unwrap();
        assert_eq!(doc.text, "<paramfile/>");
        assert!(matches!(doc.origin, DocumentOrigin::Cache(_)));
        assert!(fetcher.source().requested.borrow().is_empty());
    }

    #[test]
    fn working_dir_is_second() {
        let cache = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        std::fs::write(cwd.path().join("apm.pdef.xml"), "<cwd/>").unwrap();
        let fetcher = DocumentFetcher::new(MapSource::default()).with_working_dir(cwd.path());

        let doc = fetcher.fetch(&request(cache.path())).unwrap();
        assert_eq!(doc.text, "<cwd/>");
        assert!(matches!(doc.origin, DocumentOrigin::WorkingDir(_)));
    }

    #[test]
    fn falls_back_in_order_and_persists() {
        let cache = tempfile::tempdir().unwrap();
        let mut source = MapSource::default();
        source.bodies.insert(
            VehicleType::ArduCopter.dev_fallback_url(),
            "<dev/>".to_string(),
        );
        let fetcher = DocumentFetcher::new(source).with_working_dir(cache.path().join("none"));

        let doc = fetcher.fetch(&request(cache.path())).unwrap();
        assert_eq!(doc.text, "<dev/>");
        assert_eq!(
            *fetcher.source().requested.borrow(),
            vec![
                "https://example.test/stable/apm.pdef.xml".to_string(),
                "https://example.test/fallback/apm.pdef.xml".to_string(),
                VehicleType::ArduCopter.dev_fallback_url(),
            ]
        );
        assert_eq!(
            std::fs::read_to_string(cache.path().join("apm.pdef.xml")).unwrap(),
            "<dev/>"
        );
    }

    #[test]
    fn exhausted_chain_reports_last_url() {
        let cache = tempfile::tempdir().unwrap();
        let fetcher = DocumentFetcher::new(MapSource::default())
            .with_working_dir(cache.path().join("none"));

        let err = fetcher.fetch(&request(cache.path())).unwrap_err();
        match err {
            DocError::FetchExhausted { last_url, cache_path } => {
                assert_eq!(last_url, VehicleType::ArduCopter.dev_fallback_url());
                assert_eq!(cache_path, cache.path().join("apm.pdef.xml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unwritable_cache_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("not_a_dir"), "").unwrap();
        let cache = root.path().join("not_a_dir").join("sub");
        let mut source = MapSource::default();
        source.bodies.insert(
            "https://example.test/stable/apm.pdef.xml".to_string(),
            "<stable/>".to_string(),
        );
        let fetcher = DocumentFetcher::new(source).with_working_dir(root.path().join("none"));

        let err = fetcher.fetch(&request(&cache)).unwrap_err();
        match err {
            DocError::CacheWrite { path, .. } => assert_eq!(path, cache.join("apm.pdef.xml")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fetcher.source().requested.borrow().len(), 1);
    }

    #[test]
    fn http_source_builds_with_proxies() {
        let config = FetchConfig::default().with_proxies(crate::config::ProxySettings {
            http: Some("http://proxy.local:3128".to_string()),
            https: Some("http://proxy.local:3128".to_string()),
            no_proxy: Some("localhost,127.0.0.1".to_string()),
        });
        assert!(HttpDocumentSource::new(&config).is_ok());
    }
}
