use crate::metrics_defs::FETCH_DURATION;
use async_trait::async_trait;
use hyper::body::Bytes;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

/// Retrieval strategy selected by a location's URL scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Http,
    File,
}

impl SourceKind {
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" | "https" => Some(SourceKind::Http),
            "file" => Some(SourceKind::File),
            _ => None,
        }
    }
}

/// Reasons an external config could not be retrieved
///
/// None of these fail a request: the handler answers with the in-repo fallback
/// and logs the error.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("unable to parse URL {location}: {source}")]
    InvalidLocation {
        location: String,
        source: url::ParseError,
    },

    #[error("the URL scheme {0} is unsupported")]
    UnsupportedScheme(String),

    #[error("{0} does not point at a local path")]
    NotALocalPath(Url),

    #[error("unable to retrieve {url}: {source}")]
    Http { url: Url, source: reqwest::Error },

    #[error("{url} responded with status {status}")]
    HttpStatus {
        url: Url,
        status: reqwest::StatusCode,
    },

    #[error("unable to read {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One retrieval strategy for external configs
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the complete content found at `location`.
    async fn fetch(&self, location: &Url) -> Result<Bytes, SourceError>;
}

/// Retrieves configs with a plain GET. No headers or credentials are added.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ConfigSource for HttpSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, location: &Url) -> Result<Bytes, SourceError> {
        let http_error = |source| SourceError::Http {
            url: location.clone(),
            source,
        };

        let response = self
            .client
            .get(location.clone())
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                url: location.clone(),
                status,
            });
        }

        response.bytes().await.map_err(http_error)
    }
}

/// Reads configs from the local filesystem.
pub struct FileSource;

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, location: &Url) -> Result<Bytes, SourceError> {
        let path = location
            .to_file_path()
            .map_err(|()| SourceError::NotALocalPath(location.clone()))?;

        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(source) => Err(SourceError::File { path, source }),
        }
    }
}

/// Parses a registered location into an absolute URL.
pub fn parse_location(location: &str) -> Result<Url, SourceError> {
    Url::parse(location).map_err(|source| SourceError::InvalidLocation {
        location: location.to_owned(),
        source,
    })
}

/// Checks a registered location without retrieving it.
pub fn check_location(location: &str) -> Result<Url, SourceError> {
    let url = parse_location(location)?;
    if SourceKind::for_scheme(url.scheme()).is_none() {
        return Err(SourceError::UnsupportedScheme(url.scheme().to_owned()));
    }
    Ok(url)
}

/// Dispatches a location to the source handling its scheme.
pub struct Sources {
    http: HttpSource,
    file: FileSource,
}

impl Sources {
    pub fn new(http_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: HttpSource::new(http_timeout)?,
            file: FileSource,
        })
    }

    pub fn for_scheme(&self, scheme: &str) -> Option<&dyn ConfigSource> {
        let source: &dyn ConfigSource = match SourceKind::for_scheme(scheme)? {
            SourceKind::Http => &self.http,
            SourceKind::File => &self.file,
        };
        Some(source)
    }

    /// Retrieves the config registered at `location`.
    pub async fn fetch(&self, location: &str) -> Result<Bytes, SourceError> {
        let url = parse_location(location)?;
        let source = self
            .for_scheme(url.scheme())
            .ok_or_else(|| SourceError::UnsupportedScheme(url.scheme().to_owned()))?;

        let start = Instant::now();
        let result = source.fetch(&url).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        shared::histogram!(FETCH_DURATION, "scheme" => source.name(), "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());

        result
    }
}
