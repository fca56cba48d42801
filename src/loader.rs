//! Document loading from files, strings, and HTTP URLs.
//!
//! The resolver fetches external documents through [`DocumentLoader`], so
//! callers decide where `other.json#/...` comes from.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::SchemaDocument;

#[cfg(feature = "remote")]
use std::cell::OnceCell;
#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies the JSON of an external document named by a reference.
pub trait DocumentLoader {
    /// Load the document at `location` (the part of a `$ref` before `#`).
    fn load(&self, location: &str) -> Result<Value, SchemaError>;
}

/// Loads relative locations from a base directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
}

impl FileLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl DocumentLoader for FileLoader {
    fn load(&self, location: &str) -> Result<Value, SchemaError> {
        let location = location.strip_prefix("file://").unwrap_or(location);
        load_value(&self.base_dir.join(location))
    }
}

/// Fetches `http://` and `https://` locations.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct UrlLoader {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl UrlLoader {
    /// # Errors
    ///
    /// Returns `SchemaError::NetworkError` if the HTTP client can't be built.
    pub fn new() -> Result<Self, SchemaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| SchemaError::NetworkError {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "remote")]
impl DocumentLoader for UrlLoader {
    fn load(&self, location: &str) -> Result<Value, SchemaError> {
        fetch(&self.client, location)
    }
}

/// URLs go over HTTP (with the `remote` feature), everything else to disk.
///
/// The HTTP client is built on first use and shared by every later fetch.
#[derive(Debug, Clone)]
pub struct AutoLoader {
    files: FileLoader,
    #[cfg(feature = "remote")]
    urls: OnceCell<Option<UrlLoader>>,
}

impl AutoLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: FileLoader::new(base_dir),
            #[cfg(feature = "remote")]
            urls: OnceCell::new(),
        }
    }

    /// Loader for the external references of the document at `source`.
    /// Relative locations resolve against the file's directory.
    pub fn for_source(source: &str) -> Self {
        let base_dir = if is_url(source) {
            PathBuf::from(".")
        } else {
            Path::new(source)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        Self::new(base_dir)
    }

    #[cfg(feature = "remote")]
    fn load_url(&self, location: &str) -> Result<Value, SchemaError> {
        match self.urls.get_or_init(|| UrlLoader::new().ok()) {
            Some(urls) => urls.load(location),
            // Client construction failed; report its error.
            None => load_value_url(location),
        }
    }

    #[cfg(not(feature = "remote"))]
    fn load_url(&self, location: &str) -> Result<Value, SchemaError> {
        load_value_url_or_missing(location)
    }
}

impl DocumentLoader for AutoLoader {
    fn load(&self, location: &str) -> Result<Value, SchemaError> {
        if is_url(location) {
            self.load_url(location)
        } else {
            self.files.load(location)
        }
    }
}

/// Read a file as text.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::ReadError` if it can't be read.
pub fn read_text(path: &Path) -> Result<String, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| SchemaError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a JSON value from a file path.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::MalformedDocument` if the file isn't valid JSON.
pub fn load_value(path: &Path) -> Result<Value, SchemaError> {
    let content = read_text(path)?;
    load_value_str(&content)
}

/// Load a JSON value from a string.
pub fn load_value_str(content: &str) -> Result<Value, SchemaError> {
    serde_json::from_str(content).map_err(|source| SchemaError::MalformedDocument { source })
}

/// Load a JSON value from an HTTP/HTTPS URL.
///
/// # Errors
///
/// Returns `SchemaError::NetworkError` if the request fails or the
/// response isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_value_url(url: &str) -> Result<Value, SchemaError> {
    let loader = UrlLoader::new()?;
    loader.load(url)
}

#[cfg(feature = "remote")]
fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<Value, SchemaError> {
    let network = |source| SchemaError::NetworkError {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().map_err(network)?;
    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(network)?;
    response.json().map_err(network)
}

fn load_value_url_or_missing(url: &str) -> Result<Value, SchemaError> {
    #[cfg(feature = "remote")]
    {
        load_value_url(url)
    }
    #[cfg(not(feature = "remote"))]
    {
        Err(SchemaError::FileNotFound {
            path: PathBuf::from(url),
        })
    }
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON value from a file path or URL.
pub fn load_value_auto(source: &str) -> Result<Value, SchemaError> {
    if is_url(source) {
        load_value_url_or_missing(source)
    } else {
        load_value(Path::new(source))
    }
}

/// Load and resolve a schema document from a file path or URL.
///
/// External references are loaded relative to the source: the file's
/// directory for paths, absolute URLs only for remote sources.
pub fn load_document(source: &str) -> Result<SchemaDocument, SchemaError> {
    let value = load_value_auto(source)?;
    SchemaDocument::from_value_with_loader(&value, &AutoLoader::for_source(source))
}
