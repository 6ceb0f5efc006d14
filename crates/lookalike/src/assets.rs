//! Artifact retrieval and persistence.
//!
//! [`AssetStore`] is the seam between the pipeline and wherever images,
//! templates and reports live. [`NativeAssetStore`] serves local paths,
//! `file://` URIs and (with the `remote` feature) `http(s)://` locations.

use crate::result::{LookalikeError, LookalikeResult};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Default timeout for remote retrieval
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch, save and folder-creation capability
pub trait AssetStore: Send + Sync + fmt::Debug {
    /// Open a byte stream for a path or URI.
    ///
    /// Unreachable locators fail with [`LookalikeError::Retrieval`]; blank or
    /// unsupported ones with [`LookalikeError::InvalidArgument`].
    fn get(&self, locator: &str) -> LookalikeResult<Box<dyn Read + Send>>;

    /// Write bytes to a path, replacing any existing file
    fn save_bytes(&self, bytes: &[u8], path: &Path) -> LookalikeResult<()>;

    /// Write text to a path, replacing any existing file
    fn save_text(&self, contents: &str, path: &Path) -> LookalikeResult<()>;

    /// Create a folder and any missing parents
    fn create_folder(&self, path: &Path) -> LookalikeResult<()>;

    /// Remove a file. A file that is already gone is not an error.
    fn delete_file(&self, path: &Path) -> LookalikeResult<()>;

    /// Read a locator fully. The stream is closed before returning.
    fn fetch_bytes(&self, locator: &str) -> LookalikeResult<Vec<u8>> {
        let mut stream = self.get(locator)?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| LookalikeError::retrieval(locator, e.to_string()))?;
        Ok(bytes)
    }
}

/// Where a locator points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Filesystem path (plain or from a `file://` URI)
    File(PathBuf),
    /// Network location
    Remote(Url),
}

impl Locator {
    /// Classify a locator string
    ///
    /// # Errors
    ///
    /// Returns [`LookalikeError::InvalidArgument`] for blank locators and
    /// unsupported schemes
    pub fn parse(locator: &str) -> LookalikeResult<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(LookalikeError::invalid_argument(
                "Null or blank locator passed to get.",
            ));
        }

        match Url::parse(trimmed) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Remote(url)),
                "file" => url.to_file_path().map(Self::File).map_err(|()| {
                    LookalikeError::invalid_argument(format!(
                        "file URI {trimmed} has no local path"
                    ))
                }),
                // Windows drive letters parse as one-letter schemes
                scheme if scheme.len() == 1 => Ok(Self::File(PathBuf::from(trimmed))),
                scheme => Err(LookalikeError::invalid_argument(format!(
                    "unsupported locator scheme '{scheme}' in {trimmed}"
                ))),
            },
            Err(_) => Ok(Self::File(PathBuf::from(trimmed))),
        }
    }

    /// Extension of the final path segment, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Self::File(path) => path.file_name()?.to_string_lossy().into_owned(),
            Self::Remote(url) => url.path_segments()?.last()?.to_string(),
        };
        Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
    }
}

/// Asset store backed by the local filesystem and, optionally, HTTP
#[derive(Debug, Clone)]
pub struct NativeAssetStore {
    timeout: Duration,
}

impl Default for NativeAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeAssetStore {
    /// Create a store with the default remote timeout
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Set the remote retrieval timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Remote retrieval timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Copy or download a locator into `output_directory` under a random
    /// name that keeps the original extension. Returns the new path.
    pub fn fetch_to_random_filename(
        &self,
        locator: &str,
        output_directory: &Path,
    ) -> LookalikeResult<PathBuf> {
        self.create_folder(output_directory)?;
        let parsed = Locator::parse(locator)?;
        let mut name = Uuid::new_v4().simple().to_string();
        if let Some(ext) = parsed.extension() {
            name = format!("{name}.{ext}");
        }
        let destination = output_directory.join(name);

        let mut stream = self.get(locator)?;
        let mut file = File::create(&destination)
            .map_err(|e| LookalikeError::persistence(destination.display().to_string(), e.to_string()))?;
        if let Err(e) = io::copy(&mut stream, &mut file) {
            drop(file);
            if let Err(cleanup) = self.delete_file(&destination) {
                tracing::warn!(path = %destination.display(), error = %cleanup, "could not remove partial download");
            }
            return Err(LookalikeError::retrieval(locator, e.to_string()));
        }
        tracing::debug!(locator, destination = %destination.display(), "fetched to random filename");
        Ok(destination)
    }

    #[cfg(feature = "remote")]
    fn open_remote(&self, locator: &str, url: Url) -> LookalikeResult<Box<dyn Read + Send>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LookalikeError::retrieval(locator, e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .map_err(|e| LookalikeError::retrieval(locator, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            tracing::info!(locator, %status, "remote locator returned an error status");
            return Err(LookalikeError::retrieval(
                locator,
                format!("status code was {status}"),
            ));
        }
        Ok(Box::new(response))
    }

    #[cfg(not(feature = "remote"))]
    fn open_remote(&self, locator: &str, _url: Url) -> LookalikeResult<Box<dyn Read + Send>> {
        Err(LookalikeError::invalid_argument(format!(
            "{locator} is remote but lookalike was built without the `remote` feature"
        )))
    }
}

impl AssetStore for NativeAssetStore {
    fn get(&self, locator: &str) -> LookalikeResult<Box<dyn Read + Send>> {
        tracing::debug!(locator, "getting");
        match Locator::parse(locator)? {
            Locator::Remote(url) => self.open_remote(locator, url),
            Locator::File(path) => {
                let file = File::open(&path)
                    .map_err(|e| LookalikeError::retrieval(locator, e.to_string()))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }

    fn save_bytes(&self, bytes: &[u8], path: &Path) -> LookalikeResult<()> {
        fs::write(path, bytes)
            .map_err(|e| LookalikeError::persistence(path.display().to_string(), e.to_string()))
    }

    fn save_text(&self, contents: &str, path: &Path) -> LookalikeResult<()> {
        self.save_bytes(contents.as_bytes(), path)
    }

    fn create_folder(&self, path: &Path) -> LookalikeResult<()> {
        fs::create_dir_all(path)
            .map_err(|e| LookalikeError::persistence(path.display().to_string(), e.to_string()))
    }

    fn delete_file(&self, path: &Path) -> LookalikeResult<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(LookalikeError::persistence(
                path.display().to_string(),
                e.to_string(),
            )),
            _ => Ok(()),
        }
    }
}
