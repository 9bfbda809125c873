//! Fetch module - Downloads term exports into scoped temporary files
//!
//! A download lives in a `NamedTempFile`, so it is removed when the handle is
//! closed or dropped, including on early returns from later stages.

use reqwest::blocking::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Suffix for downloads whose URL carries no extension.
const DEFAULT_SUFFIX: &str = ".xlsx";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to store download of {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Local export {0} does not exist")]
    MissingFile(PathBuf),
}

/// Where a term export comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    Remote(Url),
    Local(PathBuf),
}

impl TableSource {
    /// `http`/`https` URLs are downloaded; `file://` URLs and plain paths
    /// are read in place.
    pub fn parse(source: &str) -> Self {
        match Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => TableSource::Remote(url),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(TableSource::Local)
                .unwrap_or_else(|_| TableSource::Local(PathBuf::from(source))),
            _ => TableSource::Local(PathBuf::from(source)),
        }
    }
}

/// A term export on local disk, ready for the loader.
#[derive(Debug)]
pub enum FetchedTable {
    /// Downloaded copy, deleted on close or drop.
    Temporary(NamedTempFile),
    /// Caller-owned file, never deleted.
    Local(PathBuf),
}

impl FetchedTable {
    pub fn path(&self) -> &Path {
        match self {
            FetchedTable::Temporary(file) => file.path(),
            FetchedTable::Local(path) => path,
        }
    }

    /// Release the handle, deleting a downloaded copy.
    pub fn close(self) -> std::io::Result<()> {
        match self {
            FetchedTable::Temporary(file) => {
                let path = file.path().to_path_buf();
                file.close()?;
                debug!(path = %path.display(), "removed temporary export");
                Ok(())
            }
            FetchedTable::Local(_) => Ok(()),
        }
    }
}

/// Blocking single-attempt downloader.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Make the export available on disk. No retries: any failure is final.
    pub fn fetch(&self, source: &TableSource) -> Result<FetchedTable, FetchError> {
        match source {
            TableSource::Remote(url) => self.download(url),
            TableSource::Local(path) => {
                if !path.is_file() {
                    return Err(FetchError::MissingFile(path.clone()));
                }
                info!(path = %path.display(), "using local export");
                Ok(FetchedTable::Local(path.clone()))
            }
        }
    }

    fn download(&self, url: &Url) -> Result<FetchedTable, FetchError> {
        let http_error = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let bytes = self
            .client
            .get(url.clone())
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.bytes())
            .map_err(http_error)?;

        let file = write_temp(&bytes, &download_suffix(url)).map_err(|source| FetchError::Write {
            url: url.to_string(),
            source,
        })?;
        info!(
            url = %url,
            bytes = bytes.len(),
            path = %file.path().display(),
            "downloaded export"
        );
        Ok(FetchedTable::Temporary(file))
    }
}

/// File suffix for a download, taken from the URL path so the loader can
/// pick the right decoder.
fn download_suffix(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_SUFFIX.to_string())
}

fn write_temp(bytes: &[u8], suffix: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("enrollment-")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sources() {
        let remote = TableSource::parse("https://registrar.example.edu/exports/spring-2019.xlsx");
        assert!(matches!(remote, TableSource::Remote(ref url) if url.host_str() == Some("registrar.example.edu")));

        assert_eq!(
            TableSource::parse("data/spring-2018.csv"),
            TableSource::Local(PathBuf::from("data/spring-2018.csv"))
        );
        assert_eq!(
            TableSource::parse("file:///tmp/spring-2018.xlsx"),
            TableSource::Local(PathBuf::from("/tmp/spring-2018.xlsx"))
        );
    }

    #[test]
    fn suffix_follows_url_extension() {
        let url = Url::parse("https://example.edu/a/Spring2019.XLS?download=1").unwrap();
        assert_eq!(download_suffix(&url), ".xls");
        let url = Url::parse("https://example.edu/report.csv").unwrap();
        assert_eq!(download_suffix(&url), ".csv");
        let url = Url::parse("https://example.edu/export").unwrap();
        assert_eq!(download_suffix(&url), DEFAULT_SUFFIX);
    }

    #[test]
    fn temporary_export_is_removed_on_close() {
        let file = write_temp(b"course_id\n", ".csv").unwrap();
        let table = FetchedTable::Temporary(file);
        let path = table.path().to_path_buf();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with(".csv"));

        table.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn temporary_export_is_removed_on_drop() {
        let path = {
            let table = FetchedTable::Temporary(write_temp(b"x", ".xlsx").unwrap());
            table.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn local_sources_are_left_in_place() {
        let existing = tempfile::NamedTempFile::new().unwrap();
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();

        let table = fetcher
            .fetch(&TableSource::Local(existing.path().to_path_buf()))
            .unwrap();
        assert_eq!(table.path(), existing.path());
        table.close().unwrap();
        assert!(existing.path().exists());
    }

    #[test]
    fn missing_local_source_is_a_retrieval_error() {
        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&TableSource::Local(PathBuf::from("/nonexistent/spring.xlsx")))
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingFile(_)));
    }
}
