// Acquisition of the raw company store: download once, reuse afterwards.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Anything that can turn a location into the bytes of a store file.
pub trait Fetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher. Any non-success status is a fetch failure.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::fetch("<client>", e))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(location)
            .send()
            .map_err(|e| Error::fetch(location, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(location, format!("server responded {}", status)));
        }

        let body = response.bytes().map_err(|e| Error::fetch(location, e))?;
        Ok(body.to_vec())
    }
}

/// Download `url` to `path` unless `path` already exists.
///
/// The payload is written to `<path>.part` and renamed into place, so an
/// interrupted download never leaves a truncated store behind.
/// Returns `true` when a download happened.
pub fn ensure_downloaded(fetcher: &dyn Fetcher, url: &str, path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    info!(url, path = %path.display(), "downloading company store");
    let bytes = fetcher.fetch(url)?;

    let partial = partial_path(path);
    if let Err(e) = fs::write(&partial, &bytes).and_then(|_| fs::rename(&partial, path)) {
        let _ = fs::remove_file(&partial);
        return Err(Error::fetch(url, e));
    }

    info!(bytes = bytes.len(), path = %path.display(), "company store downloaded");
    Ok(true)
}

/// `companies.db` → `companies.db.part`
pub(crate) fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    pub(crate) struct FakeFetcher {
        pub payload: std::result::Result<Vec<u8>, String>,
        pub calls: Cell<usize>,
    }

    impl FakeFetcher {
        pub(crate) fn ok(payload: Vec<u8>) -> Self {
            Self {
                payload: Ok(payload),
                calls: Cell::new(0),
            }
        }

        pub(crate) fn failing(reason: &str) -> Self {
            Self {
                payload: Err(reason.to_string()),
                calls: Cell::new(0),
            }
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, location: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.payload
                .clone()
                .map_err(|reason| Error::fetch(location, reason))
        }
    }

    #[test]
    fn test_downloads_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.db");
        let fetcher = FakeFetcher::ok(b"payload".to_vec());

        let downloaded = ensure_downloaded(&fetcher, "https://example.test/companies.db", &path).unwrap();

        assert!(downloaded);
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(!partial_path(&path).exists());
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("data/companies.db")),
            PathBuf::from("data/companies.db.part")
        );
        assert_eq!(partial_path(Path::new("companies")), PathBuf::from("companies.part"));
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("companies.db");
        let fetcher = FakeFetcher::ok(b"payload".to_vec());

        let err = ensure_downloaded(&fetcher, "https://example.test/companies.db", &path).unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::FetchFailure);
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_skips_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.db");
        fs::write(&path, b"already here").unwrap();
        let fetcher = FakeFetcher::ok(b"new".to_vec());

        let downloaded = ensure_downloaded(&fetcher, "https://example.test/companies.db", &path).unwrap();

        assert!(!downloaded);
        assert_eq!(fetcher.calls.get(), 0);
        assert_eq!(fs::read(&path).unwrap(), b"already here");
    }

    #[test]
    fn test_failed_fetch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.db");
        let fetcher = FakeFetcher::failing("server responded 404 Not Found");

        let err = ensure_downloaded(&fetcher, "https://example.test/missing.db", &path).unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::FetchFailure);
        assert!(err.to_string().contains("404"));
        assert!(!path.exists());
    }
}
