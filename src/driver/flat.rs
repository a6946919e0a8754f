//! The `flat` repository format
//!
//! A flat repository is a directory, local or served over HTTP, whose
//! package list lives in a single `packages.json` at its root:
//!
//! ```json
//! {
//!   "packages": [
//!     { "name": "bash", "version": "5.2.0", "filename": "pool/bash_5.2.0.pkg",
//!       "size": 1203, "requires": ["libc"] }
//!   ]
//! }
//! ```
//!
//! `size` may be omitted when unknown; it is filled in once the package has
//! been copied. The format has no source packages or localisation data, so
//! the corresponding clone flags have no effect.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use super::RepositoryDriver;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::model::{local_path, to_location, Package, Repository, UNKNOWN_SIZE};

/// File name of the package index at a repository root.
pub const INDEX_FILE: &str = "packages.json";

const DRIVER_NAME: &str = "flat";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    #[serde(default)]
    packages: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    version: String,
    filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<String>,
}

/// Driver for repositories described by a single JSON index
#[derive(Debug, Default)]
pub struct FlatDriver;

impl FlatDriver {
    pub fn new() -> Self {
        Self
    }

    fn read_index(path: &Path) -> Result<Index> {
        let content = fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| Error::Index {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_index(path: &Path, index: &Index) -> Result<()> {
        let content = serde_json::to_vec_pretty(index)?;
        let mut part = path.as_os_str().to_os_string();
        part.push(".part");
        let part = PathBuf::from(part);
        fs::write(&part, content)?;
        fs::rename(&part, path)?;
        Ok(())
    }

    fn load_index(&self, connection: &dyn Connection, repository: &Repository) -> Result<Index> {
        if let Some(root) = repository.local_path() {
            let path = root.join(INDEX_FILE);
            if !path.exists() {
                debug!("{} has no index yet", repository.url);
                return Ok(Index::default());
            }
            return Self::read_index(&path);
        }

        let staging = tempfile::tempdir()?;
        let path = staging.path().join(INDEX_FILE);
        connection.retrieve(&repository.join(INDEX_FILE), &path, None)?;
        Self::read_index(&path)
    }

    fn driver_error(message: impl Into<String>) -> Error {
        Error::Driver {
            driver: DRIVER_NAME.to_string(),
            message: message.into(),
        }
    }
}

/// Last non-empty path segment of a locator.
fn repository_name(locator: &str) -> String {
    let path = match Url::parse(locator) {
        Ok(url) => url.path().to_string(),
        Err(_) => locator.to_string(),
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("repository")
        .to_string()
}

/// Directory below `destination` that holds the clone of `locator`.
///
/// Remote origins map to `<host>[_<port>]/<path>`, local ones to their full
/// path without the root, so origins sharing a last segment stay apart.
pub fn clone_root(destination: &Path, locator: &str) -> PathBuf {
    let mut root = destination.to_path_buf();
    match Url::parse(locator) {
        Ok(url) if url.scheme() != "file" && url.scheme().len() > 1 => {
            match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => root.push(format!("{}_{}", host, port)),
                (Some(host), None) => root.push(host),
                _ => {}
            }
            for segment in url.path().split('/') {
                if !segment.is_empty() && segment != "." && segment != ".." {
                    root.push(segment);
                }
            }
        }
        _ => {
            let path = local_path(locator).unwrap_or_else(|| PathBuf::from(locator));
            for component in path.components() {
                if let Component::Normal(segment) = component {
                    root.push(segment);
                }
            }
        }
    }
    root
}

impl RepositoryDriver for FlatDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    fn parse_urls(&self, urls: &[String]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut locators = Vec::with_capacity(urls.len());
        for url in urls {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                continue;
            }
            let locator = to_location(trimmed)?.trim_end_matches('/').to_string();
            if seen.insert(locator.clone()) {
                locators.push(locator);
            }
        }
        Ok(locators)
    }

    fn get_repository(
        &self,
        _connection: &dyn Connection,
        locator: &str,
        arch: &str,
        consumer: &mut dyn FnMut(Repository),
    ) -> Result<()> {
        consumer(Repository::new(
            repository_name(locator),
            DRIVER_NAME,
            arch,
            locator,
        ));
        Ok(())
    }

    fn get_packages(
        &self,
        connection: &dyn Connection,
        repository: &Arc<Repository>,
        consumer: &mut dyn FnMut(Package),
    ) -> Result<()> {
        let index = self.load_index(connection, repository)?;
        for entry in index.packages {
            let filesize = entry
                .size
                .and_then(|s| i64::try_from(s).ok())
                .unwrap_or(UNKNOWN_SIZE);
            consumer(
                Package::new(
                    Arc::clone(repository),
                    entry.name,
                    entry.version,
                    entry.filename,
                )
                .with_size(filesize)
                .with_requires(entry.requires),
            );
        }
        Ok(())
    }

    fn rebuild_repository(
        &self,
        repository: &Arc<Repository>,
        packages: &HashSet<Package>,
    ) -> Result<()> {
        let root = repository.local_path().ok_or_else(|| {
            Self::driver_error(format!("cannot rebuild remote repository {}", repository.url))
        })?;

        let mut entries: Vec<IndexEntry> = packages
            .iter()
            .map(|p| IndexEntry {
                name: p.name.clone(),
                version: p.version.clone(),
                filename: p.filename.clone(),
                size: p.size_hint(),
                requires: p.requires.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        fs::create_dir_all(&root)?;
        Self::write_index(&root.join(INDEX_FILE), &Index { packages: entries })?;
        debug!("rebuilt {} with {} packages", repository.url, packages.len());
        Ok(())
    }

    fn clone_repository(
        &self,
        _connection: &dyn Connection,
        repository: &Arc<Repository>,
        destination: &Path,
        include_source: bool,
        include_locale: bool,
    ) -> Result<Repository> {
        if include_source || include_locale {
            debug!("flat repositories carry no source or locale data; ignoring");
        }

        let root = clone_root(destination, &repository.url);
        fs::create_dir_all(&root)?;
        let index_path = root.join(INDEX_FILE);
        if !index_path.exists() {
            Self::write_index(&index_path, &Index::default())?;
        }

        let url = root.to_str().ok_or_else(|| Error::Path {
            message: format!("non UTF-8 path: {}", root.display()),
        })?;
        Ok(Repository::new(
            repository.name.clone(),
            repository.kind.clone(),
            repository.arch.clone(),
            url,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DefaultConnection;
    use tempfile::TempDir;

    fn write_origin(dir: &Path) {
        fs::create_dir_all(dir.join("pool")).unwrap();
        fs::write(
            dir.join(INDEX_FILE),
            r#"{"packages": [
                {"name": "bash", "version": "5.2.0", "filename": "pool/bash.pkg", "size": 4, "requires": ["libc"]},
                {"name": "libc", "version": "2.39.0", "filename": "pool/libc.pkg"}
            ]}"#,
        )
        .unwrap();
    }

    fn collect_packages(repository: &Arc<Repository>) -> Vec<Package> {
        let connection = DefaultConnection::new(0).unwrap();
        let mut packages = Vec::new();
        FlatDriver::new()
            .get_packages(&connection, repository, &mut |p| packages.push(p))
            .unwrap();
        packages.sort_by(|a, b| a.filename.cmp(&b.filename));
        packages
    }

    #[test]
    fn test_repository_name() {
        assert_eq!(repository_name("http://host/ubuntu/base/"), "base");
        assert_eq!(repository_name("file:///srv/updates"), "updates");
        assert_eq!(repository_name("http://host"), "repository");
    }

    #[test]
    #[cfg(unix)]
    fn test_clone_root_keeps_host_and_full_path() {
        let destination = Path::new("/srv/mirror");
        assert_eq!(
            clone_root(destination, "http://host/a/ubuntu"),
            PathBuf::from("/srv/mirror/host/a/ubuntu")
        );
        assert_eq!(
            clone_root(destination, "http://127.0.0.1:8080/base/"),
            PathBuf::from("/srv/mirror/127.0.0.1_8080/base")
        );
        assert_eq!(
            clone_root(destination, "file:///data/b/ubuntu"),
            PathBuf::from("/srv/mirror/data/b/ubuntu")
        );
        assert_eq!(
            clone_root(destination, "/data/b/ubuntu"),
            PathBuf::from("/srv/mirror/data/b/ubuntu")
        );
    }

    #[test]
    fn test_origins_with_same_last_segment_get_separate_clones() {
        let temp = TempDir::new().unwrap();
        let connection = DefaultConnection::new(0).unwrap();
        let driver = FlatDriver::new();
        let destination = temp.path().join("mirror");

        let mut clones = Vec::new();
        for parent in ["a", "b"] {
            let dir = temp.path().join(parent).join("ubuntu");
            write_origin(&dir);
            let origin = Arc::new(Repository::new(
                "ubuntu",
                "flat",
                "x86_64",
                dir.to_str().unwrap(),
            ));
            clones.push(
                driver
                    .clone_repository(&connection, &origin, &destination, false, false)
                    .unwrap(),
            );
        }

        assert_ne!(clones[0].url, clones[1].url);
        assert!(clones.iter().all(|c| c.name == "ubuntu"));
        assert!(clones
            .iter()
            .all(|c| Path::new(&c.url).join(INDEX_FILE).exists()));
    }

    #[test]
    #[cfg(unix)]
    fn test_parse_urls_normalises_and_dedups() {
        let urls = vec![
            "/srv/base/".to_string(),
            " ".to_string(),
            "http://host/updates/".to_string(),
            "file:///srv/base".to_string(),
        ];
        let locators = FlatDriver::new().parse_urls(&urls).unwrap();
        assert_eq!(locators, vec!["file:///srv/base", "http://host/updates"]);
    }

    #[test]
    fn test_get_packages_reads_index() {
        let temp = TempDir::new().unwrap();
        write_origin(temp.path());
        let repository = Arc::new(Repository::new(
            "origin",
            "flat",
            "x86_64",
            temp.path().to_str().unwrap(),
        ));

        let packages = collect_packages(&repository);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "bash");
        assert_eq!(packages[0].filesize, 4);
        assert_eq!(packages[0].requires, vec!["libc"]);
        assert_eq!(packages[1].filesize, UNKNOWN_SIZE);
    }

    #[test]
    fn test_missing_local_index_yields_no_packages() {
        let temp = TempDir::new().unwrap();
        let repository = Arc::new(Repository::new(
            "empty",
            "flat",
            "x86_64",
            temp.path().to_str().unwrap(),
        ));
        assert!(collect_packages(&repository).is_empty());
    }

    #[test]
    fn test_clone_then_rebuild_round_trip() {
        let temp = TempDir::new().unwrap();
        let origin_dir = temp.path().join("origin");
        write_origin(&origin_dir);
        let origin = Arc::new(Repository::new(
            "origin",
            "flat",
            "x86_64",
            origin_dir.to_str().unwrap(),
        ));
        let connection = DefaultConnection::new(0).unwrap();
        let driver = FlatDriver::new();

        let clone = Arc::new(
            driver
                .clone_repository(&connection, &origin, &temp.path().join("mirror"), false, false)
                .unwrap(),
        );
        let expected = clone_root(&temp.path().join("mirror"), origin_dir.to_str().unwrap());
        assert!(expected.ends_with("origin"));
        assert!(expected.join(INDEX_FILE).exists());
        assert_eq!(clone.url, expected.to_str().unwrap());
        assert!(collect_packages(&clone).is_empty());

        let packages: HashSet<Package> = collect_packages(&origin)
            .iter()
            .map(|p| p.rebased(&clone))
            .collect();
        driver.rebuild_repository(&clone, &packages).unwrap();

        let rebuilt = collect_packages(&clone);
        assert_eq!(rebuilt.len(), 2);
        assert!(rebuilt.iter().all(|p| p.repository == clone));
    }

    #[test]
    fn test_rebuild_remote_repository_fails() {
        let remote = Arc::new(Repository::new("r", "flat", "x86_64", "http://host/r"));
        let error = FlatDriver::new()
            .rebuild_repository(&remote, &HashSet::new())
            .unwrap_err();
        assert!(matches!(error, Error::Driver { .. }));
    }

    #[test]
    fn test_malformed_index_is_index_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(INDEX_FILE), "{not json").unwrap();
        let repository = Arc::new(Repository::new(
            "bad",
            "flat",
            "x86_64",
            temp.path().to_str().unwrap(),
        ));
        let connection = DefaultConnection::new(0).unwrap();
        let error = FlatDriver::new()
            .get_packages(&connection, &repository, &mut |_| {})
            .unwrap_err();
        assert!(matches!(error, Error::Index { .. }));
    }
}
