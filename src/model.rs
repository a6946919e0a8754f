//! Repository and package records
//!
//! A [`Repository`] is identified by its driver type, architecture and URL.
//! A [`Package`] keeps a shared back-reference to the repository it lives
//! in, which is how download URLs and on-disk paths are built, and is
//! identified within a set by that repository plus its filename.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use url::Url;

use crate::error::{Error, Result};

/// Sentinel filesize for packages whose size is not yet known.
pub const UNKNOWN_SIZE: i64 = -1;

/// A typed collection of packages at a URL
#[derive(Debug, Clone)]
pub struct Repository {
    /// Informational name, usually the last segment of the URL
    pub name: String,
    /// Driver type, e.g. `flat`
    pub kind: String,
    /// Architecture the repository serves
    pub arch: String,
    /// Location of the repository root, a URL or a local path
    pub url: String,
}

impl Repository {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        arch: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            arch: arch.into(),
            url: url.into(),
        }
    }

    /// URL of a file below the repository root.
    pub fn join(&self, filename: &str) -> String {
        join_url(&self.url, filename)
    }

    /// Local directory of the repository, if it lives on this machine.
    pub fn local_path(&self) -> Option<PathBuf> {
        local_path(&self.url)
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.arch == other.arch && self.url == other.url
    }
}

impl Eq for Repository {}

impl Hash for Repository {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.arch.hash(state);
        self.url.hash(state);
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.url, self.kind, self.arch)
    }
}

/// A single installable artifact belonging to one repository
#[derive(Debug, Clone)]
pub struct Package {
    /// Repository the package file lives in
    pub repository: Arc<Repository>,
    pub name: String,
    pub version: String,
    /// Path of the package file relative to the repository root
    pub filename: String,
    /// Size in bytes, or [`UNKNOWN_SIZE`]
    pub filesize: i64,
    /// Names of packages this one depends on
    pub requires: Vec<String>,
}

impl Package {
    pub fn new(
        repository: Arc<Repository>,
        name: impl Into<String>,
        version: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            name: name.into(),
            version: version.into(),
            filename: filename.into(),
            filesize: UNKNOWN_SIZE,
            requires: Vec::new(),
        }
    }

    pub fn with_size(mut self, filesize: i64) -> Self {
        self.filesize = filesize;
        self
    }

    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_known_size(&self) -> bool {
        self.filesize >= 0
    }

    /// Size hint for the transport, `None` while unknown.
    pub fn size_hint(&self) -> Option<u64> {
        u64::try_from(self.filesize).ok()
    }

    /// Where the package file can be fetched from.
    pub fn url(&self) -> String {
        self.repository.join(&self.filename)
    }

    /// The filename as a path that stays below the repository root.
    ///
    /// Absolute filenames and `..` segments are rejected, since the index
    /// that supplied them is not trusted.
    pub fn relative_path(&self) -> Result<PathBuf> {
        let mut path = PathBuf::new();
        for component in Path::new(&self.filename).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) | Component::ParentDir => {
                    return Err(Error::Path {
                        message: format!(
                            "package filename escapes the repository root: {}",
                            self.filename
                        ),
                    });
                }
            }
        }
        if path.as_os_str().is_empty() {
            return Err(Error::Path {
                message: format!("package {} has an empty filename", self.name),
            });
        }
        Ok(path)
    }

    /// Local file of the package, `None` if its repository is remote.
    pub fn local_path(&self) -> Result<Option<PathBuf>> {
        let Some(root) = self.repository.local_path() else {
            return Ok(None);
        };
        Ok(Some(root.join(self.relative_path()?)))
    }

    /// The same package re-homed onto `repository`.
    pub fn rebased(&self, repository: &Arc<Repository>) -> Package {
        Package {
            repository: Arc::clone(repository),
            ..self.clone()
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename && self.repository == other.repository
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repository.hash(state);
        self.filename.hash(state);
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} ({})", self.name, self.version, self.filename)
    }
}

/// Joins `filename` below `base`, which may be a URL or a local path.
pub fn join_url(base: &str, filename: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        filename.trim_start_matches('/')
    )
}

/// Resolves a repository location to a local directory.
///
/// Plain paths are returned as-is, `file://` URLs are converted, and any
/// other scheme yields `None`.
pub fn local_path(location: &str) -> Option<PathBuf> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        // Single-letter schemes are Windows drive prefixes
        Ok(url) if url.scheme().len() > 1 => None,
        _ => Some(PathBuf::from(location)),
    }
}

/// Turns a local path into a `file://` URL, leaving URLs untouched.
pub fn to_location(location: &str) -> Result<String> {
    if local_path(location).is_some() && !location.starts_with("file:") {
        let path = Path::new(location);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let url = Url::from_file_path(&absolute).map_err(|_| Error::Path {
            message: format!("cannot express {} as a URL", absolute.display()),
        })?;
        Ok(url.to_string())
    } else {
        Ok(location.to_string())
    }
}
