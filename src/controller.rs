//! # Repository Controller
//!
//! The `RepositoryController` drives one [`RepositoryDriver`] for one
//! architecture. It owns no format knowledge; it sequences driver calls and
//! runs the per-repository and per-package work inside task scopes.
//!
//! ## Operations
//!
//! - **`load_repositories`** / **`load_packages`**: read-through enumeration
//!   of repositories and their packages.
//! - **`assign_packages`**: reconciles a repository's package set against a
//!   desired set, optionally deleting stale package files, then rebuilds the
//!   repository metadata.
//! - **`copy_packages`**: copies package files into a repository
//!   concurrently, then commits metadata with `assign_packages`. Metadata is
//!   only committed after every copy has succeeded.
//! - **`clone_repositories`**: clones many repositories concurrently and
//!   returns the origin-to-clone mapping.
//!
//! ## Concurrency
//!
//! Package copies run in a scope bounded by [`Context::copy_bound`];
//! repository clones run in a scope with the default bound. Both scopes fail
//! together: one failing package or repository does not stop its siblings,
//! and the failure is surfaced once they have all been attempted. Each copy
//! task holds the only mutable borrow of its own package, and each clone
//! task inserts a distinct key into the result map.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::connection::Connection;
use crate::driver::{DriverRegistry, RepositoryDriver};
use crate::error::{Error, Result};
use crate::model::{Package, Repository};
use crate::scope::TaskScope;

/// Origin repository to local clone
pub type CloneMap = HashMap<Arc<Repository>, Arc<Repository>>;

/// Shared state for one mirroring run
#[derive(Clone)]
pub struct Context {
    connection: Arc<dyn Connection>,
    copy_bound: usize,
    clone_bound: usize,
}

impl Context {
    /// Default number of concurrent package copies.
    pub const DEFAULT_COPY_BOUND: usize = 16;

    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            copy_bound: Self::DEFAULT_COPY_BOUND,
            clone_bound: crate::scope::default_bound(),
        }
    }

    /// Sets the package-copy bound; `0` removes it.
    pub fn with_copy_bound(mut self, bound: usize) -> Self {
        self.copy_bound = bound;
        self
    }

    /// Sets the repository-clone bound; `0` removes it.
    pub fn with_clone_bound(mut self, bound: usize) -> Self {
        self.clone_bound = bound;
        self
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub fn copy_bound(&self) -> usize {
        self.copy_bound
    }

    fn copy_scope(&self) -> TaskScope {
        TaskScope::new(self.copy_bound)
    }

    fn clone_scope(&self) -> TaskScope {
        TaskScope::new(self.clone_bound)
    }
}

/// Sequences driver calls for one repository type and architecture
pub struct RepositoryController {
    context: Context,
    driver: Arc<dyn RepositoryDriver>,
    arch: String,
}

impl RepositoryController {
    pub fn new(context: Context, driver: Arc<dyn RepositoryDriver>, arch: impl Into<String>) -> Self {
        Self {
            context,
            driver,
            arch: arch.into(),
        }
    }

    /// Creates a controller for the driver registered as `driver_name`.
    ///
    /// Fails with `UnsupportedDriver` if no such driver exists.
    pub fn load(
        context: Context,
        registry: &DriverRegistry,
        driver_name: &str,
        arch: impl Into<String>,
    ) -> Result<Self> {
        let driver = registry.get(driver_name)?;
        Ok(Self::new(context, driver, arch))
    }

    pub fn driver(&self) -> &dyn RepositoryDriver {
        self.driver.as_ref()
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Resolves `urls` into repositories, feeding each to `consumer`.
    pub fn load_repositories(
        &self,
        urls: &[String],
        consumer: &mut dyn FnMut(Arc<Repository>),
    ) -> Result<()> {
        let connection = self.context.connection();
        for locator in self.driver.parse_urls(urls)? {
            self.driver
                .get_repository(connection, &locator, &self.arch, &mut |r| {
                    consumer(Arc::new(r))
                })?;
        }
        Ok(())
    }

    /// Enumerates the packages of every repository, feeding each to
    /// `consumer`.
    ///
    /// Indexes are fetched in parallel; packages are delivered in
    /// repository order.
    pub fn load_packages(
        &self,
        repositories: &[Arc<Repository>],
        consumer: &mut dyn FnMut(Package),
    ) -> Result<()> {
        let connection = self.context.connection();
        let per_repository = repositories
            .par_iter()
            .map(|repository| {
                let mut packages = Vec::new();
                self.driver
                    .get_packages(connection, repository, &mut |p| packages.push(p))?;
                Ok(packages)
            })
            .collect::<Result<Vec<Vec<Package>>>>()?;

        for package in per_repository.into_iter().flatten() {
            consumer(package);
        }
        Ok(())
    }

    /// Makes `packages` the package set of `repository`.
    ///
    /// With `keep_existing`, packages already in the repository stay. Without
    /// it, every package file not in `packages` is deleted; a failed
    /// deletion is logged and leaves the file in place. Finally the
    /// repository metadata is rebuilt from the resulting set.
    pub fn assign_packages(
        &self,
        repository: &Arc<Repository>,
        packages: &[Package],
        keep_existing: bool,
    ) -> Result<()> {
        let mut assigned: HashSet<Package> =
            packages.iter().map(|p| p.rebased(repository)).collect();

        self.driver
            .get_packages(self.context.connection(), repository, &mut |existing| {
                if let Some(desired) = assigned.get(&existing) {
                    warn_on_size_mismatch(desired, &existing);
                } else if keep_existing {
                    assigned.insert(existing);
                } else {
                    remove_stale(&existing);
                }
            })?;

        self.driver.rebuild_repository(repository, &assigned)
    }

    /// Copies `packages` into `repository`, then commits its metadata.
    ///
    /// `observer` receives the byte count of every successful copy. Packages
    /// of unknown size take the transferred size. If any copy fails, the
    /// remaining copies still run, the metadata is left untouched and the
    /// failures are returned.
    pub fn copy_packages(
        &self,
        repository: &Arc<Repository>,
        packages: &mut [Package],
        keep_existing: bool,
        observer: &(dyn Fn(u64) + Sync),
    ) -> Result<()> {
        let root = repository.local_path().ok_or_else(|| Error::Path {
            message: format!("cannot copy packages into remote repository {}", repository.url),
        })?;
        let root = root.as_path();

        self.context.copy_scope().run(|section| {
            for package in packages.iter_mut() {
                section.execute(move || self.copy_package(root, package, observer));
            }
        })?;

        self.assign_packages(repository, packages, keep_existing)
    }

    /// Clones every repository below `destination`.
    ///
    /// Returns a mapping with one entry per origin repository, or the
    /// collected failures once every clone has been attempted. Two origins
    /// sharing one clone is a configuration error.
    pub fn clone_repositories(
        &self,
        repositories: &[Arc<Repository>],
        destination: &Path,
        source: bool,
        locale: bool,
    ) -> Result<CloneMap> {
        let destination = std::path::absolute(destination)?;
        let destination = destination.as_path();
        let mirrors: DashMap<Arc<Repository>, Arc<Repository>> = DashMap::new();

        self.context.clone_scope().run(|section| {
            for repository in repositories {
                let mirrors = &mirrors;
                section.execute(move || {
                    let clone = self.driver.clone_repository(
                        self.context.connection(),
                        repository,
                        destination,
                        source,
                        locale,
                    )?;
                    debug!("cloned {} to {}", repository.url, clone.url);
                    mirrors.insert(Arc::clone(repository), Arc::new(clone));
                    Ok(())
                });
            }
        })?;

        let mirrors: CloneMap = mirrors.into_iter().collect();
        ensure_distinct_clones(&mirrors)?;
        Ok(mirrors)
    }

    fn copy_package(&self, root: &Path, package: &mut Package, observer: &(dyn Fn(u64) + Sync)) -> Result<()> {
        let dst_path = root.join(package.relative_path()?);
        let src_url = package.url();
        let bytes_copied =
            self.context
                .connection()
                .retrieve(&src_url, &dst_path, package.size_hint())?;
        if !package.has_known_size() {
            package.filesize = i64::try_from(bytes_copied).unwrap_or(i64::MAX);
        }
        observer(bytes_copied);
        Ok(())
    }
}

/// Fails if two origins were cloned into the same repository.
fn ensure_distinct_clones(mirrors: &CloneMap) -> Result<()> {
    let mut claimed: HashMap<&str, &str> = HashMap::with_capacity(mirrors.len());
    for (origin, clone) in mirrors {
        if let Some(other) = claimed.insert(clone.url.as_str(), origin.url.as_str()) {
            return Err(Error::ConfigParse {
                message: format!(
                    "repositories {} and {} would both be mirrored to {}",
                    other, origin.url, clone.url
                ),
                hint: Some("each origin needs its own location in the mirror".to_string()),
            });
        }
    }
    Ok(())
}

fn warn_on_size_mismatch(desired: &Package, existing: &Package) {
    if desired.has_known_size()
        && existing.has_known_size()
        && desired.filesize != existing.filesize
    {
        warn!(
            "size of {} changed from {} to {} bytes",
            desired.filename, existing.filesize, desired.filesize
        );
    }
}

/// Deletes the file of a package that no longer belongs to its repository.
fn remove_stale(package: &Package) {
    let path = match package.local_path() {
        Ok(Some(path)) => path,
        Ok(None) => {
            warn!("cannot remove package from remote repository - {}", package.url());
            return;
        }
        Err(e) => {
            warn!("refusing to remove package {}: {}", package, e);
            return;
        }
    };
    info!("remove package - {}.", path.display());
    if let Err(e) = fs::remove_file(&path) {
        warn!("failed to remove package {}: {}", path.display(), e);
    }
}
