//! # Repository Drivers
//!
//! A driver knows one repository format: how to turn user-supplied
//! locators into repositories, enumerate a repository's packages, clone a
//! repository's structure to local storage and rebuild its metadata from a
//! package set. The mirroring engine only ever talks to drivers through the
//! [`RepositoryDriver`] trait, which keeps format parsing out of the
//! orchestration code and lets tests substitute recording mocks.
//!
//! Drivers are looked up by type name in a [`DriverRegistry`]. The registry
//! is built once at start-up and is read-only afterwards; asking for an
//! unregistered name is a configuration error.

pub mod flat;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::model::{Package, Repository};

pub use flat::FlatDriver;

/// Format-specific repository behaviour
pub trait RepositoryDriver: Send + Sync {
    /// Type name the driver is registered under.
    fn name(&self) -> &str;

    /// Normalises user-supplied locators into the driver's native syntax.
    fn parse_urls(&self, urls: &[String]) -> Result<Vec<String>>;

    /// Resolves a locator into repositories, feeding each to `consumer`.
    fn get_repository(
        &self,
        connection: &dyn Connection,
        locator: &str,
        arch: &str,
        consumer: &mut dyn FnMut(Repository),
    ) -> Result<()>;

    /// Enumerates the packages of `repository`, feeding each to `consumer`.
    fn get_packages(
        &self,
        connection: &dyn Connection,
        repository: &Arc<Repository>,
        consumer: &mut dyn FnMut(Package),
    ) -> Result<()>;

    /// Rewrites the metadata of `repository` to list exactly `packages`.
    fn rebuild_repository(
        &self,
        repository: &Arc<Repository>,
        packages: &HashSet<Package>,
    ) -> Result<()>;

    /// Creates a local clone of `repository` below `destination`.
    ///
    /// The clone starts without packages; they are copied in separately.
    fn clone_repository(
        &self,
        connection: &dyn Connection,
        repository: &Arc<Repository>,
        destination: &Path,
        include_source: bool,
        include_locale: bool,
    ) -> Result<Repository>;
}

/// Name-to-driver table, populated once at start-up
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn RepositoryDriver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in driver.
    pub fn with_defaults() -> Self {
        Self::new().with(Arc::new(FlatDriver::new()))
    }

    /// Adds `driver` under its own name, replacing any previous entry.
    pub fn with(mut self, driver: Arc<dyn RepositoryDriver>) -> Self {
        self.drivers.insert(driver.name().to_string(), driver);
        self
    }

    /// Looks up the driver registered as `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn RepositoryDriver>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnsupportedDriver {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}
