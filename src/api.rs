//! # Repository API
//!
//! `RepositoryApi` is the high-level entry point for cloning one group of
//! repositories. It builds on the [`RepositoryController`] primitives:
//!
//! 1. load the origin repositories and their packages;
//! 2. narrow the package set when requirements are given (see below);
//! 3. clone every origin repository under the destination;
//! 4. copy each repository's packages into its clone and commit metadata;
//! 5. report a [`Stat`] of copied and considered packages.
//!
//! ## Partial mirrors
//!
//! Without requirements every package is mirrored. With requirements only
//! the packages matching a requirement are kept, together with everything
//! they transitively require. Packages required by the `dependencies`
//! repositories (typically a derived repository built on top of this one)
//! but not provided by them are added as extra roots, so the derived
//! repository stays installable against the partial mirror.
//!
//! ## Failures
//!
//! A repository whose copies fail does not stop the others. Once every
//! repository has been processed the failures are returned as
//! [`Error::Incomplete`], which carries the statistics of the work that did
//! complete.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use semver::{Version, VersionReq};

use crate::controller::RepositoryController;
use crate::error::{Error, Result};
use crate::model::{Package, Repository};
use crate::stat::Stat;

/// A package name with an optional version constraint
///
/// Parsed from `name` or `name <constraint>`, e.g. `coreutils >= 8.0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub version: Option<VersionReq>,
}

impl Requirement {
    /// True when `package` has this name and satisfies the constraint.
    ///
    /// Versions that are not valid semver never satisfy a constraint.
    pub fn matches(&self, package: &Package) -> bool {
        if package.name != self.name {
            return false;
        }
        match &self.version {
            None => true,
            Some(req) => Version::parse(&package.version).is_ok_and(|v| req.matches(&v)),
        }
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_whitespace() || "<>=~^".contains(c))
            .unwrap_or(s.len());
        let (name, constraint) = s.split_at(split);
        if name.is_empty() {
            return Err(Error::config(format!("requirement '{}' has no package name", s)));
        }
        let constraint = constraint.trim();
        let version = if constraint.is_empty() {
            None
        } else {
            Some(VersionReq::parse(constraint)?)
        };
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(req) => write!(f, "{} {}", self.name, req),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Options for [`RepositoryApi::clone_repositories`]
#[derive(Debug, Clone, Copy)]
pub struct CloneOptions {
    /// Keep packages already present in the clones
    pub keep_existing: bool,
    pub include_source: bool,
    pub include_locale: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            keep_existing: true,
            include_source: false,
            include_locale: false,
        }
    }
}

/// High-level repository operations for one driver
pub struct RepositoryApi {
    controller: RepositoryController,
}

impl RepositoryApi {
    pub fn new(controller: RepositoryController) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &RepositoryController {
        &self.controller
    }

    /// Resolves `urls` into repositories.
    pub fn load_repositories(&self, urls: &[String]) -> Result<Vec<Arc<Repository>>> {
        let mut repositories = Vec::new();
        self.controller
            .load_repositories(urls, &mut |r| repositories.push(r))?;
        Ok(repositories)
    }

    /// Packages of `repositories`, narrowed by `requirements` if given.
    pub fn get_packages(
        &self,
        repositories: &[Arc<Repository>],
        requirements: Option<&[Requirement]>,
        dependencies: Option<&[String]>,
    ) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        self.controller
            .load_packages(repositories, &mut |p| packages.push(p))?;

        let Some(requirements) = requirements else {
            if dependencies.is_some_and(|d| !d.is_empty()) {
                debug!("no requirements given; mirroring every package");
            }
            return Ok(packages);
        };

        let mut dependency_packages = Vec::new();
        if let Some(urls) = dependencies.filter(|d| !d.is_empty()) {
            let dependency_repositories = self.load_repositories(urls)?;
            self.controller
                .load_packages(&dependency_repositories, &mut |p| dependency_packages.push(p))?;
        }

        Ok(select_packages(packages, requirements, &dependency_packages))
    }

    /// Clones the repositories at `urls` into `destination`.
    ///
    /// Returns the number of packages copied out of the number selected.
    /// If some copies failed, the other repositories are still processed
    /// and `Error::Incomplete` carries the partial statistics.
    pub fn clone_repositories(
        &self,
        urls: &[String],
        destination: &Path,
        dependencies: Option<&[String]>,
        requirements: Option<&[Requirement]>,
        options: &CloneOptions,
    ) -> Result<Stat> {
        let repositories = self.load_repositories(urls)?;
        let packages = self.get_packages(&repositories, requirements, dependencies)?;
        let total = packages.len() as u64;

        let mirrors = self.controller.clone_repositories(
            &repositories,
            destination,
            options.include_source,
            options.include_locale,
        )?;

        let mut by_repository: HashMap<Arc<Repository>, Vec<Package>> = HashMap::new();
        for package in packages {
            by_repository
                .entry(Arc::clone(&package.repository))
                .or_default()
                .push(package);
        }

        let copied = AtomicU64::new(0);
        let on_copied = |bytes: u64| {
            if bytes > 0 {
                copied.fetch_add(1, Ordering::Relaxed);
            }
        };

        let mut failures = Vec::new();
        for repository in &repositories {
            let mirror = mirrors.get(repository).ok_or_else(|| Error::MissingClone {
                url: repository.url.clone(),
            })?;
            let mut packages = by_repository.remove(repository).unwrap_or_default();
            info!(
                "copying {} packages from {} to {}",
                packages.len(),
                repository.url,
                mirror.url
            );
            if let Err(e) =
                self.controller
                    .copy_packages(mirror, &mut packages, options.keep_existing, &on_copied)
            {
                warn!("mirroring {} failed: {}", repository.url, e);
                failures.push(e);
            }
        }

        let stat = Stat::new(copied.load(Ordering::Relaxed), total);
        if failures.is_empty() {
            Ok(stat)
        } else {
            Err(Error::Incomplete {
                stat,
                source: Box::new(Error::from_failures(failures)),
            })
        }
    }
}

/// Keeps the packages matching `requirements` plus their transitive
/// requirements, seeded also by what `dependencies` need but lack.
fn select_packages(
    packages: Vec<Package>,
    requirements: &[Requirement],
    dependencies: &[Package],
) -> Vec<Package> {
    let selected = selected_indices(&packages, requirements, dependencies);
    packages
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| selected.contains(idx))
        .map(|(_, package)| package)
        .collect()
}

fn selected_indices(
    packages: &[Package],
    requirements: &[Requirement],
    dependencies: &[Package],
) -> HashSet<usize> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, package) in packages.iter().enumerate() {
        by_name.entry(package.name.as_str()).or_default().push(idx);
    }

    let mut selected: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for requirement in requirements {
        let mut satisfied = false;
        for (idx, package) in packages.iter().enumerate() {
            if requirement.matches(package) {
                satisfied = true;
                if selected.insert(idx) {
                    queue.extend(package.requires.iter().map(String::as_str));
                }
            }
        }
        if !satisfied {
            warn!("requirement '{}' is not satisfied by any package", requirement);
        }
    }

    let provided: HashSet<&str> = dependencies.iter().map(|p| p.name.as_str()).collect();
    queue.extend(
        dependencies
            .iter()
            .flat_map(|p| p.requires.iter().map(String::as_str))
            .filter(|name| !provided.contains(name)),
    );

    let mut visited: HashSet<&str> = HashSet::new();
    while let Some(name) = queue.pop_front() {
        if !visited.insert(name) {
            continue;
        }
        let Some(candidates) = by_name.get(name) else {
            debug!("'{}' is required but not provided", name);
            continue;
        };
        for &idx in candidates {
            if selected.insert(idx) {
                queue.extend(packages[idx].requires.iter().map(String::as_str));
            }
        }
    }

    selected
}
