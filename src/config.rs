//! # Mirror Configuration
//!
//! This module defines the data structures that represent the `mirror.yaml`
//! configuration file, as well as the logic for parsing and validating it.
//!
//! ## Key Components
//!
//! - **`MirrorConfig`**: The whole document: the target directory, transfer
//!   tuning, the repository groups and the relations between them.
//!
//! - **`RepositorySpec`**: One physical repository inside a group, with its
//!   driver type, URL and optional architecture override.
//!
//! ## Parsing and validation
//!
//! `parse` and `from_file` only check the document shape. `validate` checks
//! everything the workflow relies on, so that a bad configuration is
//! reported before any repository is touched:
//!
//! - every group is non-empty and uses a single driver type and arch;
//! - every driver type is registered;
//! - inheritance, osname and requirement entries reference declared
//!   groups, and inheritance has no cycles;
//! - every requirement parses.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::Requirement;
use crate::defaults::DEFAULT_ARCH;
use crate::driver::DriverRegistry;
use crate::error::{Error, Result};
use crate::inheritance::Inheritance;

/// One physical repository of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositorySpec {
    /// Driver type, e.g. `flat`
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    /// Overrides the top-level `arch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// The parsed `mirror.yaml` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    /// Root directory of the mirror
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
    #[serde(default = "default_arch")]
    pub arch: String,
    /// Bound on concurrent package copies; `0` means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Additional transfer attempts after a failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Keep packages already present in the mirror
    #[serde(default = "default_keep_existing")]
    pub keep_existing: bool,
    #[serde(default)]
    pub include_source: bool,
    #[serde(default)]
    pub include_locale: bool,
    /// Directory name overrides, keyed by group
    #[serde(default)]
    pub osnames: BTreeMap<String, String>,
    /// Repository groups, keyed by logical name
    pub repositories: BTreeMap<String, Vec<RepositorySpec>>,
    /// `derived: base` pairs
    #[serde(default)]
    pub inheritance: BTreeMap<String, String>,
    /// Package requirements, keyed by group
    #[serde(default)]
    pub requirements: BTreeMap<String, Vec<String>>,
}

fn default_arch() -> String {
    DEFAULT_ARCH.to_string()
}

fn default_retries() -> u32 {
    crate::connection::DefaultConnection::DEFAULT_RETRIES
}

fn default_keep_existing() -> bool {
    true
}

impl MirrorConfig {
    /// Checks the configuration against `registry`.
    pub fn validate(&self, registry: &DriverRegistry) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(Error::ConfigParse {
                message: "no repository groups are defined".to_string(),
                hint: Some("Add a 'repositories:' mapping with at least one group".to_string()),
            });
        }

        for (group, specs) in &self.repositories {
            let Some(first) = specs.first() else {
                return Err(Error::config(format!("repository group '{}' is empty", group)));
            };
            if let Some(other) = specs.iter().find(|s| s.kind != first.kind) {
                return Err(Error::ConfigParse {
                    message: format!(
                        "repository group '{}' mixes types '{}' and '{}'",
                        group, first.kind, other.kind
                    ),
                    hint: Some("Split the repositories into one group per type".to_string()),
                });
            }
            let arch = self.spec_arch(first);
            if let Some(other) = specs.iter().find(|s| self.spec_arch(s) != arch) {
                return Err(Error::config(format!(
                    "repository group '{}' mixes architectures '{}' and '{}'",
                    group,
                    arch,
                    self.spec_arch(other)
                )));
            }
            if !registry.contains(&first.kind) {
                return Err(Error::UnsupportedDriver {
                    name: first.kind.clone(),
                });
            }
        }

        for (derived, base) in &self.inheritance {
            self.check_group(derived, &format!("inherits from '{}'", base))?;
            self.check_group(base, &format!("base of '{}'", derived))?;
        }
        Inheritance::new(&self.inheritance)?;

        for group in self.osnames.keys() {
            self.check_group(group, "osnames")?;
        }
        for group in self.requirements.keys() {
            self.check_group(group, "requirements")?;
            self.requirements_for(group)?;
        }

        Ok(())
    }

    fn check_group(&self, group: &str, context: &str) -> Result<()> {
        if self.repositories.contains_key(group) {
            Ok(())
        } else {
            Err(Error::UnknownGroup {
                group: group.to_string(),
                context: context.to_string(),
            })
        }
    }

    fn spec_arch<'a>(&'a self, spec: &'a RepositorySpec) -> &'a str {
        spec.arch.as_deref().unwrap_or(&self.arch)
    }

    /// Group names in processing order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.repositories.keys().map(String::as_str)
    }

    /// Driver type of `group`.
    pub fn group_type(&self, group: &str) -> Option<&str> {
        self.repositories
            .get(group)
            .and_then(|specs| specs.first())
            .map(|spec| spec.kind.as_str())
    }

    /// Architecture of `group`.
    pub fn group_arch(&self, group: &str) -> &str {
        self.repositories
            .get(group)
            .and_then(|specs| specs.first())
            .map(|spec| self.spec_arch(spec))
            .unwrap_or(&self.arch)
    }

    /// Repository URLs of `group`, empty for unknown groups.
    pub fn group_urls(&self, group: &str) -> Vec<String> {
        self.repositories
            .get(group)
            .map(|specs| specs.iter().map(|s| s.url.clone()).collect())
            .unwrap_or_default()
    }

    /// Directory name of `group` below the target directory.
    pub fn osname<'a>(&'a self, group: &'a str) -> &'a str {
        self.osnames.get(group).map(String::as_str).unwrap_or(group)
    }

    /// Parsed requirements of `group`, `None` if it declares none.
    pub fn requirements_for(&self, group: &str) -> Result<Option<Vec<Requirement>>> {
        self.requirements
            .get(group)
            .map(|reqs| reqs.iter().map(|r| r.parse()).collect())
            .transpose()
    }

    /// The inheritance forest of the configuration.
    pub fn inheritance(&self) -> Result<Inheritance> {
        Inheritance::new(&self.inheritance)
    }
}

/// Parse a YAML string into a mirror configuration
pub fn parse(yaml_content: &str) -> Result<MirrorConfig> {
    serde_yaml::from_str(yaml_content).map_err(Error::Yaml)
}

/// Parse a configuration file
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<MirrorConfig> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
