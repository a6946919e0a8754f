//! # Package Mirror Library
//!
//! This library mirrors remote package repositories to local storage. It is
//! designed to be used by the `package-mirror` command-line tool but can
//! also be embedded in other applications that need to keep local copies of
//! package repositories in sync.
//!
//! ## Quick Example
//!
//! ```
//! use package_mirror::config;
//! use package_mirror::driver::DriverRegistry;
//!
//! let config = config::parse(r#"
//! repositories:
//!   base:    [ { type: flat, url: "http://host/base" } ]
//!   updates: [ { type: flat, url: "http://host/updates" } ]
//! inheritance:
//!   updates: base
//! "#).unwrap();
//!
//! config.validate(&DriverRegistry::with_defaults()).unwrap();
//! let inheritance = config.inheritance().unwrap();
//! assert_eq!(inheritance.children("base"), ["updates"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: the `mirror.yaml` schema: repository
//!   groups, inheritance between groups and package requirements.
//! - **Drivers (`driver`)**: format-specific repository handling behind the
//!   `RepositoryDriver` trait, looked up by type name in a `DriverRegistry`.
//! - **Transport (`connection`)**: retrieval of single files from local or
//!   HTTP sources.
//! - **Concurrency (`scope`)**: a bounded, fail-together task scope used for
//!   both per-package and per-repository work.
//! - **Controller (`controller`)**: copies packages, reconciles package sets
//!   and clones repositories for one driver.
//! - **API (`api`)**: the per-group clone operation with requirement
//!   filtering and statistics.
//! - **Workflow (`workflow`)**: plans and runs every group of a
//!   configuration and aggregates the result into a `MirrorReport`.
//!
//! ## Execution Flow
//!
//! 1.  **Validation**: the configuration is checked before anything runs.
//! 2.  **Planning**: each group gets a destination, a driver and, if other
//!     groups derive from it, their repository URLs as dependencies.
//! 3.  **Cloning**: each group's repositories are cloned concurrently.
//! 4.  **Copying**: packages are copied concurrently into the clones.
//! 5.  **Commit**: repository metadata is rebuilt from the copied packages.
//! 6.  **Reporting**: per-group statistics are summed and failures listed.

pub mod api;
pub mod config;
pub mod connection;
pub mod controller;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod inheritance;
pub mod model;
pub mod output;
pub mod scope;
pub mod stat;
pub mod workflow;

pub use error::{Error, Result};
pub use stat::Stat;
