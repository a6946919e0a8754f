//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = MirrorFixture::new();
//!     let base = fixture.flat_repo("origin/base", &["bash", "libc"]);
//!     fixture.write_config(&format!("repositories:\n  base: [ {{ type: flat, url: \"{}\" }} ]\n", base));
//! }
//! ```

use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::MirrorFixture;
}

/// A temporary directory holding origin repositories, a config and a target.
pub struct MirrorFixture {
    pub temp: TempDir,
}

#[allow(dead_code)]
impl MirrorFixture {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Mirror target directory inside the fixture.
    pub fn target(&self) -> PathBuf {
        self.temp.path().join("mirror")
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp.path().join("mirror.yaml")
    }

    /// Creates a flat repository at `relative` with one `pool/<name>.pkg`
    /// per package and returns its path as a string.
    pub fn flat_repo(&self, relative: &str, names: &[&str]) -> String {
        let packages: Vec<(&str, &[&str])> = names.iter().map(|n| (*n, &[][..])).collect();
        self.flat_repo_with_requires(relative, &packages)
    }

    /// Like [`flat_repo`](Self::flat_repo) with explicit `requires` lists.
    pub fn flat_repo_with_requires(&self, relative: &str, packages: &[(&str, &[&str])]) -> String {
        let dir = self.temp.child(relative);
        dir.create_dir_all().unwrap();
        let entries: Vec<serde_json::Value> = packages
            .iter()
            .map(|(name, requires)| {
                let filename = format!("pool/{}.pkg", name);
                let contents = format!("{} payload", name);
                dir.child(&filename).write_str(&contents).unwrap();
                serde_json::json!({
                    "name": name,
                    "version": "1.0.0",
                    "filename": filename,
                    "size": contents.len(),
                    "requires": requires,
                })
            })
            .collect();
        dir.child("packages.json")
            .write_str(&serde_json::json!({ "packages": entries }).to_string())
            .unwrap();
        dir.path().to_str().unwrap().to_string()
    }

    /// Deletes one package file from a repository created by `flat_repo`.
    pub fn remove_package(&self, relative: &str, name: &str) {
        std::fs::remove_file(self.temp.path().join(relative).join(format!("pool/{}.pkg", name)))
            .unwrap();
    }

    pub fn write_config(&self, yaml: &str) -> PathBuf {
        let path = self.config_path();
        std::fs::write(&path, yaml).unwrap();
        path
    }

    /// Clone of the origin at `origin` inside the mirror directory of `osname`.
    pub fn mirrored(&self, osname: &str, origin: &str) -> PathBuf {
        let origin = self.temp.path().join(origin);
        package_mirror::driver::flat::clone_root(
            &self.target().join(osname),
            origin.to_str().unwrap(),
        )
    }

    /// Package names listed in the index of a mirrored repository.
    pub fn indexed_packages(&self, osname: &str, origin: &str) -> Vec<String> {
        let content =
            std::fs::read(self.mirrored(osname, origin).join("packages.json")).unwrap();
        let index: serde_json::Value = serde_json::from_slice(&content).unwrap();
        index["packages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect()
    }
}
