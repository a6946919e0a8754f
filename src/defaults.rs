//! Default values for package-mirror configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "mirror.yaml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "PACKAGE_MIRROR_CONFIG";

/// Environment variable overriding the mirror target directory.
pub const TARGET_ENV: &str = "PACKAGE_MIRROR_TARGET";

/// Architecture assumed when neither the configuration nor a repository
/// entry names one.
pub const DEFAULT_ARCH: &str = "x86_64";

/// Returns the default mirror target directory.
///
/// Uses the platform-appropriate data directory:
/// - Linux: `~/.local/share/package-mirror` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/package-mirror`
/// - Windows: `{FOLDERID_RoamingAppData}\package-mirror`
///
/// Falls back to `mirror` in the current directory if the platform data
/// directory cannot be determined.
///
/// The configuration's `target_dir`, the `--target-dir` CLI flag and the
/// `PACKAGE_MIRROR_TARGET` environment variable all take precedence.
pub fn default_target_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("package-mirror"))
        .unwrap_or_else(|| PathBuf::from("mirror"))
}
