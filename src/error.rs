//! # Error Handling
//!
//! This module defines the centralized error type for `package-mirror`. It
//! uses the `thiserror` library to build a single `Error` enum that covers
//! every failure the mirroring engine can report, with enough context
//! (URL, driver, group, path) to act on the message.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Configuration problems (`ConfigParse`,
//!   `UnsupportedDriver`, `UnknownGroup`, `CycleDetected`) are fatal and
//!   raised before any work starts. Transport and driver failures
//!   (`Transport`, `Driver`, `Index`) are raised by individual tasks and
//!   aggregated by a task scope into `Tasks`. A group that finished with
//!   failures but still copied packages is reported as `Incomplete`, which
//!   carries the partial [`Stat`].
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.

use thiserror::Error;

use crate::stat::Stat;

/// Main error type for package-mirror operations
#[derive(Error, Debug)]
pub enum Error {
    /// The mirror configuration could not be parsed or failed validation.
    ///
    /// Optionally carries a hint about how to fix it.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// No driver is registered under the requested repository type.
    #[error("The driver {name} is not supported yet.")]
    UnsupportedDriver { name: String },

    /// A repository group was referenced but is not declared.
    #[error("Unknown repository group '{group}' ({context})")]
    UnknownGroup { group: String, context: String },

    /// The inheritance mapping contains a cycle.
    #[error("Cycle detected in repository inheritance: {cycle}")]
    CycleDetected { cycle: String },

    /// A file could not be retrieved from its source.
    #[error("Transport error: {url} - {message}")]
    Transport { url: String, message: String },

    /// A repository driver failed.
    #[error("Driver error ({driver}): {message}")]
    Driver { driver: String, message: String },

    /// Repository metadata could not be read or written.
    #[error("Repository index error: {path} - {message}")]
    Index { path: String, message: String },

    /// An error occurred with a path-related operation.
    #[error("Path operation error: {message}")]
    Path { message: String },

    /// A repository has packages to copy but was never cloned.
    #[error("No clone was produced for repository {url}")]
    MissingClone { url: String },

    /// One or more tasks of a task scope failed.
    ///
    /// Raised only after every sibling task has been attempted.
    #[error("{} task(s) failed; first failure: {}", failures.len(), failures.first().map(|e| e.to_string()).unwrap_or_default())]
    Tasks { failures: Vec<Error> },

    /// A clone finished with failures after copying part of its packages.
    #[error("Mirror incomplete ({stat} packages processed): {source}")]
    Incomplete {
        stat: Stat,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// An HTTP client error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Builds a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }

    /// Collapses the failures collected by a task scope into one error.
    ///
    /// A single failure is returned as-is; several are wrapped in `Tasks`.
    /// Nested `Tasks` are flattened so callers see every leaf failure.
    /// An empty input yields an empty `Tasks`.
    pub fn from_failures(failures: Vec<Error>) -> Self {
        let mut flat = Vec::with_capacity(failures.len());
        for failure in failures {
            match failure {
                Error::Tasks { failures } => flat.extend(failures),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Error::Tasks { failures: flat }
        }
    }

    /// Returns the partial statistics carried by an `Incomplete` error.
    pub fn partial_stat(&self) -> Option<Stat> {
        match self {
            Error::Incomplete { stat, .. } => Some(*stat),
            _ => None,
        }
    }

    /// Number of leaf failures represented by this error.
    pub fn failure_count(&self) -> usize {
        match self {
            Error::Tasks { failures } => failures.iter().map(Error::failure_count).sum(),
            Error::Incomplete { source, .. } => source.failure_count(),
            _ => 1,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(url: &str) -> Error {
        Error::Transport {
            url: url.to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_error_display_config_parse() {
        let error = Error::config("group 'base' is empty");
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("group 'base' is empty"));
        assert!(!display.contains("hint:"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "Missing repositories".to_string(),
            hint: Some("Add a 'repositories:' mapping".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("hint:"));
        assert!(display.contains("Add a 'repositories:' mapping"));
    }

    #[test]
    fn test_error_display_unsupported_driver() {
        let error = Error::UnsupportedDriver {
            name: "rpm".to_string(),
        };
        assert_eq!(error.to_string(), "The driver rpm is not supported yet.");
    }

    #[test]
    fn test_error_display_unknown_group() {
        let error = Error::UnknownGroup {
            group: "security".to_string(),
            context: "inherited by 'updates'".to_string(),
        };
        let display = error.to_string();
        assert!(display.contains("security"));
        assert!(display.contains("inherited by 'updates'"));
    }

    #[test]
    fn test_error_display_cycle_detected() {
        let error = Error::CycleDetected {
            cycle: "a -> b -> a".to_string(),
        };
        assert!(error.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_error_display_transport() {
        let display = transport("http://host/pool/a.deb").to_string();
        assert!(display.contains("Transport error"));
        assert!(display.contains("http://host/pool/a.deb"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn test_from_failures_single_is_unwrapped() {
        let error = Error::from_failures(vec![transport("a")]);
        assert!(matches!(error, Error::Transport { .. }));
        assert_eq!(error.failure_count(), 1);
    }

    #[test]
    fn test_from_failures_many_are_flattened() {
        let nested = Error::Tasks {
            failures: vec![transport("b"), transport("c")],
        };
        let error = Error::from_failures(vec![transport("a"), nested]);
        match &error {
            Error::Tasks { failures } => assert_eq!(failures.len(), 3),
            other => panic!("unexpected error: {}", other),
        }
        assert!(error.to_string().starts_with("3 task(s) failed"));
    }

    #[test]
    fn test_incomplete_carries_stat() {
        let error = Error::Incomplete {
            stat: Stat::new(2, 3),
            source: Box::new(transport("a")),
        };
        assert_eq!(error.partial_stat(), Some(Stat::new(2, 3)));
        assert!(error.to_string().contains("2/3"));
        assert_eq!(transport("a").partial_stat(), None);
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(error.to_string().contains("YAML parsing error"));
    }
}
