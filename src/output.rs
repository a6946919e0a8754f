//! # Output Configuration
//!
//! Controls how the CLI presents a mirroring run: whether colors and emoji
//! are used, and the per-group spinner shown while a group is mirrored.
//!
//! Color follows the `--color=never|always|auto` flag. In `auto` mode it is
//! disabled by `NO_COLOR` (any value), `CLICOLOR=0`, `TERM=dumb` or a
//! non-TTY stdout, and forced on by `CLICOLOR_FORCE=1`.
//!
//! ```rust,ignore
//! use package_mirror::output::{emoji, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} Mirroring...", emoji(&out, "📦", "[MIRROR]"));
//! ```

use std::env;
use std::time::Duration;

use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};

/// Output configuration for controlling colors, emoji and progress.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emoji should be used in output.
    pub use_color: bool,
    /// Suppresses spinners and progress lines.
    pub quiet: bool,
}

impl OutputConfig {
    /// Builds the configuration from the `--color` flag and the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        console::set_colors_enabled(use_color);

        Self {
            use_color,
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn detect_color_support() -> bool {
        // https://no-color.org/: presence alone disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self {
            use_color: true,
            quiet: false,
        }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self {
            use_color: false,
            quiet: false,
        }
    }

    /// A spinner for one group, hidden when quiet.
    pub fn group_spinner(&self, message: impl Into<String>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        let template = if self.use_color {
            "{spinner:.green} {msg} [{elapsed}]"
        } else {
            "{spinner} {msg} [{elapsed}]"
        };
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.into());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Renders `text` in green when colors are enabled.
    pub fn success<'a>(&self, text: &'a str) -> StyledObject<&'a str> {
        style(text).green().bold()
    }

    /// Renders `text` in red when colors are enabled.
    pub fn failure<'a>(&self, text: &'a str) -> StyledObject<&'a str> {
        style(text).red().bold()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns `emoji_str` when colors are enabled, otherwise `plain`.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
        assert!(!config.quiet);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("NEVER");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "📦", "[MIRROR]"), "📦");
        assert_eq!(emoji(&OutputConfig::without_color(), "📦", "[MIRROR]"), "[MIRROR]");
    }

    #[test]
    fn test_quiet_spinner_is_hidden() {
        let spinner = OutputConfig::without_color().quiet(true).group_spinner("base");
        assert!(spinner.is_hidden());
    }
}
