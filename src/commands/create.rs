//! # Create Command Implementation
//!
//! This module implements the `create` subcommand, which runs the mirror
//! creation workflow over a `mirror.yaml` configuration.
//!
//! ## Functionality
//!
//! - **Validation**: the whole configuration is validated before any group
//!   is touched; configuration errors abort the run.
//! - **Group selection**: `--group` restricts the run to named groups.
//! - **Overrides**: `--threads`, `--prune`, `--source` and `--locale`
//!   override the corresponding configuration keys for this run.
//! - **Reporting**: a spinner per group while it is mirrored, then the
//!   summary line. Failed groups are listed on stderr and make the command
//!   exit with a non-zero status.

use anyhow::Result;
use clap::Args;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;

use package_mirror::config::{self, MirrorConfig};
use package_mirror::connection::DefaultConnection;
use package_mirror::controller::Context;
use package_mirror::defaults::{default_target_dir, CONFIG_ENV, DEFAULT_CONFIG_FILE, TARGET_ENV};
use package_mirror::driver::DriverRegistry;
use package_mirror::output::{emoji, OutputConfig};
use package_mirror::workflow::{GroupEvent, MirrorWorkflow};

/// Mirror the repository groups of a configuration
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Path to the mirror configuration file.
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Root directory of the mirror.
    ///
    /// Overrides `target_dir` from the configuration. Defaults to the
    /// platform data directory (e.g. `~/.local/share/package-mirror`).
    #[arg(short, long, value_name = "DIR", env = TARGET_ENV)]
    pub target_dir: Option<PathBuf>,

    /// Only mirror this group (repeatable).
    #[arg(short, long = "group", value_name = "NAME")]
    pub groups: Vec<String>,

    /// Maximum number of concurrent package copies (0 = unbounded).
    #[arg(short = 'j', long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Remove packages from the mirror that are no longer selected.
    #[arg(long)]
    pub prune: bool,

    /// Also mirror source packages where the format supports them.
    #[arg(long)]
    pub source: bool,

    /// Also mirror localisation data where the format supports it.
    #[arg(long)]
    pub locale: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,
}

impl CreateArgs {
    fn apply_overrides(&self, config: &mut MirrorConfig) {
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if self.prune {
            config.keep_existing = false;
        }
        config.include_source |= self.source;
        config.include_locale |= self.locale;
    }
}

/// Execute the `create` command.
pub fn execute(args: CreateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag).quiet(args.quiet);

    let mut config = config::from_file(&args.config).map_err(|e| {
        anyhow::anyhow!("Failed to load config from {}: {}", args.config.display(), e)
    })?;
    args.apply_overrides(&mut config);

    let target_dir = args
        .target_dir
        .clone()
        .or_else(|| config.target_dir.clone())
        .unwrap_or_else(default_target_dir);

    let connection = DefaultConnection::new(config.retries)?;
    let mut context = Context::new(Arc::new(connection));
    if let Some(threads) = config.threads {
        context = context.with_copy_bound(threads);
    }

    let registry = DriverRegistry::with_defaults();
    let workflow = MirrorWorkflow::new(&config, &registry, context)?;
    let plans = workflow.plan(&target_dir, &args.groups)?;

    if !out.quiet {
        println!(
            "{} Mirroring {} group(s) into {}",
            emoji(&out, "📦", "[MIRROR]"),
            plans.len(),
            target_dir.display()
        );
    }

    let mut spinner: Option<ProgressBar> = None;
    let report = workflow.run(&plans, &mut |event| match event {
        GroupEvent::Started(plan) => {
            spinner = Some(out.group_spinner(format!("Mirroring {}", plan.name)));
        }
        GroupEvent::Finished(plan, result) => {
            let Some(spinner) = spinner.take() else {
                return;
            };
            let message = match result {
                Ok(stat) => format!("{} {}: {}", emoji(&out, "✅", "[OK]"), plan.name, stat),
                Err(e) => format!("{} {}: {}", emoji(&out, "❌", "[ERR]"), plan.name, e),
            };
            spinner.finish_with_message(message);
        }
    })?;

    let summary = report.summary();
    if report.is_success() {
        println!("{}", out.success(&summary));
    } else {
        println!("{}", summary);
    }

    if !report.is_success() {
        for failure in &report.failures {
            eprintln!("{} {}", out.failure("failed:"), failure);
        }
        anyhow::bail!("{} group(s) failed", report.failures.len());
    }
    Ok(())
}
