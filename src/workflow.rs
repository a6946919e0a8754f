//! # Mirror Creation Workflow
//!
//! Top-level driver of a mirroring run. Given a validated [`MirrorConfig`]
//! it mirrors every selected repository group in two phases:
//!
//! 1. **Planning** ([`MirrorWorkflow::plan`]): for each group, work out its
//!    destination (`target_dir/<osname>`), driver, architecture, member
//!    URLs, requirements and dependencies. A group that is the base of other
//!    groups receives the repository URLs of every group deriving from it
//!    as dependencies; any other group receives none. Planning is pure and
//!    fails only on configuration errors.
//!
//! 2. **Execution** ([`MirrorWorkflow::run`]): every driver is resolved up
//!    front, then groups are cloned one after another through a
//!    [`RepositoryApi`]. A failing group does not stop the others; its error
//!    is recorded in the [`MirrorReport`] and any partial statistics it
//!    carries still count towards the total.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::api::{CloneOptions, RepositoryApi, Requirement};
use crate::config::MirrorConfig;
use crate::controller::{Context, RepositoryController};
use crate::driver::DriverRegistry;
use crate::error::{Error, Result};
use crate::stat::Stat;

/// Everything needed to mirror one repository group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub name: String,
    pub destination: PathBuf,
    pub driver: String,
    pub arch: String,
    pub urls: Vec<String>,
    /// Repository URLs of the groups deriving from this one
    pub dependencies: Option<Vec<String>>,
    pub requirements: Option<Vec<Requirement>>,
}

/// Progress notifications emitted by [`MirrorWorkflow::run`]
#[derive(Debug)]
pub enum GroupEvent<'a> {
    Started(&'a GroupPlan),
    Finished(&'a GroupPlan, &'a Result<Stat>),
}

/// A group that did not mirror cleanly
#[derive(Debug)]
pub struct GroupFailure {
    pub group: String,
    pub error: Error,
}

impl fmt::Display for GroupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.group, self.error)
    }
}

/// Outcome of a mirroring run
#[derive(Debug, Default)]
pub struct MirrorReport {
    /// Sum of the group statistics, `None` if no group produced any
    pub total: Option<Stat>,
    pub failures: Vec<GroupFailure>,
}

impl MirrorReport {
    fn record(&mut self, stat: Stat) {
        self.total = Some(self.total.unwrap_or_default() + stat);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The one-line summary printed at the end of a run.
    pub fn summary(&self) -> String {
        match self.total {
            Some(stat) => format!("Packages processed: {}", stat),
            None => "No packages.".to_string(),
        }
    }
}

/// Plans and runs the mirroring of repository groups
pub struct MirrorWorkflow<'a> {
    config: &'a MirrorConfig,
    registry: &'a DriverRegistry,
    context: Context,
}

impl<'a> MirrorWorkflow<'a> {
    /// Validates `config` and prepares a workflow over it.
    pub fn new(config: &'a MirrorConfig, registry: &'a DriverRegistry, context: Context) -> Result<Self> {
        config.validate(registry)?;
        Ok(Self {
            config,
            registry,
            context,
        })
    }

    /// Plans the groups named in `selected`, or every group if it is empty.
    pub fn plan(&self, target_dir: &Path, selected: &[String]) -> Result<Vec<GroupPlan>> {
        let inheritance = self.config.inheritance()?;

        for group in selected {
            if self.config.group_type(group).is_none() {
                return Err(Error::UnknownGroup {
                    group: group.clone(),
                    context: "selected with --group".to_string(),
                });
            }
        }

        self.config
            .groups()
            .filter(|group| selected.is_empty() || selected.iter().any(|s| s.as_str() == *group))
            .map(|group| {
                let dependencies = inheritance.is_base(group).then(|| {
                    inheritance
                        .children(group)
                        .iter()
                        .flat_map(|child| self.config.group_urls(child))
                        .collect()
                });
                Ok(GroupPlan {
                    name: group.to_string(),
                    destination: target_dir.join(self.config.osname(group)),
                    driver: self.config.group_type(group).unwrap_or_default().to_string(),
                    arch: self.config.group_arch(group).to_string(),
                    urls: self.config.group_urls(group),
                    dependencies,
                    requirements: self.config.requirements_for(group)?,
                })
            })
            .collect()
    }

    /// Mirrors every planned group, reporting progress to `observer`.
    ///
    /// Fails before touching any group if a driver cannot be resolved;
    /// group failures are collected in the report instead.
    pub fn run(
        &self,
        plans: &[GroupPlan],
        observer: &mut dyn FnMut(GroupEvent<'_>),
    ) -> Result<MirrorReport> {
        let apis = plans
            .iter()
            .map(|plan| {
                RepositoryController::load(self.context.clone(), self.registry, &plan.driver, &plan.arch)
                    .map(RepositoryApi::new)
            })
            .collect::<Result<Vec<_>>>()?;

        let options = CloneOptions {
            keep_existing: self.config.keep_existing,
            include_source: self.config.include_source,
            include_locale: self.config.include_locale,
        };

        let mut report = MirrorReport::default();
        for (plan, api) in plans.iter().zip(&apis) {
            info!("mirroring group {} into {}", plan.name, plan.destination.display());
            observer(GroupEvent::Started(plan));

            let result = api.clone_repositories(
                &plan.urls,
                &plan.destination,
                plan.dependencies.as_deref(),
                plan.requirements.as_deref(),
                &options,
            );
            observer(GroupEvent::Finished(plan, &result));

            match result {
                Ok(stat) => report.record(stat),
                Err(error) => {
                    error!("group {} failed: {}", plan.name, error);
                    if let Some(stat) = error.partial_stat() {
                        report.record(stat);
                    }
                    report.failures.push(GroupFailure {
                        group: plan.name.clone(),
                        error,
                    });
                }
            }
        }
        Ok(report)
    }
}

/// Plans and runs a whole mirroring pass in one call.
pub fn create_mirrors(
    config: &MirrorConfig,
    registry: &DriverRegistry,
    context: Context,
    target_dir: &Path,
    groups: &[String],
) -> Result<MirrorReport> {
    let workflow = MirrorWorkflow::new(config, registry, context)?;
    let plans = workflow.plan(target_dir, groups)?;
    workflow.run(&plans, &mut |_| {})
}
