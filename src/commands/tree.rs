//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays the
//! inheritance between repository groups as a forest: every group that
//! derives from nothing is a root, and groups deriving from it are its
//! children. Each node shows the group name, its driver type, its
//! repository count and, when overridden, its osname.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::path::PathBuf;

use package_mirror::config::{self, MirrorConfig};
use package_mirror::defaults::{CONFIG_ENV, DEFAULT_CONFIG_FILE};
use package_mirror::driver::DriverRegistry;
use package_mirror::inheritance::Inheritance;
use package_mirror::output::{emoji, OutputConfig};

/// Display the repository group inheritance tree
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the mirror configuration file.
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the root groups, 1 to show one level of
    /// inheritance, etc.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config_path = &args.config;

    let config = config::from_file(config_path).map_err(|e| {
        anyhow::anyhow!("Failed to load config from {}: {}", config_path.display(), e)
    })?;
    config.validate(&DriverRegistry::with_defaults())?;
    let inheritance = config.inheritance()?;

    println!(
        "{} Repository groups in: {}",
        emoji(&out, "🌳", "[TREE]"),
        config_path.display()
    );

    let root = build_forest(&config, &inheritance, args.depth.unwrap_or(usize::MAX));
    print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}

fn build_forest(config: &MirrorConfig, inheritance: &Inheritance, max_depth: usize) -> TreeNode {
    let children = inheritance
        .roots(config.groups())
        .into_iter()
        .map(|group| build_tree_node(config, inheritance, group, max_depth, 0))
        .collect();
    TreeNode {
        label: "groups".to_string(),
        children,
    }
}

fn build_tree_node(
    config: &MirrorConfig,
    inheritance: &Inheritance,
    group: &str,
    max_depth: usize,
    current_depth: usize,
) -> TreeNode {
    let mut label = format!(
        "{} ({}, {} repositories)",
        group,
        config.group_type(group).unwrap_or("?"),
        config.group_urls(group).len()
    );
    if config.osname(group) != group {
        label.push_str(&format!(" -> {}", config.osname(group)));
    }

    let children = if current_depth >= max_depth {
        vec![]
    } else {
        inheritance
            .children(group)
            .iter()
            .map(|child| build_tree_node(config, inheritance, child, max_depth, current_depth + 1))
            .collect()
    };
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
