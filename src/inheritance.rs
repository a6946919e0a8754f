//! Repository group inheritance
//!
//! The configuration declares inheritance as `derived: base`, so every group
//! has at most one parent and the relation forms a forest. The workflow needs
//! the opposite direction: when mirroring a base group it asks which groups
//! derive from it, so their repositories can be passed along as
//! dependencies. [`Inheritance`] keeps both directions, built once up front.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Validated inheritance forest over group names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inheritance {
    parents: BTreeMap<String, String>,
    children: BTreeMap<String, Vec<String>>,
}

impl Inheritance {
    /// Builds the forest from a `derived -> base` map.
    ///
    /// Fails with `CycleDetected` if following parents ever revisits a group.
    pub fn new(parents: &BTreeMap<String, String>) -> Result<Self> {
        for group in parents.keys() {
            detect_cycles(group, parents, &mut Vec::new())?;
        }

        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (derived, base) in parents {
            children
                .entry(base.clone())
                .or_default()
                .push(derived.clone());
        }

        Ok(Self {
            parents: parents.clone(),
            children,
        })
    }

    /// The group `group` derives from, if any.
    pub fn parent(&self, group: &str) -> Option<&str> {
        self.parents.get(group).map(String::as_str)
    }

    /// Groups deriving directly from `group`, sorted by name.
    pub fn children(&self, group: &str) -> &[String] {
        self.children.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_base(&self, group: &str) -> bool {
        self.children.contains_key(group)
    }

    /// Every `(derived, base)` pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parents.iter().map(|(d, b)| (d.as_str(), b.as_str()))
    }

    /// The groups among `groups` that derive from nothing.
    pub fn roots<'a, I>(&self, groups: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        groups
            .into_iter()
            .filter(|g| !self.parents.contains_key(*g))
            .collect()
    }
}

fn detect_cycles(
    group: &str,
    parents: &BTreeMap<String, String>,
    path: &mut Vec<String>,
) -> Result<()> {
    if path.iter().any(|g| g == group) {
        let mut cycle = path.clone();
        cycle.push(group.to_string());
        return Err(Error::CycleDetected {
            cycle: cycle.join(" -> "),
        });
    }

    path.push(group.to_string());
    if let Some(base) = parents.get(group) {
        detect_cycles(base, parents, path)?;
    }
    path.pop();
    Ok(())
}
