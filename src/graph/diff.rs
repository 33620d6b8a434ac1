//! Diff between two graph heads

use super::Graph;
use crate::crypto::KeySet;
use crate::model::Address;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Type of change in a diff
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffEntry {
    /// Path exists only under the new head
    Added { path: String, address: Address },
    /// Path exists only under the old head
    Removed { path: String, address: Address },
    /// Path exists under both, at different addresses
    Modified {
        path: String,
        old: Address,
        new: Address,
    },
}

impl DiffEntry {
    /// Slash-joined link names from the head, e.g. `g00/g10/g20`
    pub fn path(&self) -> &str {
        match self {
            DiffEntry::Added { path, .. } => path,
            DiffEntry::Removed { path, .. } => path,
            DiffEntry::Modified { path, .. } => path,
        }
    }
}

/// A diff between two heads
#[derive(Clone, Debug, Default)]
pub struct Diff {
    pub entries: Vec<DiffEntry>,
}

impl Diff {
    pub fn new(entries: Vec<DiffEntry>) -> Self {
        Diff { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn added_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, DiffEntry::Added { .. }))
            .count()
    }

    pub fn removed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, DiffEntry::Removed { .. }))
            .count()
    }

    pub fn modified_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, DiffEntry::Modified { .. }))
            .count()
    }
}

impl Graph {
    /// Compare the graphs below two heads path by path
    pub async fn diff(&mut self, old: &Address, new: &Address, keys: &KeySet) -> Result<Diff> {
        if old == new {
            return Ok(Diff::default());
        }

        let old_paths = self.paths(old, keys).await?;
        let new_paths = self.paths(new, keys).await?;
        let all_paths: BTreeSet<_> = old_paths.keys().chain(new_paths.keys()).collect();

        let mut entries = Vec::new();
        for path in all_paths {
            match (old_paths.get(path), new_paths.get(path)) {
                (None, Some(&address)) => entries.push(DiffEntry::Added {
                    path: path.clone(),
                    address,
                }),
                (Some(&address), None) => entries.push(DiffEntry::Removed {
                    path: path.clone(),
                    address,
                }),
                (Some(&old), Some(&new)) if old != new => entries.push(DiffEntry::Modified {
                    path: path.clone(),
                    old,
                    new,
                }),
                _ => {} // Unchanged
            }
        }

        Ok(Diff::new(entries))
    }

    /// Every structural path below `head`, rooted at the head's name
    async fn paths(&mut self, head: &Address, keys: &KeySet) -> Result<BTreeMap<String, Address>> {
        let root = self.node(head, keys).await?;
        let mut paths = BTreeMap::new();
        let mut stack = vec![(root.name().to_string(), *head)];

        while let Some((path, address)) = stack.pop() {
            let node = self.node(&address, keys).await?;
            for (name, child) in node.structural_links() {
                stack.push((format!("{}/{}", path, name), *child));
            }
            paths.insert(path, address);
        }
        Ok(paths)
    }
}
