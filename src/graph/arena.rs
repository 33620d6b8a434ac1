//! Session arena of decrypted nodes

use crate::model::{Address, Node};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// Every node the session has decrypted, indexed by address
///
/// Keeps a reverse index from each child to the live nodes that link to it,
/// and records which addresses have been superseded by a newer version (or
/// deleted, `None`).
#[derive(Default)]
pub struct Arena {
    nodes: HashMap<Address, Node>,
    parents: HashMap<Address, BTreeSet<Address>>,
    superseded: HashMap<Address, Option<Address>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decrypted node
    ///
    /// Superseded nodes are kept for lookups but do not enter the parent
    /// index.
    pub fn observe(&mut self, node: Node) {
        let address = node.address;
        if !self.superseded.contains_key(&address) {
            for child in node.children() {
                self.parents.entry(child).or_default().insert(address);
            }
        }
        self.nodes.insert(address, node);
    }

    /// Mark `old` as replaced by `replacement`, or deleted when `None`
    pub fn retire(&mut self, old: Address, replacement: Option<Address>) {
        if replacement == Some(old) {
            return;
        }
        if let Some(node) = self.nodes.get(&old) {
            for child in node.children() {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.remove(&old);
                    if parents.is_empty() {
                        self.parents.remove(&child);
                    }
                }
            }
        }
        self.superseded.insert(old, replacement);
    }

    /// Make a retired address live again
    ///
    /// Sealing is deterministic, so writing content that was superseded or
    /// deleted earlier yields its old address. That address is current again
    /// and its links rejoin the parent index.
    pub fn revive(&mut self, address: &Address) {
        if self.superseded.remove(address).is_none() {
            return;
        }
        if let Some(node) = self.nodes.get(address) {
            for child in node.children() {
                self.parents.entry(child).or_default().insert(*address);
            }
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.nodes.contains_key(address)
    }

    /// Live nodes with a structural link to `address`
    pub fn live_parents(&self, address: &Address) -> Vec<Address> {
        self.parents
            .get(address)
            .map(|parents| parents.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_superseded(&self, address: &Address) -> bool {
        self.superseded.contains_key(address)
    }

    /// Follow the supersession chain to the current version
    pub fn latest(&self, address: &Address) -> Result<Address> {
        let mut current = *address;
        // a chain can be no longer than the number of retired addresses
        for _ in 0..=self.superseded.len() {
            match self.superseded.get(&current) {
                None => return Ok(current),
                Some(None) => return Err(Error::Deleted(current)),
                Some(Some(next)) => current = *next,
            }
        }
        Err(Error::InvalidGraph(format!(
            "supersession chain from {} does not terminate",
            address
        )))
    }

    /// Live nodes no live node links to
    pub fn heads(&self) -> Vec<Address> {
        let mut heads: Vec<_> = self
            .nodes
            .keys()
            .filter(|a| !self.superseded.contains_key(a) && !self.parents.contains_key(a))
            .copied()
            .collect();
        heads.sort();
        heads
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
