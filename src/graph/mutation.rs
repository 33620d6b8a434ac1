//! Copy-on-write mutations and ancestor rehash
//!
//! Changing a node changes its address, which changes every parent that
//! links to it, and so on up to the heads. Propagation works bottom-up over
//! the arena: each affected ancestor waits until all of its affected
//! children have their new addresses, then is rewritten exactly once.
//!
//! Every new block is sealed in memory before any is written. The arena is
//! only updated after the last write succeeds, so a failed write leaves the
//! session on the previous heads.

use super::{seal_node, Graph};
use crate::crypto::KeySet;
use crate::model::{history_link, is_history_link, Address, JsonValue, Links, Node, NodeBody};
use crate::{Error, Result};
use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// The outcome of a graph mutation
#[derive(Clone, Debug)]
pub struct Mutation {
    /// New version of the mutated node; `None` after a delete
    pub node: Option<Node>,
    /// Rewritten nodes that no known node links to
    pub heads: Vec<Node>,
    /// Old -> new address for every rewritten node
    pub remapped: BTreeMap<Address, Address>,
    /// The deleted address
    pub removed: Option<Address>,
}

impl Mutation {
    /// The new head, when the change reached exactly one
    pub fn head(&self) -> Option<&Node> {
        match self.heads.as_slice() {
            [head] => Some(head),
            _ => None,
        }
    }

    /// Map an address from before the mutation to its replacement
    pub fn resolve(&self, address: &Address) -> Address {
        self.remapped.get(address).copied().unwrap_or(*address)
    }

    /// Number of nodes that received a new address
    pub fn rewritten(&self) -> usize {
        self.remapped.len()
    }
}

enum Change {
    Replace(NodeBody),
    Remove,
}

struct Staged {
    old: Address,
    node: Node,
    block: Bytes,
}

impl Graph {
    /// Link `children` into `parent`, replacing links with the same name
    ///
    /// The parent follows its supersession chain; children are linked at
    /// exactly the addresses given.
    pub async fn insert(
        &mut self,
        parent: &Address,
        children: &[Address],
        keys: &KeySet,
    ) -> Result<Mutation> {
        let parent = self.current(parent, keys).await?;
        let ancestors = self.ancestors(&parent.address);

        let mut body = parent.body.clone();
        for child in children {
            let child = self.read(child, keys).await?;
            if child.address == parent.address || ancestors.contains(&child.address) {
                return Err(Error::InvalidGraph(format!(
                    "linking {} under {} would create a cycle",
                    child.name(),
                    parent.name()
                )));
            }
            body.links.insert(child.name().to_string(), child.address);
        }

        self.propagate(parent.address, Change::Replace(body), keys)
            .await
    }

    /// Replace the value of a node
    pub async fn update(
        &mut self,
        address: &Address,
        value: Value,
        keys: &KeySet,
    ) -> Result<Mutation> {
        let node = self.current(address, keys).await?;
        let mut body = node.body;
        body.value = JsonValue::new(value);
        self.propagate(node.address, Change::Replace(body), keys)
            .await
    }

    /// Unlink a node from every known parent
    ///
    /// The block itself stays in the store.
    pub async fn delete(&mut self, address: &Address, keys: &KeySet) -> Result<Mutation> {
        let node = self.current(address, keys).await?;
        self.propagate(node.address, Change::Remove, keys).await
    }

    /// Known live ancestors of `address`
    fn ancestors(&self, address: &Address) -> HashSet<Address> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<_> = self.arena.live_parents(address).into();
        while let Some(parent) = queue.pop_front() {
            if seen.insert(parent) {
                queue.extend(self.arena.live_parents(&parent));
            }
        }
        seen
    }

    async fn propagate(
        &mut self,
        origin: Address,
        change: Change,
        keys: &KeySet,
    ) -> Result<Mutation> {
        let history = self.config.history;
        let ancestors = self.ancestors(&origin);

        // affected children each ancestor still waits on
        let mut pending: HashMap<Address, usize> = HashMap::new();
        for ancestor in &ancestors {
            let node = self.arena.get(ancestor).ok_or_else(|| {
                Error::InvalidGraph(format!("ancestor {} missing from arena", ancestor))
            })?;
            let waiting = node
                .children()
                .iter()
                .filter(|c| **c == origin || ancestors.contains(c))
                .count();
            pending.insert(*ancestor, waiting);
        }

        let mut remap: HashMap<Address, Option<Address>> = HashMap::new();
        let mut staged = Vec::new();
        let removed = match change {
            Change::Replace(mut body) => {
                if history {
                    body.links.insert(history_link(&body.name), origin);
                }
                let (node, block) = seal_node(body, keys)?;
                remap.insert(origin, Some(node.address));
                staged.push(Staged {
                    old: origin,
                    node,
                    block,
                });
                None
            }
            Change::Remove => {
                remap.insert(origin, None);
                Some(origin)
            }
        };

        let mut ready = VecDeque::new();
        self.release(&origin, &mut pending, &mut ready);

        while let Some(address) = ready.pop_front() {
            let old = self.arena.get(&address).cloned().ok_or_else(|| {
                Error::InvalidGraph(format!("ancestor {} missing from arena", address))
            })?;

            let mut body = old.body;
            body.links = relink(&body.links, &remap);
            if history {
                body.links.insert(history_link(&body.name), address);
            }

            let (node, block) = seal_node(body, keys)?;
            remap.insert(address, Some(node.address));
            staged.push(Staged {
                old: address,
                node,
                block,
            });
            self.release(&address, &mut pending, &mut ready);
        }

        let rewritten_ancestors = staged.len() - usize::from(removed.is_none());
        if rewritten_ancestors != ancestors.len() {
            return Err(Error::InvalidGraph(format!(
                "rewrote {} of {} ancestors",
                rewritten_ancestors,
                ancestors.len()
            )));
        }

        let total = staged.len();
        for (written, entry) in staged.iter().enumerate() {
            if let Err(e) = self.store.put(entry.block.clone()).await {
                tracing::warn!(written, total, error = %e, "propagation aborted");
                return Err(Error::Propagation {
                    written,
                    total,
                    source: Box::new(e),
                });
            }
        }

        // commit
        for (old, new) in &remap {
            self.arena.retire(*old, *new);
        }
        for entry in &staged {
            self.arena.revive(&entry.node.address);
            self.arena.observe(entry.node.clone());
        }

        let mut heads: Vec<Node> = Vec::new();
        for entry in &staged {
            let address = entry.node.address;
            if self.arena.live_parents(&address).is_empty()
                && !heads.iter().any(|h| h.address == address)
            {
                heads.push(entry.node.clone());
            }
        }

        tracing::info!(
            origin = %origin.short(),
            rewritten = total,
            heads = heads.len(),
            deleted = removed.is_some(),
            "propagated mutation"
        );

        let node = match removed {
            None => staged.first().map(|entry| entry.node.clone()),
            Some(_) => None,
        };
        let remapped = staged
            .into_iter()
            .map(|entry| (entry.old, entry.node.address))
            .collect();

        Ok(Mutation {
            node,
            heads,
            remapped,
            removed,
        })
    }

    /// Tell each parent of `child` that one more affected child is ready
    fn release(
        &self,
        child: &Address,
        pending: &mut HashMap<Address, usize>,
        ready: &mut VecDeque<Address>,
    ) {
        for parent in self.arena.live_parents(child) {
            if let Some(waiting) = pending.get_mut(&parent) {
                *waiting -= 1;
                if *waiting == 0 {
                    ready.push_back(parent);
                }
            }
        }
    }
}

/// Point structural links at replacements, dropping deleted targets
fn relink(links: &Links, remap: &HashMap<Address, Option<Address>>) -> Links {
    links
        .iter()
        .filter_map(|(name, target)| {
            if is_history_link(name) {
                return Some((name.clone(), *target));
            }
            match remap.get(target) {
                Some(Some(new)) => Some((name.clone(), *new)),
                Some(None) => None,
                None => Some((name.clone(), *target)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, SharedKey};
    use crate::store::Store;
    use serde_json::json;

    fn keys() -> KeySet {
        KeySet::shared(SharedKey::generate().unwrap())
    }

    #[tokio::test]
    async fn test_update_root() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let node = graph.write("solo", json!(1), &keys).await.unwrap();

        let mutation = graph.update(&node.address, json!(2), &keys).await.unwrap();
        let new = mutation.node.clone().unwrap();

        assert_eq!(new.value(), &json!(2));
        assert_eq!(new.previous(), Some(node.address));
        assert_eq!(mutation.head().unwrap().address, new.address);
        assert_eq!(mutation.resolve(&node.address), new.address);
    }

    #[tokio::test]
    async fn test_update_chain_rehashes_parent() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let leaf = graph.write("leaf", json!("a"), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[leaf.address], &keys)
            .await
            .unwrap();

        let mutation = graph.update(&leaf.address, json!("b"), &keys).await.unwrap();
        let head = mutation.head().unwrap();

        assert_ne!(head.address, root.address);
        assert_eq!(head.previous(), Some(root.address));
        assert_eq!(
            head.links().get("leaf"),
            Some(&mutation.node.as_ref().unwrap().address)
        );
        assert_eq!(graph.latest(&root.address).unwrap(), head.address);
    }

    #[tokio::test]
    async fn test_stale_address_follows_supersession() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let node = graph.write("n", json!(1), &keys).await.unwrap();

        graph.update(&node.address, json!(2), &keys).await.unwrap();
        let second = graph.update(&node.address, json!(3), &keys).await.unwrap();

        let latest = second.node.unwrap();
        assert_eq!(latest.value(), &json!(3));
        assert_eq!(graph.latest(&node.address).unwrap(), latest.address);
    }

    #[tokio::test]
    async fn test_mutating_deleted_node_fails() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let leaf = graph.write("leaf", json!(1), &keys).await.unwrap();
        graph
            .create("root", json!(null), &[leaf.address], &keys)
            .await
            .unwrap();

        let mutation = graph.delete(&leaf.address, &keys).await.unwrap();
        assert_eq!(mutation.removed, Some(leaf.address));
        assert!(mutation.node.is_none());
        assert!(mutation.head().unwrap().is_leaf());

        assert!(matches!(
            graph.update(&leaf.address, json!(2), &keys).await,
            Err(Error::Deleted(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_replaces_same_name() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let old_child = graph.write("child", json!(1), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[old_child.address], &keys)
            .await
            .unwrap();

        // a different node that happens to share the link name
        let new_child = graph.write("child", json!(2), &keys).await.unwrap();
        let mutation = graph
            .insert(&root.address, &[new_child.address], &keys)
            .await
            .unwrap();

        let head = mutation.head().unwrap();
        assert_eq!(head.children(), vec![new_child.address]);
    }

    #[tokio::test]
    async fn test_insert_rejects_cycle() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let leaf = graph.write("leaf", json!(1), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[leaf.address], &keys)
            .await
            .unwrap();

        assert!(matches!(
            graph.insert(&leaf.address, &[root.address], &keys).await,
            Err(Error::InvalidGraph(_))
        ));
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let config = crate::config::GraphConfig { history: false };
        let mut graph = Graph::with_config(Store::memory(), config);
        let keys = KeySet::own(&KeyPair::generate().unwrap().secret);
        let node = graph.write("n", json!(1), &keys).await.unwrap();

        let mutation = graph.update(&node.address, json!(2), &keys).await.unwrap();
        let new = mutation.node.unwrap();
        assert!(new.links().is_empty());
        assert_eq!(new.previous(), None);
    }

    #[tokio::test]
    async fn test_revert_without_history() {
        let config = crate::config::GraphConfig { history: false };
        let mut graph = Graph::with_config(Store::memory(), config);
        let keys = keys();
        let leaf = graph.write("leaf", json!(1), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[leaf.address], &keys)
            .await
            .unwrap();

        let changed = graph.update(&leaf.address, json!(2), &keys).await.unwrap();
        let changed_leaf = changed.node.unwrap().address;
        let reverted = graph.update(&changed_leaf, json!(1), &keys).await.unwrap();

        // identical content seals to the original addresses
        assert_eq!(reverted.node.as_ref().unwrap().address, leaf.address);
        let heads: Vec<_> = reverted.heads.iter().map(|n| n.address).collect();
        assert_eq!(heads, vec![root.address]);
        assert_eq!(graph.arena().heads(), vec![root.address]);
        assert_eq!(graph.latest(&leaf.address).unwrap(), leaf.address);
        assert_eq!(graph.latest(&changed_leaf).unwrap(), leaf.address);
        assert_eq!(graph.arena().live_parents(&leaf.address), vec![root.address]);

        // the chain stays usable from both old and current addresses
        let third = graph.update(&changed_leaf, json!(3), &keys).await.unwrap();
        assert_eq!(third.head().unwrap().previous(), None);
        assert_ne!(third.head().unwrap().address, root.address);
        let again = graph.update(&leaf.address, json!(4), &keys).await.unwrap();
        assert_eq!(again.node.unwrap().value(), &json!(4));
    }

    #[tokio::test]
    async fn test_insert_links_child_as_given() {
        let mut graph = Graph::new(Store::memory());
        let keys = keys();
        let child = graph.write("child", json!(1), &keys).await.unwrap();
        let holder = graph
            .create("holder", json!(null), &[child.address], &keys)
            .await
            .unwrap();
        graph.update(&child.address, json!(2), &keys).await.unwrap();

        let root = graph.write("root", json!(null), &keys).await.unwrap();
        let mutation = graph
            .insert(&root.address, &[child.address], &keys)
            .await
            .unwrap();
        assert_eq!(mutation.head().unwrap().children(), vec![child.address]);
        assert_ne!(graph.latest(&holder.address).unwrap(), holder.address);
    }
}
