//! Leaf-first graph traversal

use super::Graph;
use crate::crypto::KeySet;
use crate::model::{Address, Node};
use crate::Result;
use std::collections::{HashMap, HashSet};

impl Graph {
    /// Walk the graph below `start` depth-first, visiting children before parents
    ///
    /// Every reachable node is decrypted with `keys` and visited once, with
    /// siblings in link-name order. History links are not followed. An error
    /// from `visit` stops the walk. Returns the start node.
    pub async fn traverse<F>(&mut self, start: &Address, keys: &KeySet, mut visit: F) -> Result<Node>
    where
        F: FnMut(&Node) -> Result<()>,
    {
        let mut visited = HashSet::new();
        let mut expanded: HashMap<Address, Node> = HashMap::new();
        let mut stack = vec![(*start, false)];
        let mut root = None;

        while let Some((address, children_done)) = stack.pop() {
            if children_done {
                if let Some(node) = expanded.remove(&address) {
                    visit(&node)?;
                    if address == *start {
                        root = Some(node);
                    }
                }
                continue;
            }
            if !visited.insert(address) {
                continue;
            }

            let node = self.read(&address, keys).await?;
            stack.push((address, true));
            for child in node.children().into_iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
            expanded.insert(address, node);
        }

        tracing::debug!(start = %start.short(), nodes = visited.len(), "traversed");
        match root {
            Some(node) => Ok(node),
            None => self.read(start, keys).await,
        }
    }

    /// Traverse without visiting, so the arena knows every node below `start`
    pub async fn load(&mut self, start: &Address, keys: &KeySet) -> Result<Node> {
        self.traverse(start, keys, |_| Ok(())).await
    }

    /// Every node below `start` in visiting order
    pub async fn collect(&mut self, start: &Address, keys: &KeySet) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        self.traverse(start, keys, |node| {
            nodes.push(node.clone());
            Ok(())
        })
        .await?;
        Ok(nodes)
    }
}
