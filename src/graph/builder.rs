//! Batch construction of a DAG by node name

use super::Graph;
use crate::crypto::KeySet;
use crate::model::{Address, NodeBody};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// A DAG described by names, written to a [`Graph`] in one pass
///
/// ```ignore
/// let mut dag = DagBuilder::new();
/// dag.node("g00", json!({"colName": "g00"}))
///     .node("g10", json!({"colName": "g10"}))
///     .edge("g00", "g10");
/// let addresses = dag.submit(&mut graph, &keys).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct DagBuilder {
    nodes: Vec<(String, Value)>,
    edges: Vec<(String, String)>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.nodes.push((name.into(), value));
        self
    }

    /// Link `child` under `parent`; the link is named after the child
    pub fn edge(&mut self, parent: impl Into<String>, child: impl Into<String>) -> &mut Self {
        self.edges.push((parent.into(), child.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the description and order it children-first
    fn plan(&self) -> Result<(Vec<usize>, Vec<BTreeSet<usize>>)> {
        let mut index = HashMap::new();
        for (i, (name, _)) in self.nodes.iter().enumerate() {
            if index.insert(name.as_str(), i).is_some() {
                return Err(Error::InvalidGraph(format!("duplicate node name: {}", name)));
            }
        }

        let lookup = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| Error::InvalidGraph(format!("edge references unknown node: {}", name)))
        };

        let mut children = vec![BTreeSet::new(); self.nodes.len()];
        let mut parents = vec![Vec::new(); self.nodes.len()];
        for (parent, child) in &self.edges {
            let (p, c) = (lookup(parent.as_str())?, lookup(child.as_str())?);
            if children[p].insert(c) {
                parents[c].push(p);
            }
        }

        let mut waiting: Vec<usize> = children.iter().map(|c| c.len()).collect();
        let mut ready: VecDeque<usize> = (0..self.nodes.len()).filter(|i| waiting[*i] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &p in &parents[i] {
                waiting[p] -= 1;
                if waiting[p] == 0 {
                    ready.push_back(p);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<_> = (0..self.nodes.len())
                .filter(|i| waiting[*i] > 0)
                .map(|i| self.nodes[i].0.as_str())
                .collect();
            return Err(Error::InvalidGraph(format!(
                "cycle through: {}",
                stuck.join(", ")
            )));
        }
        Ok((order, children))
    }

    /// Write every node, leaves first, and return each name's address
    ///
    /// Nothing is written if the description is invalid.
    pub async fn submit(&self, graph: &mut Graph, keys: &KeySet) -> Result<BTreeMap<String, Address>> {
        let (order, children) = self.plan()?;

        let mut written: Vec<Option<Address>> = vec![None; self.nodes.len()];
        let mut addresses = BTreeMap::new();
        for i in order {
            let (name, value) = &self.nodes[i];
            let mut body = NodeBody::new(name.clone(), value.clone());
            for &c in &children[i] {
                let address = written[c].ok_or_else(|| {
                    Error::InvalidGraph(format!("{} written before its child", name))
                })?;
                body.links.insert(self.nodes[c].0.clone(), address);
            }

            let node = graph.persist(body, keys).await?;
            written[i] = Some(node.address);
            addresses.insert(name.clone(), node.address);
        }

        tracing::debug!(nodes = addresses.len(), "submitted dag");
        Ok(addresses)
    }
}
