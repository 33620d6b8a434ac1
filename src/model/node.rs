//! Node type - one immutable version of a graph vertex

use super::{Address, JsonValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Link-name suffix marking a pointer to a node's previous version
pub const LAST_SUFFIX: &str = "_last";

/// Named links from a node to its children
///
/// Ordered so the serialized form, and therefore the address, is stable.
pub type Links = BTreeMap<String, Address>;

/// Check if a link name is a history pointer rather than a structural edge
pub fn is_history_link(name: &str) -> bool {
    name.ends_with(LAST_SUFFIX)
}

/// The history link name for a node called `name`
pub fn history_link(name: &str) -> String {
    format!("{name}{LAST_SUFFIX}")
}

/// The plaintext that gets encrypted into a block
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeBody {
    pub name: String,
    pub value: JsonValue,
    pub links: Links,
}

impl NodeBody {
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        NodeBody {
            name: name.into(),
            value: JsonValue::new(value),
            links: Links::new(),
        }
    }

    /// Encode for encryption
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode after decryption
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// A decrypted node together with the address of its block
///
/// Nodes are never changed in place. Mutations go through
/// [`Graph`](crate::graph::Graph), which writes a new version and rehashes
/// the ancestors.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub address: Address,
    pub body: NodeBody,
}

impl Node {
    pub fn new(address: Address, body: NodeBody) -> Self {
        Node { address, body }
    }

    pub fn name(&self) -> &str {
        &self.body.name
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.body.value
    }

    /// All links, history pointers included
    pub fn links(&self) -> &Links {
        &self.body.links
    }

    /// Links that form the graph structure (everything but `_last` pointers)
    pub fn structural_links(&self) -> impl Iterator<Item = (&String, &Address)> {
        self.body
            .links
            .iter()
            .filter(|(name, _)| !is_history_link(name))
    }

    /// Distinct structural children, in link-name order
    pub fn children(&self) -> Vec<Address> {
        let mut seen = std::collections::HashSet::new();
        self.structural_links()
            .filter_map(|(_, addr)| seen.insert(*addr).then_some(*addr))
            .collect()
    }

    /// Address of the version this node replaced, if history is tracked
    pub fn previous(&self) -> Option<Address> {
        self.body.links.get(&history_link(&self.body.name)).copied()
    }

    /// Check whether any structural link is present
    pub fn is_leaf(&self) -> bool {
        self.structural_links().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(tag: &[u8]) -> Address {
        Address::digest(tag)
    }

    #[test]
    fn test_history_links_are_not_structural() {
        let mut body = NodeBody::new("g20", json!({"colName": "g20"}));
        body.links.insert("g30".into(), addr(b"g30"));
        body.links.insert(history_link("g20"), addr(b"old g20"));
        let node = Node::new(addr(b"g20"), body);

        assert_eq!(node.children(), vec![addr(b"g30")]);
        assert_eq!(node.previous(), Some(addr(b"old g20")));
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_children_deduplicates_targets() {
        let mut body = NodeBody::new("p", json!(null));
        body.links.insert("a".into(), addr(b"x"));
        body.links.insert("b".into(), addr(b"x"));
        let node = Node::new(addr(b"p"), body);

        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn test_body_encoding_is_deterministic() {
        let mut a = NodeBody::new("n", json!({"k": 1, "a": [true]}));
        a.links.insert("z".into(), addr(b"z"));
        a.links.insert("b".into(), addr(b"b"));
        let b = a.clone();

        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
        assert_eq!(NodeBody::decode(&a.encode().unwrap()).unwrap(), a);
    }
}
