//! The encrypted node graph
//!
//! A [`Graph`] writes nodes to a [`Store`] as encrypted blocks and keeps an
//! [`Arena`] of every node it has decrypted this session. Mutations never
//! change a block: they write a new version and rehash each known ancestor
//! up to the heads (see [`Mutation`]).

mod arena;
mod builder;
mod diff;
mod mutation;
mod traversal;

pub use arena::Arena;
pub use builder::DagBuilder;
pub use diff::{Diff, DiffEntry};
pub use mutation::Mutation;

use crate::config::GraphConfig;
use crate::crypto::{self, KeySet};
use crate::model::{Address, Node, NodeBody};
use crate::store::Store;
use crate::Result;
use bytes::Bytes;
use serde_json::Value;

pub struct Graph {
    store: Store,
    arena: Arena,
    config: GraphConfig,
}

impl Graph {
    pub fn new(store: Store) -> Self {
        Self::with_config(store, GraphConfig::default())
    }

    pub fn with_config(store: Store, config: GraphConfig) -> Self {
        Graph {
            store,
            arena: Arena::new(),
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Write a node without links
    pub async fn write(
        &mut self,
        name: impl Into<String>,
        value: Value,
        keys: &KeySet,
    ) -> Result<Node> {
        self.persist(NodeBody::new(name, value), keys).await
    }

    /// Write a node linking to `children`, each link named after the child
    ///
    /// Children are linked at exactly the addresses given, superseded or
    /// not. A later child with the same name as an earlier one takes its
    /// link.
    pub async fn create(
        &mut self,
        name: impl Into<String>,
        value: Value,
        children: &[Address],
        keys: &KeySet,
    ) -> Result<Node> {
        let mut body = NodeBody::new(name, value);
        for child in children {
            let child = self.read(child, keys).await?;
            body.links.insert(child.name().to_string(), child.address);
        }
        self.persist(body, keys).await
    }

    /// Fetch and decrypt one node
    pub async fn read(&mut self, address: &Address, keys: &KeySet) -> Result<Node> {
        let block = self.store.get(address).await?;
        let plaintext = crypto::open(keys, &block)?;
        let node = Node::new(*address, NodeBody::decode(&plaintext)?);
        self.arena.observe(node.clone());
        Ok(node)
    }

    /// The current version of `address` within this session
    pub fn latest(&self, address: &Address) -> Result<Address> {
        self.arena.latest(address)
    }

    /// Read the current version of a possibly stale address
    pub(crate) async fn current(&mut self, address: &Address, keys: &KeySet) -> Result<Node> {
        let latest = self.arena.latest(address)?;
        self.read(&latest, keys).await
    }

    /// A node from the arena, decrypting it on first sight
    pub(crate) async fn node(&mut self, address: &Address, keys: &KeySet) -> Result<Node> {
        match self.arena.get(address) {
            Some(node) => Ok(node.clone()),
            None => self.read(address, keys).await,
        }
    }

    pub(crate) async fn persist(&mut self, body: NodeBody, keys: &KeySet) -> Result<Node> {
        let (node, block) = seal_node(body, keys)?;
        self.store.put(block).await?;
        tracing::debug!(name = node.name(), address = %node.address.short(), "wrote node");
        self.arena.revive(&node.address);
        self.arena.observe(node.clone());
        Ok(node)
    }
}

/// Encrypt a body into a block and the node it addresses
pub(crate) fn seal_node(body: NodeBody, keys: &KeySet) -> Result<(Node, Bytes)> {
    let block = crypto::seal(keys, &body.encode()?)?;
    let address = Address::digest(&block);
    Ok((Node::new(address, body), Bytes::from(block)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, SharedKey};
    use crate::Error;
    use serde_json::json;

    fn own_keys() -> KeySet {
        KeySet::own(&KeyPair::generate().unwrap().secret)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let mut graph = Graph::new(Store::memory());
        let keys = own_keys();

        let node = graph.write("g30", json!({"colName": "g30"}), &keys).await.unwrap();
        let read = graph.read(&node.address, &keys).await.unwrap();

        assert_eq!(read.value(), &json!({"colName": "g30"}));
        assert_eq!(read.name(), "g30");
        assert!(read.is_leaf());
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let mut graph = Graph::new(Store::memory());
        let keys = KeySet::shared(SharedKey::generate().unwrap());

        let a = graph.write("n", json!(1), &keys).await.unwrap();
        let b = graph.write("n", json!(1), &keys).await.unwrap();
        let c = graph.write("n", json!(2), &keys).await.unwrap();

        assert_eq!(a.address, b.address);
        assert_ne!(a.address, c.address);
    }

    #[tokio::test]
    async fn test_create_names_links_after_children() {
        let mut graph = Graph::new(Store::memory());
        let keys = own_keys();

        let left = graph.write("left", json!("l"), &keys).await.unwrap();
        let right = graph.write("right", json!("r"), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[left.address, right.address], &keys)
            .await
            .unwrap();

        assert_eq!(root.links().get("left"), Some(&left.address));
        assert_eq!(root.links().get("right"), Some(&right.address));
        assert_eq!(graph.arena().live_parents(&left.address), vec![root.address]);
    }

    #[tokio::test]
    async fn test_rewrite_after_delete_is_linkable() {
        let mut graph = Graph::new(Store::memory());
        let keys = own_keys();

        let leaf = graph.write("leaf", json!(1), &keys).await.unwrap();
        graph
            .create("root", json!(null), &[leaf.address], &keys)
            .await
            .unwrap();
        graph.delete(&leaf.address, &keys).await.unwrap();
        assert!(matches!(graph.latest(&leaf.address), Err(Error::Deleted(_))));

        let again = graph.write("leaf", json!(1), &keys).await.unwrap();
        assert_eq!(again.address, leaf.address);
        assert_eq!(graph.latest(&again.address).unwrap(), again.address);

        let root = graph
            .create("root2", json!(null), &[again.address], &keys)
            .await
            .unwrap();
        assert_eq!(root.links().get("leaf"), Some(&again.address));
        assert_eq!(graph.arena().live_parents(&again.address), vec![root.address]);
    }

    #[tokio::test]
    async fn test_create_links_the_given_version() {
        let mut graph = Graph::new(Store::memory());
        let keys = own_keys();

        let v1 = graph.write("leaf", json!(1), &keys).await.unwrap();
        let root = graph
            .create("root", json!(null), &[v1.address], &keys)
            .await
            .unwrap();
        let v2 = graph.update(&v1.address, json!(2), &keys).await.unwrap();
        let v2 = v2.node.unwrap();

        let again = graph.write("leaf", json!(1), &keys).await.unwrap();
        assert_eq!(again.address, v1.address);

        let parent = graph
            .create("parent", json!(null), &[again.address], &keys)
            .await
            .unwrap();
        let linked = *parent.links().get("leaf").unwrap();
        assert_eq!(linked, v1.address);
        assert_ne!(linked, v2.address);
        let child = graph.read(&linked, &keys).await.unwrap();
        assert_eq!(child.value(), &json!(1));

        // a superseded address is linked as given, not as its latest version
        assert!(graph.arena().is_superseded(&root.address));
        let top = graph
            .create("top", json!(null), &[root.address], &keys)
            .await
            .unwrap();
        assert_eq!(top.links().get("root"), Some(&root.address));
    }

    #[tokio::test]
    async fn test_read_with_wrong_keys() {
        let mut graph = Graph::new(Store::memory());
        let node = graph.write("n", json!(1), &own_keys()).await.unwrap();

        assert!(matches!(
            graph.read(&node.address, &own_keys()).await,
            Err(Error::Decryption(_))
        ));
        let shared = KeySet::shared(SharedKey::generate().unwrap());
        assert!(matches!(
            graph.read(&node.address, &shared).await,
            Err(Error::KeyMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let mut graph = Graph::new(Store::memory());
        let missing = Address::digest(b"missing");
        assert!(matches!(
            graph.read(&missing, &own_keys()).await,
            Err(Error::NotFound(_))
        ));
    }
}
