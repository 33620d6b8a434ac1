//! # colgraph
//!
//! An encrypted, content-addressed, linked-data graph with copy-on-write
//! update propagation.
//!
//! Every node is sealed with ChaCha20-Poly1305 before it is addressed, so a
//! node's address is the BLAKE3 digest of its ciphertext. Changing a node
//! writes a new version and rehashes every ancestor up to the graph heads.
//!
//! ## Core Concepts
//!
//! - **Nodes**: immutable blocks holding a name, a JSON value and named links
//! - **Key sets**: asymmetric sealing/opening keys or a shared symmetric key
//! - **Mutations**: insert, update and delete, each returning the new heads
//! - **Stores**: a read-through cache over memory, file or HTTP backends
//!
//! ## Example
//!
//! ```ignore
//! use colgraph::{Graph, KeySet, SecretKey, Store};
//! use serde_json::json;
//!
//! let keys = KeySet::own(&SecretKey::generate()?);
//! let mut graph = Graph::new(Store::memory());
//! let leaf = graph.write("g30", json!({"colName": "g30"}), &keys).await?;
//! let root = graph.create("g20", json!({"colName": "g20"}), &[leaf.address], &keys).await?;
//! let mutation = graph.update(&leaf.address, json!({"colName": "g30 v2"}), &keys).await?;
//! ```

pub mod account;
pub mod config;
pub mod crypto;
pub mod graph;
pub mod model;
pub mod store;

mod error;

pub use account::{Account, AccountId, Directory, Mailbox, Message, MessageType};
pub use config::Config;
pub use crypto::{KeyMode, KeyPair, KeySet, PublicKey, SecretKey, SessionKeys, SharedKey};
pub use error::{Error, Result};
pub use graph::{DagBuilder, Diff, DiffEntry, Graph, Mutation};
pub use model::{Address, Node, NodeBody};
pub use store::{BlockStore, Store, StoreOptions};

/// Store file format version
pub const VERSION: u32 = 1;

/// Magic bytes for file identification
pub const MAGIC: &[u8; 8] = b"COLGRAPH";
