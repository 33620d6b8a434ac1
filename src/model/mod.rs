//! Core data model types for colgraph

mod address;
mod node;
mod value;

pub use address::Address;
pub use node::{history_link, is_history_link, Links, Node, NodeBody, LAST_SUFFIX};
pub use value::JsonValue;
