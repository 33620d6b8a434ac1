//! Node encryption
//!
//! Three mutually exclusive key configurations protect node payloads:
//!
//! - **Asymmetric**: X25519 agreement between the writer's secret key and
//!   the reader's public key, bound to the message direction
//! - **Shared**: a symmetric key agreed once between two parties
//! - **Key exchange**: derive that shared key as a receive/transmit pair
//!
//! Every mode ends in ChaCha20-Poly1305 over a compressed node body (see
//! [`envelope`]).

pub mod envelope;
mod exchange;
mod keys;
mod keyset;

pub use envelope::{block_mode, open, seal};
pub use exchange::SessionKeys;
pub(crate) use keys::random_bytes;
pub use keys::{KeyPair, PublicKey, SecretKey, SharedKey, KEY_SIZE};
pub use keyset::{KeyMode, KeySet};
