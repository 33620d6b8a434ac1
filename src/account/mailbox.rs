//! Message delivery

use super::AccountId;
use crate::model::Address;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the reader of a message should open the graph it points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    /// Sealed to the recipient's box key
    MessageMe,
    /// Encrypted with the session key shared with the recipient
    ShareData,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::MessageMe => f.write_str("MessageMe"),
            MessageType::ShareData => f.write_str("ShareData"),
        }
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MessageMe" => Ok(MessageType::MessageMe),
            "ShareData" => Ok(MessageType::ShareData),
            other => Err(Error::UnknownMessageType(other.to_string())),
        }
    }
}

/// A graph address delivered from one account to another
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: AccountId,
    pub to: AccountId,
    /// Type tag, parsed as a [`MessageType`] by the reader
    pub asset_code: String,
    pub memo: Address,
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<()>;

    /// Messages addressed to `account`, oldest first
    async fn inbox(&self, account: &AccountId) -> Result<Vec<Message>>;
}

#[derive(Default)]
pub struct MemoryMailbox {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Mailbox for MemoryMailbox {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.messages.write().push(message);
        Ok(())
    }

    async fn inbox(&self, account: &AccountId) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| &m.to == account)
            .cloned()
            .collect())
    }
}
