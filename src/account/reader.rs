//! Reading delivered graphs

use super::{Account, Directory, Message, MessageType, BOX_ENTRY};
use crate::crypto::KeySet;
use crate::graph::Graph;
use crate::model::Node;
use crate::Result;

/// Open and visit the graph behind each message
///
/// A failing message yields its error in place without stopping the rest.
pub async fn read_messages<F>(
    account: &Account,
    directory: &dyn Directory,
    graph: &mut Graph,
    messages: &[Message],
    mut visit: F,
) -> Vec<Result<Node>>
where
    F: FnMut(&Node) -> Result<()>,
{
    let mut results = Vec::with_capacity(messages.len());
    for message in messages {
        let result = read_message(account, directory, graph, message, &mut visit).await;
        if let Err(e) = &result {
            tracing::warn!(from = %message.from.short(), tag = %message.asset_code, error = %e, "unreadable message");
        }
        results.push(result);
    }
    results
}

async fn read_message<F>(
    account: &Account,
    directory: &dyn Directory,
    graph: &mut Graph,
    message: &Message,
    visit: &mut F,
) -> Result<Node>
where
    F: FnMut(&Node) -> Result<()>,
{
    let kind: MessageType = message.asset_code.parse()?;
    let keys = match kind {
        MessageType::MessageMe => {
            let sender = directory.lookup(&message.from, BOX_ENTRY).await?;
            KeySet::opening(account.box_keys().secret.clone(), sender)
        }
        MessageType::ShareData => {
            let session = account.shared_with(directory, &message.from).await?;
            KeySet::shared(session.rx)
        }
    };

    let node = graph.read(&message.memo, &keys).await?;
    if node.is_leaf() {
        visit(&node)?;
        Ok(node)
    } else {
        graph.traverse(&message.memo, &keys, &mut *visit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryDirectory, MemoryMailbox, Mailbox};
    use crate::store::Store;
    use crate::Error;
    use serde_json::json;

    #[tokio::test]
    async fn test_message_me_and_share_data() {
        let directory = MemoryDirectory::new();
        let mailbox = MemoryMailbox::new();
        let alice = Account::generate().unwrap();
        let bob = Account::generate().unwrap();
        alice.publish(&directory).await.unwrap();
        bob.publish(&directory).await.unwrap();

        let mut graph = Graph::new(Store::memory());

        let sealed = alice.message_keys(&directory, &bob.id()).await.unwrap();
        let note = graph.write("note", json!("hi bob"), &sealed).await.unwrap();
        alice
            .send(&mailbox, note.address, &bob.id(), MessageType::MessageMe)
            .await
            .unwrap();

        let shared = alice.share_keys(&directory, &bob.id()).await.unwrap();
        let leaf = graph.write("leaf", json!(1), &shared).await.unwrap();
        let root = graph
            .create("root", json!(0), &[leaf.address], &shared)
            .await
            .unwrap();
        alice
            .send(&mailbox, root.address, &bob.id(), MessageType::ShareData)
            .await
            .unwrap();

        let inbox = mailbox.inbox(&bob.id()).await.unwrap();
        let mut seen = Vec::new();
        let results = read_messages(&bob, &directory, &mut graph, &inbox, |node| {
            seen.push(node.name().to_string());
            Ok(())
        })
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(seen, vec!["note", "leaf", "root"]);
    }

    #[tokio::test]
    async fn test_unknown_tag_fails_only_that_message() {
        let directory = MemoryDirectory::new();
        let alice = Account::generate().unwrap();
        let bob = Account::generate().unwrap();
        alice.publish(&directory).await.unwrap();
        bob.publish(&directory).await.unwrap();

        let mut graph = Graph::new(Store::memory());
        let keys = alice.message_keys(&directory, &bob.id()).await.unwrap();
        let note = graph.write("note", json!("x"), &keys).await.unwrap();

        let message = |tag: &str| Message {
            from: alice.id(),
            to: bob.id(),
            asset_code: tag.to_string(),
            memo: note.address,
        };
        let messages = vec![message("Invoice"), message("MessageMe")];

        let results = read_messages(&bob, &directory, &mut graph, &messages, |_| Ok(())).await;
        assert!(matches!(results[0], Err(Error::UnknownMessageType(_))));
        assert_eq!(results[1].as_ref().unwrap().value(), &json!("x"));
    }
}
