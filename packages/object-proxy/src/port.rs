//! The asynchronous message port between host and worker.

use tokio::sync::mpsc;

use syncproxy_core::{ProxyError, ProxyMessage, Result};

/// One direction of a best-effort asynchronous message channel.
///
/// Posting never blocks. The host and the client each own the sending half
/// toward the other side.
pub trait PostMessage: Send + Sync {
    /// Queue a message for the other side.
    fn post(&self, message: ProxyMessage) -> Result<()>;
}

impl PostMessage for mpsc::UnboundedSender<ProxyMessage> {
    fn post(&self, message: ProxyMessage) -> Result<()> {
        self.send(message).map_err(|_| ProxyError::ChannelClosed)
    }
}

/// Receiving half of a port.
pub type MessageReceiver = mpsc::UnboundedReceiver<ProxyMessage>;

/// Create a connected port pair.
pub fn message_channel() -> (mpsc::UnboundedSender<ProxyMessage>, MessageReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncproxy_core::ObjectId;

    #[test]
    fn post_after_close_is_channel_closed() {
        let (tx, rx) = message_channel();
        drop(rx);
        let result = tx.post(ProxyMessage::PrintObject {
            request_id: 0,
            id: ObjectId::new(),
            path: Vec::new(),
        });
        assert!(matches!(result, Err(ProxyError::ChannelClosed)));
    }

    #[tokio::test]
    async fn posted_messages_arrive_in_order() {
        let (tx, mut rx) = message_channel();
        for request_id in 0..3 {
            tx.post(ProxyMessage::PrintObject {
                request_id,
                id: ObjectId::from_string("a"),
                path: Vec::new(),
            })
            .unwrap();
        }
        for expected in 0..3 {
            match rx.recv().await {
                Some(ProxyMessage::PrintObject { request_id, .. }) => {
                    assert_eq!(request_id, expected)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
