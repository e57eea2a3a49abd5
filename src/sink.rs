//! Downstream sink contract
//!
//! Whatever consumes delivered messages implements [`DownstreamSink`]. The
//! adapter bounds the blocking wait in `accept` with its send timeout;
//! returning an error rejects that single message only.

use crate::message::Message;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Reasons a sink can refuse a message
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink examined the message and refused it
    #[error("sink rejected message: {0}")]
    Rejected(String),

    /// The consumer behind the sink has gone away
    #[error("sink is closed")]
    Closed,
}

/// Consumes delivered messages
#[async_trait]
pub trait DownstreamSink: Send + Sync {
    /// Accept ownership of a message. May block; the adapter applies its
    /// send timeout around this call.
    async fn accept(&self, message: Message) -> Result<(), SinkError>;
}

/// Sink backed by a tokio mpsc channel.
///
/// Blocks while the channel is full, which is exactly the wait the
/// adapter's send timeout bounds.
pub struct ChannelSink {
    sender: mpsc::Sender<Message>,
}

impl ChannelSink {
    /// Wrap an mpsc sender as a sink
    pub fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl DownstreamSink for ChannelSink {
    async fn accept(&self, message: Message) -> Result<(), SinkError> {
        self.sender.send(message).await.map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_messages() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx);

        sink.accept(Message::new("one")).await.unwrap();
        sink.accept(Message::new("two")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().payload().as_ref(), b"one");
        assert_eq!(rx.recv().await.unwrap().payload().as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelSink::new(tx);

        let result = sink.accept(Message::new("lost")).await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }
}
