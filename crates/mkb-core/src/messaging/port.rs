use async_trait::async_trait;

use crate::{domain::ChannelName, Result};

/// Outbound side of the chat connection.
///
/// The inbound side is a stream of [`ChatEvent`](super::types::ChatEvent)s
/// produced by the adapter; connecting is adapter-specific and not part of the port.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn join(&self, channel: &ChannelName) -> Result<()>;
    async fn leave(&self, channel: &ChannelName) -> Result<()>;
    async fn send(&self, channel: &ChannelName, text: &str) -> Result<()>;
}
