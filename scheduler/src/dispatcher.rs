use async_trait::async_trait;
use shared::queue::{QueueMessage, SentMessage};

/// Hands queue messages over to the downstream consumers.
///
/// Sending a message whose deduplication id was already sent within the
/// transport's deduplication window must not enqueue it twice; the receipt of
/// the earlier send is returned instead.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        messages: Vec<QueueMessage>,
    ) -> anyhow::Result<Vec<SentMessage>>;
}
