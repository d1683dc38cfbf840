use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use deadpool_redis::redis;
use deadpool_redis::Pool as QueuePool;
use shared::queue::{QueueMessage, SentMessage};

use crate::dispatcher::Dispatcher;

/// Appends every message of a send to the stream unless its deduplication
/// key is still alive, in which case the stream id stored under the key is
/// returned. KEYS[1] is the stream, KEYS[2..] the deduplication keys;
/// ARGV[1] is the window in seconds followed by four fields per message.
const ENQUEUE_SCRIPT: &str = r#"
local window = tonumber(ARGV[1])
local ids = {}
for i = 2, #KEYS do
    local field = (i - 2) * 4 + 1
    local existing = redis.call('GET', KEYS[i])
    if existing then
        ids[#ids + 1] = existing
    else
        local id = redis.call('XADD', KEYS[1], '*',
            'id', ARGV[field + 1],
            'group_id', ARGV[field + 2],
            'deduplication_id', ARGV[field + 3],
            'body', ARGV[field + 4])
        redis.call('SET', KEYS[i], id, 'EX', window)
        ids[#ids + 1] = id
    end
end
return ids
"#;

/// Dispatches messages to a Redis stream, deduplicating them over a sliding
/// window.
#[derive(Clone)]
pub struct RedisStreamDispatcher {
    pool: QueuePool,
    stream: String,
    dedup_window: Duration,
}

impl RedisStreamDispatcher {
    pub fn new(pool: QueuePool, stream: String, dedup_window: Duration) -> Self {
        Self {
            pool,
            stream,
            dedup_window,
        }
    }

    fn dedup_key(&self, deduplication_id: &str) -> String {
        dedup_key(&self.stream, deduplication_id)
    }

    fn enqueue_command(
        &self,
        messages: &[QueueMessage],
    ) -> anyhow::Result<redis::Cmd> {
        let mut cmd = redis::cmd("EVAL");
        cmd.arg(ENQUEUE_SCRIPT).arg(messages.len() + 1).arg(&self.stream);

        for message in messages {
            cmd.arg(self.dedup_key(&message.deduplication_id));
        }

        cmd.arg(self.dedup_window.as_secs().max(1));
        for message in messages {
            let body = message
                .serialized_body()
                .context("Failed to serialize queue message body")?;
            cmd.arg(&message.id)
                .arg(&message.group_id)
                .arg(&message.deduplication_id)
                .arg(body);
        }

        Ok(cmd)
    }
}

fn dedup_key(stream: &str, deduplication_id: &str) -> String {
    format!("{}:dedup:{}", stream, deduplication_id)
}

#[async_trait]
impl Dispatcher for RedisStreamDispatcher {
    async fn send(
        &self,
        messages: Vec<QueueMessage>,
    ) -> anyhow::Result<Vec<SentMessage>> {
        if messages.is_empty() {
            return Ok(vec![]);
        }

        let cmd = self.enqueue_command(&messages)?;
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get queue connection handle from deadpool")?;

        let queue_ids: Vec<String> = cmd
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to append to stream {}", self.stream))?;

        if queue_ids.len() != messages.len() {
            return Err(anyhow!(
                "Stream {} acknowledged {} of {} messages",
                self.stream,
                queue_ids.len(),
                messages.len()
            ));
        }

        Ok(messages
            .into_iter()
            .zip(queue_ids)
            .map(|(message, queue_id)| SentMessage {
                id: message.id,
                queue_id,
            })
            .collect())
    }
}
