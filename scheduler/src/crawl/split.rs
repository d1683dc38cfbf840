use shared::error::{AsDbError, AsDispatchError, MainError};
use shared::queue::{bodies_for_ranges, QueueMessage};

use super::CrawlScheduler;

impl CrawlScheduler {
    /// Re-dispatches the oldest bounced task of this instance's source as two
    /// halves, or as is when it cannot be halved, then forgets the task.
    pub async fn split_tick(&self) -> Result<(), MainError> {
        let Some(task) = self
            .tasks
            .pop_one_split_task(self.settings.source)
            .await
            .into_db_error()?
        else {
            return Ok(());
        };

        let messages = bodies_for_ranges(
            &task.contract_address,
            task.token_type,
            task.split(),
        )
        .into_iter()
        .map(QueueMessage::new)
        .collect::<Vec<_>>();

        let sent = self
            .dispatcher
            .send(messages)
            .await
            .into_dispatch_error()?;

        self.tasks
            .delete(task.message_id.clone())
            .await
            .into_db_error()?;

        tracing::info!(
            message_id = task.message_id,
            contract_address = task.contract_address,
            range = %task.range,
            messages = sent.len(),
            "Split task re-dispatched"
        );

        Ok(())
    }
}
