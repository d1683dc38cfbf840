use chrono::Utc;
use shared::error::{AsDbError, MainError};

use super::CrawlScheduler;

impl CrawlScheduler {
    /// Releases claims of this instance's direction whose tick never
    /// committed. Crawl progress is left as it is.
    pub async fn reconcile_tick(&self) -> Result<(), MainError> {
        let direction = self.settings.direction();
        let cutoff = self.settings.stale_cutoff(Utc::now().naive_utc());

        let stale = self
            .collections
            .find_stale(direction, cutoff)
            .await
            .into_db_error()?;

        if stale.is_empty() {
            return Ok(());
        }

        for address in &stale {
            tracing::warn!(
                contract_address = address,
                %direction,
                "Releasing stale claim"
            );
        }

        let released = self
            .collections
            .reset_processing(stale, direction, cutoff)
            .await
            .into_db_error()?;

        tracing::info!(%direction, released, "Stale claims released");

        Ok(())
    }
}
