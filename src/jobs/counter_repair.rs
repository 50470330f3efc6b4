use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::counters::CounterStore;

const ERROR_BACKOFF_MS: u64 = 1000;

/// Periodically rewrites cached post counters that drifted from the detail
/// tables. Runs until the surrounding task is dropped.
pub async fn run(store: CounterStore, interval: Duration) -> Result<()> {
    info!("counter repair started");
    loop {
        match store.repair_all().await {
            Ok(0) => {}
            Ok(repaired) => info!(repaired = repaired, "repaired drifted post counters"),
            Err(err) => {
                warn!(error = ?err, "counter repair failed, backing off");
                tokio::time::sleep(Duration::from_millis(ERROR_BACKOFF_MS)).await;
                continue;
            }
        }
        tokio::time::sleep(interval).await;
    }
}
