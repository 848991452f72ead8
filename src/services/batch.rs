//! Whole-bucket scanning under a wall-clock budget.
//!
//! The budget is checked once before each object is claimed. There is no
//! mid-object cancellation: a scan already running finishes or hits its own
//! timeout.

use crate::{
    models::scan_result::ObjectScanResult,
    services::{
        object_store::{ObjectStore, StoreError, list_all_keys},
        pipeline::ScanPipeline,
    },
};
use futures::{StreamExt, stream};
use std::{
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Source of the remaining execution time for the current invocation.
pub trait TimeBudget: Send + Sync {
    fn remaining(&self) -> Duration;
}

impl<F> TimeBudget for F
where
    F: Fn() -> Duration + Send + Sync,
{
    fn remaining(&self) -> Duration {
        self()
    }
}

/// Budget counted down from a fixed monotonic instant.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }
}

impl TimeBudget for Deadline {
    fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

pub struct BatchDriver {
    store: Arc<dyn ObjectStore>,
    pipeline: Arc<ScanPipeline>,
    safety_margin: Duration,
    request_timeout: Duration,
    max_concurrency: usize,
}

impl BatchDriver {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        pipeline: Arc<ScanPipeline>,
        safety_margin: Duration,
        request_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            safety_margin,
            request_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Scan every object in `bucket`, in listing order.
    ///
    /// A listing failure aborts before any object is processed. Objects not
    /// reached before the budget runs low are simply absent from the result.
    pub async fn run(
        &self,
        bucket: &str,
        budget: &dyn TimeBudget,
    ) -> Result<Vec<ObjectScanResult>, StoreError> {
        let keys = list_all_keys(self.store.as_ref(), bucket, self.request_timeout).await?;
        let total = keys.len();
        info!(bucket, objects = total, "starting batch scan");

        let (results, stop) = self.scan_keys(bucket, keys, budget).await;
        let processed = results.len();
        let unprocessed = total - processed;
        if let Some(stop) = stop {
            warn!(
                bucket,
                processed,
                unprocessed,
                remaining_ms = stop.remaining.as_millis() as u64,
                margin_secs = self.safety_margin.as_secs(),
                next_key = %stop.next_key,
                "time budget nearly exhausted, batch stopped early"
            );
        }
        info!(bucket, processed, unprocessed, "batch scan finished");
        Ok(results)
    }

    /// Claim keys in order until one budget check fails; nothing is claimed
    /// after that.
    async fn scan_keys(
        &self,
        bucket: &str,
        keys: Vec<String>,
        budget: &dyn TimeBudget,
    ) -> (Vec<ObjectScanResult>, Option<BudgetStop>) {
        let stop = OnceLock::new();
        let results: Vec<ObjectScanResult> = stream::iter(keys)
            .map(|key| {
                let stop = &stop;
                async move {
                    if stop.get().is_some() {
                        return None;
                    }
                    let remaining = budget.remaining();
                    if remaining < self.safety_margin {
                        let _ = stop.set(BudgetStop {
                            next_key: key,
                            remaining,
                        });
                        return None;
                    }
                    Some(self.pipeline.process(bucket, &key).await)
                }
            })
            .buffered(self.max_concurrency)
            .filter_map(|result| async move { result })
            .collect()
            .await;
        (results, stop.into_inner())
    }
}

/// Where a batch gave up: the first key left unclaimed and the budget seen
/// at that check.
#[derive(Debug)]
struct BudgetStop {
    next_key: String,
    remaining: Duration,
}
