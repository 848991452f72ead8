//! Entry point shared by the CLI and HTTP surfaces.
//!
//! Decides between reactive (notification records present) and batch mode,
//! runs the work and folds everything into a [`ScanSummary`].

use crate::{
    errors::InvocationError,
    models::{event::InvocationEvent, summary::ScanSummary},
    services::{
        batch::{BatchDriver, Deadline, TimeBudget},
        pipeline::ScanPipeline,
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

pub struct Invoker {
    pipeline: Arc<ScanPipeline>,
    batch: BatchDriver,
    default_bucket: Option<String>,
    invocation_budget: Duration,
}

impl Invoker {
    pub fn new(
        pipeline: Arc<ScanPipeline>,
        batch: BatchDriver,
        default_bucket: Option<String>,
        invocation_budget: Duration,
    ) -> Self {
        Self {
            pipeline,
            batch,
            default_bucket,
            invocation_budget,
        }
    }

    /// Handle one invocation with a fresh time budget.
    pub async fn invoke(&self, event: &InvocationEvent) -> ScanSummary {
        let deadline = Deadline::after(self.invocation_budget);
        self.invoke_with_budget(event, &deadline).await
    }

    pub async fn invoke_with_budget(
        &self,
        event: &InvocationEvent,
        budget: &dyn TimeBudget,
    ) -> ScanSummary {
        let summary = match self.dispatch(event, budget).await {
            Ok(summary) => summary,
            Err(err) => {
                error!("invocation aborted: {}", err);
                ScanSummary::aborted(err.to_string())
            }
        };
        info!(
            total = summary.total_scanned,
            clean = summary.clean,
            infected = summary.infected,
            errors = summary.errors,
            skipped = summary.skipped,
            "invocation complete"
        );
        if summary.infected > 0 {
            let infected: Vec<&str> = summary.infected_keys().collect();
            warn!(?infected, "infected objects require quarantine");
        }
        summary
    }

    async fn dispatch(
        &self,
        event: &InvocationEvent,
        budget: &dyn TimeBudget,
    ) -> Result<ScanSummary, InvocationError> {
        if !event.records.is_empty() {
            info!(records = event.records.len(), "reactive invocation");
            let mut summary = ScanSummary::default();
            for record in &event.records {
                let (bucket, key) = (record.s3.bucket.name.as_str(), record.s3.object.key.as_str());
                debug!(bucket, key, announced_size = ?record.s3.object.size, "notification record");
                summary.record(self.pipeline.process(bucket, key).await);
            }
            return Ok(summary);
        }

        let bucket = event
            .bucket
            .as_deref()
            .or(self.default_bucket.as_deref())
            .filter(|b| !b.is_empty())
            .ok_or(InvocationError::NoBucket)?;
        info!(bucket, "batch invocation");

        let results = self
            .batch
            .run(bucket, budget)
            .await
            .map_err(|source| InvocationError::Enumeration {
                bucket: bucket.to_string(),
                source,
            })?;
        Ok(results.into_iter().collect())
    }
}
