//! The orchestration controller: validate, query, dispatch, summarize.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use shopwatch_core::ports::{EligibilityIndex, WorkQueue};
use shopwatch_core::types::{
    OperationType, OrchestrationDefaults, OrchestrationRequest, OrchestrationSummary,
};
use shopwatch_state::codec;

use crate::dispatcher::BatchDispatcher;
use crate::eligibility::find_eligible;
use crate::error::{OrchestrateError, OrchestrateResult};

/// Drives one orchestration run end to end. Holds the index, one queue
/// per operation, and the defaults applied to absent request fields.
pub struct OrchestrationController {
    index: Arc<dyn EligibilityIndex>,
    queues: HashMap<OperationType, Arc<dyn WorkQueue>>,
    defaults: OrchestrationDefaults,
}

impl OrchestrationController {
    pub fn new(index: Arc<dyn EligibilityIndex>, defaults: OrchestrationDefaults) -> Self {
        Self {
            index,
            queues: HashMap::new(),
            defaults,
        }
    }

    /// Route an operation's dispatches to `queue`.
    pub fn with_queue(mut self, operation: OperationType, queue: Arc<dyn WorkQueue>) -> Self {
        self.queues.insert(operation, queue);
        self
    }

    /// Run an orchestration against the current wall clock.
    pub async fn run(&self, request: &OrchestrationRequest) -> OrchestrateResult<OrchestrationSummary> {
        self.run_at(request, Utc::now()).await
    }

    /// Run an orchestration with an explicit `now`, so the cutoff is
    /// deterministic under test.
    pub async fn run_at(
        &self,
        request: &OrchestrationRequest,
        now: DateTime<Utc>,
    ) -> OrchestrateResult<OrchestrationSummary> {
        // Validation happens before any port is touched.
        let operation = OperationType::parse(&request.operation).ok_or_else(|| {
            OrchestrateError::InvalidOperation {
                requested: request.operation.clone(),
            }
        })?;
        let cutoff_days = request.cutoff_days.unwrap_or(self.defaults.cutoff_days);
        if cutoff_days < 0 {
            return Err(OrchestrateError::InvalidCutoffDays(cutoff_days));
        }
        // Checked arithmetic: an arbitrarily large client value must come
        // back as a client error, not an overflow panic.
        let cutoff = Duration::try_days(cutoff_days)
            .and_then(|days| now.checked_sub_signed(days))
            .ok_or(OrchestrateError::InvalidCutoffDays(cutoff_days))?;
        let cutoff = codec::truncate_to_seconds(cutoff);
        let country = request
            .country
            .clone()
            .unwrap_or_else(|| self.defaults.country.clone());
        let queue = self
            .queues
            .get(&operation)
            .cloned()
            .ok_or(OrchestrateError::QueueNotConfigured(operation))?;
        info!(operation = operation.as_str(), %country, cutoff = %cutoff, cutoff_days,
              "orchestration started");

        let mut cursor = find_eligible(self.index.as_ref(), operation, &country, cutoff);
        let mut domains = Vec::new();
        while let Some(shop) = cursor.next().await? {
            domains.push(shop.domain);
        }
        let stats = cursor.stats();
        info!(operation = operation.as_str(), shops_found = domains.len(),
              scanned = stats.scanned, skipped_malformed = stats.skipped_malformed,
              filtered_no_fresh_crawl = stats.filtered_no_fresh_crawl,
              "eligibility query completed");

        let dispatch = BatchDispatcher::new(queue)
            .dispatch(operation, &domains)
            .await;

        let summary = OrchestrationSummary {
            operation_type: operation,
            country,
            cutoff_date: codec::format_timestamp(cutoff),
            shops_found: domains.len(),
            shops_enqueued: dispatch.enqueued,
            shops_failed: dispatch.failed_domains.len(),
            failed_domains: dispatch.failed_domains,
            stats,
        };
        info!(operation = operation.as_str(), shops_found = summary.shops_found,
              shops_enqueued = summary.shops_enqueued, shops_failed = summary.shops_failed,
              "orchestration completed");
        Ok(summary)
    }
}
