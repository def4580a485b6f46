//! Fans eligible domains out to a work queue in fixed-size batches.
//!
//! Failures are folded, never fatal: a rejected message marks its domain
//! failed, a failed batch send marks the whole batch failed, and
//! dispatch always continues with the next batch. Retry is left to the
//! queue's own delivery semantics.

use std::sync::Arc;

use tracing::{debug, error, warn};

use shopwatch_core::ports::{MAX_BATCH_MESSAGES, WorkMessage, WorkQueue};
use shopwatch_core::types::OperationType;

/// Outcome of dispatching one domain list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Messages the queue accepted.
    pub enqueued: usize,
    /// Domains whose message was rejected or whose batch send failed,
    /// in dispatch order.
    pub failed_domains: Vec<String>,
}

pub struct BatchDispatcher {
    queue: Arc<dyn WorkQueue>,
    batch_size: usize,
}

impl BatchDispatcher {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            queue,
            batch_size: MAX_BATCH_MESSAGES,
        }
    }

    /// Override the batch size, clamped to the queue's send limit.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_MESSAGES);
        self
    }

    /// Send every domain to the queue, at most `batch_size` per call.
    ///
    /// Message ids are the position within the batch, which is how a
    /// rejection in the receipt maps back to its domain.
    pub async fn dispatch(&self, operation: OperationType, domains: &[String]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let total_batches = domains.len().div_ceil(self.batch_size.max(1));
        for (batch_index, batch) in domains.chunks(self.batch_size).enumerate() {
            let messages: Vec<WorkMessage> = batch
                .iter()
                .enumerate()
                .map(|(position, domain)| WorkMessage {
                    id: position.to_string(),
                    body: serde_json::json!({
                        "domain": domain,
                        "operation": operation.as_str(),
                    })
                    .to_string(),
                })
                .collect();
            debug!(queue = self.queue.name(), batch = batch_index + 1, total_batches,
                   size = batch.len(), "sending batch");
            match self.queue.send_batch(messages).await {
                Ok(receipt) => {
                    summary.enqueued += receipt.accepted.len();
                    for rejected in receipt.rejected {
                        warn!(queue = self.queue.name(), batch = batch_index + 1,
                              id = %rejected.id, reason = %rejected.reason,
                              "message rejected");
                        match rejected.id.parse::<usize>().ok().and_then(|p| batch.get(p)) {
                            Some(domain) => summary.failed_domains.push(domain.clone()),
                            None => error!(queue = self.queue.name(), id = %rejected.id,
                                           "rejected id does not map to a batch entry"),
                        }
                    }
                }
                Err(err) => {
                    error!(queue = self.queue.name(), batch = batch_index + 1,
                           size = batch.len(), error = %err, "batch send failed");
                    summary.failed_domains.extend(batch.iter().cloned());
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use shopwatch_core::ports::{BatchReceipt, QueueError, RejectedMessage, WorkPayload};

    /// Records every batch; rejects configured ids in a chosen batch, or
    /// fails a chosen batch's send entirely.
    #[derive(Default)]
    struct RecordingQueue {
        batches: Mutex<Vec<Vec<WorkMessage>>>,
        reject_in_batch: Option<(usize, Vec<&'static str>)>,
        fail_batch: Option<usize>,
    }

    #[async_trait]
    impl WorkQueue for RecordingQueue {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_batch(&self, messages: Vec<WorkMessage>) -> Result<BatchReceipt, QueueError> {
            let mut batches = self.batches.lock().unwrap();
            let batch_index = batches.len();
            batches.push(messages.clone());
            if self.fail_batch == Some(batch_index) {
                return Err(QueueError::Transport("stub outage".into()));
            }
            let mut receipt = BatchReceipt::default();
            for message in &messages {
                let rejected = matches!(&self.reject_in_batch,
                    Some((b, ids)) if *b == batch_index && ids.contains(&message.id.as_str()));
                if rejected {
                    receipt.rejected.push(RejectedMessage {
                        id: message.id.clone(),
                        reason: "stub rejection".into(),
                    });
                } else {
                    receipt.accepted.push(message.id.clone());
                }
            }
            Ok(receipt)
        }

        async fn receive(&self, _max: usize) -> Result<Vec<WorkMessage>, QueueError> {
            Ok(Vec::new())
        }
    }

    fn domains(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("shop{i:02}.de")).collect()
    }

    #[tokio::test]
    async fn splits_into_batches_of_at_most_ten() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone());
        let summary = dispatcher.dispatch(OperationType::Crawl, &domains(25)).await;
        assert_eq!(summary.enqueued, 25);
        assert!(summary.failed_domains.is_empty());
        let batches = queue.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, [10, 10, 5]);
    }

    #[tokio::test]
    async fn payload_carries_domain_and_operation() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone());
        dispatcher
            .dispatch(OperationType::Scrape, &["shop.de".to_string()])
            .await;
        let batches = queue.batches.lock().unwrap();
        let payload: WorkPayload = serde_json::from_str(&batches[0][0].body).unwrap();
        assert_eq!(payload.domain, "shop.de");
        assert_eq!(payload.operation, OperationType::Scrape);
        assert_eq!(batches[0][0].id, "0");
    }

    #[tokio::test]
    async fn rejected_ids_map_back_to_domains() {
        let queue = Arc::new(RecordingQueue {
            reject_in_batch: Some((1, vec!["0", "3", "7"])),
            ..RecordingQueue::default()
        });
        let dispatcher = BatchDispatcher::new(queue.clone());
        let summary = dispatcher.dispatch(OperationType::Crawl, &domains(25)).await;
        assert_eq!(summary.enqueued, 22);
        assert_eq!(
            summary.failed_domains,
            ["shop10.de", "shop13.de", "shop17.de"]
        );
    }

    #[tokio::test]
    async fn failed_batch_fails_only_its_own_domains() {
        let queue = Arc::new(RecordingQueue {
            fail_batch: Some(1),
            ..RecordingQueue::default()
        });
        let dispatcher = BatchDispatcher::new(queue.clone());
        let summary = dispatcher.dispatch(OperationType::Crawl, &domains(25)).await;
        assert_eq!(summary.enqueued, 15);
        assert_eq!(summary.failed_domains, domains(25)[10..20]);
        // Dispatch continued past the failed batch.
        assert_eq!(queue.batches.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone());
        let summary = dispatcher.dispatch(OperationType::Crawl, &[]).await;
        assert_eq!(summary, DispatchSummary::default());
        assert!(queue.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_size_is_clamped_to_the_send_limit() {
        let queue = Arc::new(RecordingQueue::default());
        let dispatcher = BatchDispatcher::new(queue.clone()).with_batch_size(50);
        dispatcher.dispatch(OperationType::Crawl, &domains(12)).await;
        let batches = queue.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, [10, 2]);
    }
}
