//! In-memory work queue.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use shopwatch_core::{
    BatchReceipt, MAX_BATCH_MESSAGES, QueueError, WorkMessage, WorkQueue,
};

/// FIFO in-process queue. `Clone` shares the underlying deque, so the
/// dispatcher and workers can hold the same queue.
#[derive(Clone)]
pub struct InMemoryWorkQueue {
    name: String,
    messages: Arc<Mutex<VecDeque<WorkMessage>>>,
}

impl InMemoryWorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Number of messages currently queued.
    pub async fn depth(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_batch(&self, messages: Vec<WorkMessage>) -> Result<BatchReceipt, QueueError> {
        // Hard contract: oversized batches fail the whole call, they are
        // never split or partially accepted.
        if messages.len() > MAX_BATCH_MESSAGES {
            return Err(QueueError::BatchTooLarge {
                len: messages.len(),
                max: MAX_BATCH_MESSAGES,
            });
        }

        let mut queue = self.messages.lock().await;
        let mut receipt = BatchReceipt::default();
        for message in messages {
            receipt.accepted.push(message.id.clone());
            queue.push_back(message);
        }
        debug!(
            queue = %self.name,
            accepted = receipt.accepted.len(),
            depth = queue.len(),
            "batch accepted"
        );
        Ok(receipt)
    }

    async fn receive(&self, max: usize) -> Result<Vec<WorkMessage>, QueueError> {
        let mut queue = self.messages.lock().await;
        let count = max.min(queue.len());
        let received: Vec<WorkMessage> = queue.drain(..count).collect();
        if !received.is_empty() {
            debug!(queue = %self.name, received = received.len(), "messages received");
        }
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: usize, domain: &str) -> WorkMessage {
        WorkMessage {
            id: id.to_string(),
            body: serde_json::json!({ "domain": domain }).to_string(),
        }
    }

    #[tokio::test]
    async fn send_then_receive_is_fifo() {
        let queue = InMemoryWorkQueue::new("shop-crawl");
        queue
            .send_batch(vec![message(0, "a.de"), message(1, "b.de")])
            .await
            .unwrap();

        let received = queue.receive(10).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].id, "0");
        assert_eq!(received[1].id, "1");
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn receipt_lists_every_accepted_id() {
        let queue = InMemoryWorkQueue::new("shop-crawl");
        let receipt = queue
            .send_batch((0..3).map(|i| message(i, "a.de")).collect())
            .await
            .unwrap();
        assert_eq!(receipt.accepted, vec!["0", "1", "2"]);
        assert!(receipt.rejected.is_empty());
    }

    #[tokio::test]
    async fn oversized_batch_fails_outright() {
        let queue = InMemoryWorkQueue::new("shop-crawl");
        let batch: Vec<WorkMessage> = (0..11).map(|i| message(i, "a.de")).collect();

        let err = queue.send_batch(batch).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::BatchTooLarge { len: 11, max: 10 }
        ));
        // Nothing was enqueued.
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn full_batch_at_the_limit_is_accepted() {
        let queue = InMemoryWorkQueue::new("shop-crawl");
        let batch: Vec<WorkMessage> = (0..10).map(|i| message(i, "a.de")).collect();
        let receipt = queue.send_batch(batch).await.unwrap();
        assert_eq!(receipt.accepted.len(), 10);
        assert_eq!(queue.depth().await, 10);
    }

    #[tokio::test]
    async fn receive_caps_at_max() {
        let queue = InMemoryWorkQueue::new("shop-scrape");
        queue
            .send_batch((0..5).map(|i| message(i, "a.de")).collect())
            .await
            .unwrap();

        let first = queue.receive(3).await.unwrap();
        assert_eq!(first.len(), 3);
        let rest = queue.receive(10).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(queue.receive(10).await.unwrap().is_empty());
    }
}
