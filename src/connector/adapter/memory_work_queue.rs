use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::application::WorkQueue;
use crate::domain::DomainError;

/// In-process work queue with explicit ack. Dequeued items move to an
/// in-flight set until acked; `requeue` returns them for redelivery.
/// Durability comes from the run records, not the queue itself.
pub struct MemoryWorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    closed: AtomicBool,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for MemoryWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, run_id: &str) -> Result<(), DomainError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DomainError::internal("work queue is closed"));
        }
        {
            let mut state = self.state.lock().await;
            state.pending.push_back(run_id.to_string());
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Option<String> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(run_id) = state.pending.pop_front() {
                    state.in_flight.insert(run_id.clone());
                    return Some(run_id);
                }
                if self.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    async fn ack(&self, run_id: &str) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(run_id);
        debug!("Acked {}", run_id);
    }

    async fn requeue(&self, run_id: &str) -> Result<(), DomainError> {
        {
            let mut state = self.state.lock().await;
            state.in_flight.remove(run_id);
            state.pending.push_back(run_id.to_string());
        }
        self.notify.notify_one();
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_delivery() {
        let queue = MemoryWorkQueue::new();
        queue.enqueue("a").await.unwrap();
        queue.enqueue("b").await.unwrap();

        assert_eq!(queue.dequeue().await.as_deref(), Some("a"));
        assert_eq!(queue.dequeue().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_requeue_redelivers() {
        let queue = MemoryWorkQueue::new();
        queue.enqueue("a").await.unwrap();

        let item = queue.dequeue().await.unwrap();
        queue.requeue(&item).await.unwrap();

        assert_eq!(queue.dequeue().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = MemoryWorkQueue::new();
        queue.enqueue("a").await.unwrap();
        queue.close();

        assert_eq!(queue.dequeue().await.as_deref(), Some("a"));
        assert_eq!(queue.dequeue().await, None);
    }

    #[tokio::test]
    async fn test_enqueue_after_close_fails() {
        let queue = MemoryWorkQueue::new();
        queue.close();
        assert!(queue.enqueue("a").await.is_err());
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = std::sync::Arc::new(MemoryWorkQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        queue.enqueue("late").await.unwrap();

        assert_eq!(consumer.await.unwrap().as_deref(), Some("late"));
    }
}
