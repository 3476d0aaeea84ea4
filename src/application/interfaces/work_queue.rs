use async_trait::async_trait;

use crate::domain::DomainError;

/// At-least-once delivery queue feeding ingestion workers.
///
/// A dequeued run id stays in flight until acked; unacked items may be
/// redelivered. The durable run record (and its atomic PENDING → RUNNING
/// claim) is what makes duplicate delivery harmless.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, run_id: &str) -> Result<(), DomainError>;

    /// Wait for the next run id. Returns `None` when the queue has been
    /// closed and drained.
    async fn dequeue(&self) -> Option<String>;

    async fn ack(&self, run_id: &str);

    /// Return an unacked run id to the queue for redelivery.
    async fn requeue(&self, run_id: &str) -> Result<(), DomainError>;

    /// Close the queue; pending `dequeue` calls drain and then resolve to
    /// `None`.
    fn close(&self);
}
