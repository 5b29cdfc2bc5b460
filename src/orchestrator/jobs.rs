//! Background Jobs, Worker Pools, and Cancellation
//!
//! Each pipeline stage (parse, proofread, publish) has its own bounded
//! worker pool. The dispatch queue holds at most 4 × pool size pending
//! jobs; when full, operator-triggered dispatch returns "busy" and the
//! sync job backs off until the next round. Cancellation is cooperative:
//! jobs poll their token at suspension points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::config::WorkerPools;
use crate::constants::orchestrator as orchestrator_constants;
use crate::types::{PressError, PublishProviderKind, Result};

// =============================================================================
// Cancellation
// =============================================================================

/// Token for cooperative cancellation of job execution.
///
/// Uses an AtomicBool internally. Clone is cheap and shares state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Error out if cancellation has been requested; called at suspension
    /// points.
    pub fn checkpoint(&self, what: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(PressError::Cancelled(what.to_string()))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// Pipeline stage a job belongs to; determines the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Proofread,
    Publish,
}

/// One unit of background work, tagged with a correlation id that follows
/// it through the structured logs
#[derive(Debug, Clone)]
pub struct Job {
    pub stage: Stage,
    pub item_id: i64,
    pub correlation_id: Uuid,
    /// Publish jobs may carry an operator-selected provider
    pub provider: Option<PublishProviderKind>,
}

impl Job {
    pub fn parse(item_id: i64) -> Self {
        Self {
            stage: Stage::Parse,
            item_id,
            correlation_id: Uuid::new_v4(),
            provider: None,
        }
    }

    pub fn proofread(item_id: i64) -> Self {
        Self {
            stage: Stage::Proofread,
            item_id,
            correlation_id: Uuid::new_v4(),
            provider: None,
        }
    }

    pub fn publish(item_id: i64, provider: Option<PublishProviderKind>) -> Self {
        Self {
            stage: Stage::Publish,
            item_id,
            correlation_id: Uuid::new_v4(),
            provider,
        }
    }
}

// =============================================================================
// Queue
// =============================================================================

/// Shared receiver end of one stage's queue; workers take turns
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Receiver set handed to the worker spawner
pub struct QueueReceivers {
    pub parse: SharedReceiver,
    pub proofread: SharedReceiver,
    pub publish: SharedReceiver,
}

/// Bounded dispatch queue over the three stage pools
#[derive(Clone)]
pub struct JobQueue {
    parse_tx: mpsc::Sender<Job>,
    proofread_tx: mpsc::Sender<Job>,
    publish_tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Build the queue with capacities of 4 × pool size per stage
    pub fn new(pools: &WorkerPools) -> (Self, QueueReceivers) {
        let factor = orchestrator_constants::QUEUE_DEPTH_FACTOR;
        let (parse_tx, parse_rx) = mpsc::channel(pools.parse * factor);
        let (proofread_tx, proofread_rx) = mpsc::channel(pools.proofread * factor);
        let (publish_tx, publish_rx) = mpsc::channel(pools.publish * factor);
        (
            Self {
                parse_tx,
                proofread_tx,
                publish_tx,
            },
            QueueReceivers {
                parse: Arc::new(Mutex::new(parse_rx)),
                proofread: Arc::new(Mutex::new(proofread_rx)),
                publish: Arc::new(Mutex::new(publish_rx)),
            },
        )
    }

    /// Enqueue without blocking. A full queue surfaces as `Busy`: the
    /// operator retries later, the sync job backs off to its next round.
    pub fn dispatch(&self, job: Job) -> Result<()> {
        let sender = match job.stage {
            Stage::Parse => &self.parse_tx,
            Stage::Proofread => &self.proofread_tx,
            Stage::Publish => &self.publish_tx,
        };
        sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => PressError::Busy(format!(
                "{:?} queue is full, try again",
                job.stage
            )),
            mpsc::error::TrySendError::Closed(_) => {
                PressError::Storage("job queue is shut down".to_string())
            }
        })
    }
}

// =============================================================================
// Per-item locks
// =============================================================================

/// Per-item mutual exclusion for transitions. The lock is held for the
/// duration of a transition plus its job body, never while an item sits
/// in a review lane awaiting operator input.
#[derive(Default)]
pub struct ItemLocks {
    locks: dashmap::DashMap<i64, Arc<Mutex<()>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, item_id: i64) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(item_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.checkpoint("step").is_ok());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.checkpoint("step").unwrap_err(),
            PressError::Cancelled(_)
        ));
    }

    #[test]
    fn test_queue_backpressure() {
        let pools = WorkerPools {
            parse: 1,
            proofread: 1,
            publish: 1,
        };
        let (queue, _receivers) = JobQueue::new(&pools);

        // Capacity is 4 × 1; the fifth dispatch is refused
        for _ in 0..4 {
            queue.dispatch(Job::parse(1)).unwrap();
        }
        let err = queue.dispatch(Job::parse(1)).unwrap_err();
        assert!(matches!(err, PressError::Busy(_)));
    }

    #[tokio::test]
    async fn test_queue_delivers_to_stage() {
        let pools = WorkerPools::default();
        let (queue, receivers) = JobQueue::new(&pools);

        queue.dispatch(Job::publish(7, Some(PublishProviderKind::Hybrid))).unwrap();
        queue.dispatch(Job::parse(3)).unwrap();

        let job = receivers.publish.lock().await.recv().await.unwrap();
        assert_eq!(job.stage, Stage::Publish);
        assert_eq!(job.item_id, 7);
        assert_eq!(job.provider, Some(PublishProviderKind::Hybrid));

        let job = receivers.parse.lock().await.recv().await.unwrap();
        assert_eq!(job.stage, Stage::Parse);
    }

    #[tokio::test]
    async fn test_item_locks_serialize() {
        let locks = Arc::new(ItemLocks::new());
        let guard = locks.acquire(1).await;

        // A second acquire on the same item must wait
        let locks2 = locks.clone();
        let pending = tokio::spawn(async move {
            let _guard = locks2.acquire(1).await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        // A different item is independent
        let _other = locks.acquire(2).await;

        drop(guard);
        pending.await.unwrap();
    }

    #[test]
    fn test_jobs_carry_correlation_ids() {
        let a = Job::parse(1);
        let b = Job::parse(1);
        assert_ne!(a.correlation_id, b.correlation_id);
    }
}
