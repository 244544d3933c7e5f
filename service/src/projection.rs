//! Background graph projection worker pool
//!
//! Every inserted or updated memory is mirrored into the graph by a
//! bounded pool of workers fed from an in-memory queue. Retry/backoff
//! is a pure function of the attempt count; terminal failures are
//! logged and the memory stays readable through vector search.

use engram_graph::IntelligenceEngine;
use engram_store::VectorStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 1024;

/// One unit of projection work
#[derive(Debug, Clone)]
pub struct ProjectionJob {
    pub memory_id: String,
}

/// Retry policy: `max_attempts` tries with exponential backoff between
/// them. The spec schedule is 7 attempts at 1s, 2s, 4s, 8s, 16s, 32s
/// (~63s cumulative budget).
#[derive(Debug, Clone)]
pub struct ProjectionConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_attempts: 7,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl ProjectionConfig {
    /// Delay before the next try after a failed `attempt` (1-based),
    /// or `None` once the budget is exhausted
    pub fn backoff_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * 2u32.pow(attempt - 1))
    }
}

/// Sender half handed to the pipeline plus the worker join handles
pub struct ProjectionHandle {
    sender: mpsc::Sender<ProjectionJob>,
    workers: Vec<JoinHandle<()>>,
}

impl ProjectionHandle {
    /// Enqueue a projection job. A full queue drops the job with a log
    /// entry rather than blocking the request path; `POST /graph/sync`
    /// can re-enqueue later.
    pub fn schedule(&self, memory_id: &str) {
        let job = ProjectionJob {
            memory_id: memory_id.to_string(),
        };
        if let Err(e) = self.sender.try_send(job) {
            error!(memory_id, "projection queue full, dropping job: {}", e);
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Spawn the worker pool. Workers run for the lifetime of the service
/// process and drain the queue concurrently.
pub fn spawn_projection_pool(
    config: ProjectionConfig,
    store: Arc<dyn VectorStore>,
    engine: Arc<IntelligenceEngine>,
) -> ProjectionHandle {
    let (sender, receiver) = mpsc::channel::<ProjectionJob>(QUEUE_CAPACITY);
    let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

    let mut workers = Vec::with_capacity(config.workers);
    for worker_id in 0..config.workers {
        let receiver = receiver.clone();
        let store = store.clone();
        let engine = engine.clone();
        let config = config.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let job = {
                    let mut rx = receiver.lock().await;
                    rx.recv().await
                };
                let Some(job) = job else {
                    debug!(worker_id, "projection queue closed, worker exiting");
                    break;
                };
                run_job(&config, &store, &engine, &job).await;
            }
        }));
    }

    info!(workers = config.workers, "projection pool started");
    ProjectionHandle { sender, workers }
}

/// Project one memory with bounded retry. The memory is re-read per
/// attempt so a concurrent update projects its latest content.
async fn run_job(
    config: &ProjectionConfig,
    store: &Arc<dyn VectorStore>,
    engine: &Arc<IntelligenceEngine>,
    job: &ProjectionJob,
) {
    for attempt in 1..=config.max_attempts {
        let result = match store.get(&job.memory_id).await {
            Ok(Some(memory)) => engine.project_memory(&memory).await,
            Ok(None) => {
                // Deleted while queued; nothing to mirror
                debug!(memory_id = %job.memory_id, "memory gone before projection");
                return;
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(memory_id = %job.memory_id, attempt, "projection succeeded");
                return;
            }
            Err(e) => match config.backoff_delay(attempt) {
                Some(delay) => {
                    warn!(
                        memory_id = %job.memory_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "projection failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    error!(
                        memory_id = %job.memory_id,
                        attempts = config.max_attempts,
                        "projection failed permanently: {}",
                        e
                    );
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_matches_the_budget() {
        let config = ProjectionConfig::default();
        let delays: Vec<u64> = (1..7)
            .map(|attempt| config.backoff_delay(attempt).unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32]);
        // Attempt 7 is the last; no further delay
        assert!(config.backoff_delay(7).is_none());
        // Cumulative budget ~63s
        assert_eq!(delays.iter().sum::<u64>(), 63);
    }
}
