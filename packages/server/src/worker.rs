//! Worker pool driving planner runs.
//!
//! The HTTP layer enqueues a `RunSession` message and returns; a
//! fixed set of workers drains the bounded queue and drives
//! `PlannerAgent::run` to a terminal status. This decouples session
//! lifetime from request lifetime and gives the process one place to
//! own the shared, rate-limited search provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use research::PlannerAgent;

/// Message asking a worker to drive one session.
#[derive(Debug, Clone, Copy)]
pub struct RunSession {
    pub session_id: Uuid,
}

/// Handle for enqueueing work.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<RunSession>,
}

impl JobQueue {
    /// Enqueue without waiting. A full queue is backpressure the HTTP
    /// layer turns into 503.
    pub fn enqueue(&self, job: RunSession) -> Result<(), QueueFull> {
        self.tx.try_send(job).map_err(|_| QueueFull)
    }
}

/// The queue is at capacity.
#[derive(Debug, thiserror::Error)]
#[error("job queue is full")]
pub struct QueueFull;

/// Fixed-size worker pool over a bounded queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers sharing one receiver.
    pub fn spawn(
        planner: Arc<PlannerAgent>,
        worker_count: usize,
        queue_depth: usize,
    ) -> (JobQueue, Self) {
        let (tx, rx) = mpsc::channel::<RunSession>(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = (0..worker_count.max(1))
            .map(|worker_id| {
                let planner = Arc::clone(&planner);
                let rx = Arc::clone(&rx);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(async move {
                    info!(worker_id, "worker started");
                    loop {
                        let job = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        let Some(job) = job else {
                            info!(worker_id, "queue closed, worker exiting");
                            break;
                        };
                        if shutdown.load(Ordering::SeqCst) {
                            warn!(worker_id, session_id = %job.session_id, "shutdown requested, dropping job");
                            break;
                        }
                        if let Err(e) = planner.run(job.session_id).await {
                            // The planner has already marked the
                            // session FAILED; nothing to retry here.
                            error!(worker_id, session_id = %job.session_id, error = %e, "session run failed");
                        }
                    }
                })
            })
            .collect();

        (JobQueue { tx }, Self { handles, shutdown })
    }

    /// Ask workers to stop after their current job.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Wait for all workers to exit.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use research::traits::clock::SystemClock;
    use research::traits::repository::SessionRepository;
    use research::{
        MemoryStore, PlannerConfig, QuerySession, ResearchContext, ScriptedLLM, TestScenario,
    };

    fn planner_over(store: Arc<MemoryStore>) -> Arc<PlannerAgent> {
        let (search, fetcher) = TestScenario::new().build();
        let ctx = ResearchContext {
            search: Arc::new(search),
            fetcher: Arc::new(fetcher),
            llm: Arc::new(ScriptedLLM::new()),
            clock: Arc::new(SystemClock),
            sessions: store.clone(),
            traces: store.clone(),
            answers: store.clone(),
            cache: store,
        };
        Arc::new(PlannerAgent::new(ctx, PlannerConfig::default()))
    }

    #[tokio::test]
    async fn test_pool_drives_session_to_terminal_state() {
        let store = Arc::new(MemoryStore::new());
        let session = QuerySession::new("What year was Voyager 1 launched?", Utc::now());
        store.create_session(&session).await.unwrap();

        let (queue, pool) = WorkerPool::spawn(planner_over(store.clone()), 2, 16);
        queue
            .enqueue(RunSession {
                session_id: session.session_id,
            })
            .unwrap();

        // Empty search results end the session quickly.
        for _ in 0..100 {
            let status = store
                .read_session(session.session_id)
                .await
                .unwrap()
                .unwrap()
                .status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let session = store
            .read_session(session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(session.status.is_terminal());

        pool.request_shutdown();
        drop(queue);
        pool.join().await;
    }

    #[tokio::test]
    async fn test_queue_full() {
        let store = Arc::new(MemoryStore::new());
        let planner = planner_over(store);
        // Depth 1 with zero workers consuming: spawn with one worker
        // but saturate the queue faster than it can drain.
        let (queue, pool) = WorkerPool::spawn(planner, 1, 1);

        let mut saw_full = false;
        for _ in 0..64 {
            if queue
                .enqueue(RunSession {
                    session_id: Uuid::new_v4(),
                })
                .is_err()
            {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);

        pool.request_shutdown();
        drop(queue);
        pool.join().await;
    }
}
