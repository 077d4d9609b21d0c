//! Render worker pool.
//!
//! Each worker is a dedicated OS thread that owns nothing but a request
//! channel, a shared renderer and a clone of the response channel. Workers
//! never touch caches or pending-operation state; results travel back as
//! [`WorkerResponse`] messages.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::GenerationError;
use crate::pipeline::{WorkerRequest, WorkerResponse};
use crate::render::DocumentRenderer;

// == Worker ==
/// Handle to one worker thread.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    requests: mpsc::UnboundedSender<WorkerRequest>,
    /// Cleared when the thread exits or stops accepting requests
    healthy: Arc<AtomicBool>,
}

impl Worker {
    fn spawn(
        id: usize,
        renderer: Arc<dyn DocumentRenderer>,
        responses: mpsc::UnboundedSender<WorkerResponse>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let healthy = Arc::new(AtomicBool::new(true));
        let thread_healthy = healthy.clone();

        thread::Builder::new()
            .name(format!("render-worker-{id}"))
            .spawn(move || run_worker(id, rx, renderer, responses, thread_healthy))?;

        Ok(Self {
            id,
            requests: tx,
            healthy,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Queues a request. Fails, and marks the worker unhealthy, if its thread is gone.
    pub fn post(&self, request: WorkerRequest) -> Result<(), GenerationError> {
        self.requests.send(request).map_err(|_| {
            self.healthy.store(false, Ordering::Release);
            GenerationError::WorkerUnavailable(format!("worker {} has stopped", self.id))
        })
    }
}

/// Body of a worker thread.
fn run_worker(
    worker_id: usize,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    renderer: Arc<dyn DocumentRenderer>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
    healthy: Arc<AtomicBool>,
) {
    debug!("Render worker {} started", worker_id);

    while let Some(request) = requests.blocking_recv() {
        let (id, task) = match request {
            WorkerRequest::Generate { id, data } => (id, data),
            WorkerRequest::Shutdown => break,
        };

        let _ = responses.send(WorkerResponse::Progress {
            id: id.clone(),
            progress: 0,
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            renderer.render(&task.template, &task.input)
        }));
        let response = match outcome {
            Ok(Ok(data)) => WorkerResponse::Success { id, data },
            Ok(Err(e)) => WorkerResponse::Error {
                id,
                error: e.to_string(),
            },
            Err(_) => {
                warn!("Render worker {} panicked on task {}", worker_id, id);
                WorkerResponse::Error {
                    id,
                    error: "renderer panicked".to_string(),
                }
            }
        };

        if responses.send(response).is_err() {
            trace!("Response channel closed, worker {} exiting", worker_id);
            break;
        }
    }

    healthy.store(false, Ordering::Release);
    debug!("Render worker {} stopped", worker_id);
}

// == Worker Pool ==
/// Fixed set of render workers with round-robin selection.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    next: AtomicUsize,
    shut_down: AtomicBool,
}

impl WorkerPool {
    /// Starts up to `count` workers. Threads that fail to spawn are skipped.
    pub fn spawn(
        count: usize,
        renderer: Arc<dyn DocumentRenderer>,
        responses: mpsc::UnboundedSender<WorkerResponse>,
    ) -> Self {
        let workers = (0..count)
            .filter_map(
                |id| match Worker::spawn(id, renderer.clone(), responses.clone()) {
                    Ok(worker) => Some(worker),
                    Err(e) => {
                        warn!("Failed to start render worker {}: {}", id, e);
                        None
                    }
                },
            )
            .collect();

        Self {
            workers,
            next: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Next healthy worker in round-robin order.
    pub fn select(&self) -> Option<&Worker> {
        let n = self.workers.len();
        if n == 0 || self.shut_down.load(Ordering::Acquire) {
            return None;
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        (0..n)
            .map(|offset| &self.workers[(start + offset) % n])
            .find(|worker| worker.is_healthy())
    }

    /// True if at least one worker can take a task.
    pub fn is_available(&self) -> bool {
        !self.shut_down.load(Ordering::Acquire) && self.healthy_count() > 0
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_healthy()).count()
    }

    /// Asks every worker to stop after its current task.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for worker in &self.workers {
            let _ = worker.post(WorkerRequest::Shutdown);
        }
        debug!("Worker pool shutting down ({} workers)", self.workers.len());
    }
}
