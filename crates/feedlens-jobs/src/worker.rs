//! Dispatcher and worker pool.
//!
//! `submit` reserves a slot in a bounded queue, registers the task, and
//! returns at once. Jobs that need the inference device go to a separate
//! device lane; everything else is drained by a fixed set of pool workers,
//! so a job waiting for the device never occupies a pool worker. Each job
//! body runs in its own spawned task so an error or a panic turns into a
//! `failed` task instead of taking the worker down.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use feedlens_core::{defaults, Error, JobKind, Result, TaskId, TaskLookup, TaskView};

use crate::exclusive::ExclusiveResource;
use crate::handler::{Admission, JobContext, JobHandler, JobResult};
use crate::registry::TaskRegistry;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of pool workers draining the non-exclusive queue.
    pub worker_count: usize,
    /// Maximum queued (not yet running) jobs per lane.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::TASK_WORKERS,
            queue_capacity: defaults::TASK_QUEUE_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TASK_WORKERS` | `4` | Concurrent non-exclusive jobs |
    /// | `TASK_QUEUE_CAPACITY` | `256` | Queued jobs per lane before `submit` fails |
    pub fn from_env() -> Self {
        let worker_count = std::env::var("TASK_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TASK_WORKERS)
            .max(1);

        let queue_capacity = std::env::var("TASK_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::TASK_QUEUE_CAPACITY)
            .max(1);

        Self {
            worker_count,
            queue_capacity,
        }
    }

    pub fn with_workers(mut self, n: usize) -> Self {
        self.worker_count = n.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n.max(1);
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A task moved to `working`.
    TaskStarted { task_id: TaskId, kind: JobKind },
    /// A running task reported progress.
    TaskProgress {
        task_id: TaskId,
        percent: i32,
        message: Option<String>,
    },
    /// A task completed.
    TaskCompleted { task_id: TaskId, kind: JobKind },
    /// A task failed.
    TaskFailed {
        task_id: TaskId,
        kind: JobKind,
        error: String,
    },
    /// A worker started.
    WorkerStarted { worker: usize },
    /// A worker stopped.
    WorkerStopped { worker: usize },
}

struct QueuedJob {
    task_id: TaskId,
    kind: JobKind,
    args: JsonValue,
    handler: Arc<dyn JobHandler>,
    admission: Option<Admission>,
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<QueuedJob>>>;

/// Entry point for submitting and observing tasks.
pub struct Dispatcher {
    registry: Arc<TaskRegistry>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    pool_tx: mpsc::Sender<QueuedJob>,
    pool_rx: SharedReceiver,
    device_tx: mpsc::Sender<QueuedJob>,
    queue_capacity: usize,
    event_tx: broadcast::Sender<WorkerEvent>,
    shutdown_tx: watch::Sender<bool>,
    workers: std::sync::Mutex<Vec<JoinHandle<()>>>,
    device_lane: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Queue a job and return its task id without waiting for it.
    ///
    /// Fails, creating no task, when no handler is registered for `kind`
    /// or the job's lane is full.
    pub fn submit(&self, kind: JobKind, args: JsonValue) -> Result<TaskId> {
        let handler = self
            .handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Job(format!("No handler registered for {kind}")))?;

        let lane = if handler.requires_exclusive() {
            &self.device_tx
        } else {
            &self.pool_tx
        };
        let permit = lane.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => Error::QueueFull(self.queue_capacity),
            mpsc::error::TrySendError::Closed(()) => {
                Error::Internal("Worker pool is shut down".into())
            }
        })?;

        let task_id = self.registry.create(kind);
        let admission = handler.admit(&args);
        permit.send(QueuedJob {
            task_id,
            kind,
            args,
            handler,
            admission,
        });

        info!(
            subsystem = "jobs",
            component = "dispatcher",
            task_id = %task_id,
            job_kind = kind.as_str(),
            "Task submitted"
        );
        Ok(task_id)
    }

    pub fn status(&self, task_id: TaskId) -> TaskLookup {
        self.registry.status(task_id)
    }

    pub fn list(&self) -> BTreeMap<TaskId, TaskView> {
        self.registry.list()
    }

    /// Resolve once the task is terminal.
    pub async fn wait(&self, task_id: TaskId) -> Result<TaskView> {
        self.registry.wait(task_id).await
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    pub fn handles(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Stop workers after their current job and wait for them to exit.
    /// Device jobs already dispatched run to the end. Queued jobs that have
    /// not started stay `started`.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for w in workers {
            if let Err(e) = w.await {
                error!(subsystem = "jobs", component = "worker", error = %e, "Worker task ended abnormally");
            }
        }

        // Release admissions of pool jobs that will never run, so device
        // jobs waiting on them can finish.
        discard_queued(&mut *self.pool_rx.lock().await);

        let lane = self
            .device_lane
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(lane) = lane {
            if let Err(e) = lane.await {
                error!(subsystem = "jobs", component = "device_lane", error = %e, "Device lane ended abnormally");
            }
        }
        info!(subsystem = "jobs", component = "dispatcher", "Worker pool stopped");
    }
}

fn discard_queued(queue_rx: &mut mpsc::Receiver<QueuedJob>) {
    queue_rx.close();
    let mut dropped = 0usize;
    while queue_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(subsystem = "jobs", component = "dispatcher", dropped, "Discarded queued jobs");
    }
}

/// Runs one job.
#[derive(Clone)]
struct Runner {
    registry: Arc<TaskRegistry>,
    exclusive: ExclusiveResource,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl Runner {
    async fn run(&self, job: QueuedJob) {
        let QueuedJob {
            task_id,
            kind,
            args,
            handler,
            admission,
        } = job;
        let start = Instant::now();

        if let Err(e) = self.registry.mark_working(task_id) {
            error!(subsystem = "jobs", component = "runner", task_id = %task_id, error = %e, "Could not start task");
            return;
        }
        info!(
            subsystem = "jobs",
            component = "runner",
            task_id = %task_id,
            job_kind = kind.as_str(),
            "Processing task"
        );
        let _ = self.event_tx.send(WorkerEvent::TaskStarted { task_id, kind });

        let event_tx = self.event_tx.clone();
        let ctx = JobContext::new(task_id, kind, args).with_progress_callback(move |percent, message| {
            let _ = event_tx.send(WorkerEvent::TaskProgress {
                task_id,
                percent,
                message: message.map(String::from),
            });
        });

        let exclusive = handler.requires_exclusive().then(|| self.exclusive.clone());
        let body = tokio::spawn(async move {
            handler.prepare(&ctx).await;
            let _guard = match &exclusive {
                Some(res) => Some(res.acquire(task_id).await),
                None => None,
            };
            handler.execute(ctx).await
        });

        let result = match body.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => JobResult::Failed(panic_message(e.into_panic())),
            Err(e) => JobResult::Failed(format!("Job was cancelled: {e}")),
        };
        drop(admission);

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            JobResult::Success(data) => match self.registry.complete(task_id, data) {
                Ok(()) => {
                    info!(
                        subsystem = "jobs",
                        component = "runner",
                        task_id = %task_id,
                        job_kind = kind.as_str(),
                        duration_ms,
                        "Task completed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::TaskCompleted { task_id, kind });
                }
                Err(e) => error!(task_id = %task_id, error = %e, "Failed to mark task completed"),
            },
            JobResult::Failed(message) => match self.registry.fail(task_id, message.clone()) {
                Ok(()) => {
                    warn!(
                        subsystem = "jobs",
                        component = "runner",
                        task_id = %task_id,
                        job_kind = kind.as_str(),
                        error = %message,
                        duration_ms,
                        "Task failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::TaskFailed {
                        task_id,
                        kind,
                        error: message,
                    });
                }
                Err(e) => error!(task_id = %task_id, error = %e, "Failed to mark task failed"),
            },
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Job panicked: {detail}")
}

async fn worker_loop(
    worker: usize,
    runner: Runner,
    queue_rx: SharedReceiver,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let _ = runner.event_tx.send(WorkerEvent::WorkerStarted { worker });
    debug!(subsystem = "jobs", component = "worker", worker, "Worker started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = tokio::select! {
            _ = shutdown_rx.changed() => None,
            job = async { queue_rx.lock().await.recv().await } => job,
        };

        match next {
            Some(job) => runner.run(job).await,
            None => break,
        }
    }

    let _ = runner.event_tx.send(WorkerEvent::WorkerStopped { worker });
    debug!(subsystem = "jobs", component = "worker", worker, "Worker stopped");
}

/// Dispatches exclusive jobs as they arrive. Each one prepares, then queues
/// on the exclusive lock inside its own task, so at most `max_in_flight`
/// device jobs are dispatched at once and the rest stay queued.
async fn device_loop(
    runner: Runner,
    mut queue_rx: mpsc::Receiver<QueuedJob>,
    max_in_flight: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(subsystem = "jobs", component = "device_lane", max_in_flight, "Device lane started");
    let mut in_flight = JoinSet::new();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => break,
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = done {
                    error!(subsystem = "jobs", component = "device_lane", error = %e, "Device job ended abnormally");
                }
            }
            job = queue_rx.recv(), if in_flight.len() < max_in_flight => match job {
                Some(job) => {
                    let runner = runner.clone();
                    in_flight.spawn(async move { runner.run(job).await });
                }
                None => break,
            },
        }
    }

    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            error!(subsystem = "jobs", component = "device_lane", error = %e, "Device job ended abnormally");
        }
    }
    discard_queued(&mut queue_rx);
    debug!(subsystem = "jobs", component = "device_lane", "Device lane stopped");
}

/// Builder for a dispatcher with its handlers.
pub struct DispatcherBuilder {
    config: WorkerConfig,
    handlers: Vec<Arc<dyn JobHandler>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Spawn the workers and return the dispatcher. Must be called inside
    /// a Tokio runtime.
    pub fn build(self) -> Dispatcher {
        let registry = Arc::new(TaskRegistry::new());
        let (pool_tx, pool_rx) = mpsc::channel(self.config.queue_capacity);
        let (device_tx, device_rx) = mpsc::channel(self.config.queue_capacity);
        let (event_tx, _) = broadcast::channel(defaults::EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut handlers = HashMap::new();
        for handler in self.handlers {
            let kind = handler.kind();
            debug!(job_kind = kind.as_str(), exclusive = handler.requires_exclusive(), "Registered job handler");
            handlers.insert(kind, handler);
        }

        let runner = Runner {
            registry: registry.clone(),
            exclusive: ExclusiveResource::new(),
            event_tx: event_tx.clone(),
        };
        let pool_rx = Arc::new(Mutex::new(pool_rx));
        let workers = (0..self.config.worker_count)
            .map(|i| {
                tokio::spawn(worker_loop(
                    i,
                    runner.clone(),
                    pool_rx.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();
        let device_lane = tokio::spawn(device_loop(
            runner,
            device_rx,
            self.config.queue_capacity,
            shutdown_rx,
        ));

        info!(
            subsystem = "jobs",
            component = "dispatcher",
            workers = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            handlers = handlers.len(),
            "Worker pool started"
        );

        Dispatcher {
            registry,
            handlers,
            pool_tx,
            pool_rx,
            device_tx,
            queue_capacity: self.config.queue_capacity,
            event_tx,
            shutdown_tx,
            workers: std::sync::Mutex::new(workers),
            device_lane: std::sync::Mutex::new(Some(device_lane)),
        }
    }
}
