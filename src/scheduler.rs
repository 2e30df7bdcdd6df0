//! Scheduler: owns the worker fleet and the task queue.
//!
//! Tasks arrive from the HTTP surface, are deduplicated against the
//! queue, and flow to suspended workers. Worker events are drained by
//! the event loop, which keeps per-worker current-task bookkeeping,
//! forwards progress to the event bus, and launches queued tasks
//! whenever a worker frees up.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use gy_core::{EventBus, ProgressEvent, Result, WorkerPhase};
use gy_db::queries::settings;
use gy_db::{get_conn, DbPool};

use crate::fetcher::{MOBILE_ROOT, SITE_ROOT};
use crate::tasks::Task;
use crate::worker::{Worker, WorkerEnv, WorkerEvent, WorkerEventKind, WorkerState};

/// Serializable snapshot of one worker for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub state: String,
    pub proxy: Option<String>,
    pub current_task: Option<String>,
}

struct Inner {
    workers: HashMap<String, Worker>,
    tasks: VecDeque<Task>,
}

pub struct Scheduler {
    pool: DbPool,
    cache_dir: PathBuf,
    bus: Arc<EventBus>,
    site_root: String,
    mobile_root: String,
    inner: Mutex<Inner>,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl Scheduler {
    /// Create the scheduler plus the receiving end of the worker event
    /// stream (feed it to [`Scheduler::run_event_loop`]).
    pub fn new(
        pool: DbPool,
        cache_dir: PathBuf,
        bus: Arc<EventBus>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<WorkerEvent>) {
        Self::with_site_roots(pool, cache_dir, bus, SITE_ROOT, MOBILE_ROOT)
    }

    /// Like [`Scheduler::new`], with overridable site roots (tests point
    /// these at a mock server).
    pub fn with_site_roots(
        pool: DbPool,
        cache_dir: PathBuf,
        bus: Arc<EventBus>,
        site_root: &str,
        mobile_root: &str,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            pool,
            cache_dir,
            bus,
            site_root: site_root.to_string(),
            mobile_root: mobile_root.to_string(),
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                tasks: VecDeque::new(),
            }),
            events_tx,
        });
        (scheduler, events_rx)
    }

    // -----------------------------------------------------------------
    // Task queue
    // -----------------------------------------------------------------

    /// Enqueue a task unless an equal one is already queued. Priority
    /// tasks go to the head.
    pub fn add_task(&self, task: Task, priority: bool) -> bool {
        let mut inner = self.inner.lock();
        if inner.tasks.iter().any(|queued| queued.equals(&task)) {
            tracing::debug!(task = %task, "duplicate task rejected");
            return false;
        }
        tracing::debug!(task = %task, priority, "task queued");
        if priority {
            inner.tasks.push_front(task);
        } else {
            inner.tasks.push_back(task);
        }
        true
    }

    /// Hand queued tasks to suspended workers until one side runs dry.
    pub fn push_task(&self) {
        let mut inner = self.inner.lock();
        loop {
            let Some(name) = inner
                .workers
                .values()
                .find(|worker| worker.is_suspended())
                .map(|worker| worker.name().to_string())
            else {
                break;
            };
            let Some(task) = inner.tasks.pop_front() else {
                break;
            };
            let Some(worker) = inner.workers.get_mut(&name) else {
                inner.tasks.push_front(task);
                break;
            };
            match worker.dispatch(task.clone()) {
                Ok(()) => {
                    // Mark busy right away so one worker never gets two.
                    worker.toggle_task(Some(task));
                }
                Err(e) => {
                    tracing::warn!(worker = name, error = %e, "dispatch failed; task requeued");
                    inner.tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Queued task names, head first.
    pub fn queued_tasks(&self) -> Vec<Task> {
        self.inner.lock().tasks.iter().cloned().collect()
    }

    // -----------------------------------------------------------------
    // Worker fleet
    // -----------------------------------------------------------------

    /// (Re)build and start the fleet from the persisted settings: one
    /// primary worker plus one per configured proxy, each with the full
    /// settings snapshot.
    pub fn start_workers(&self) -> Result<()> {
        self.stop_workers();

        let worker_settings = {
            let conn = get_conn(&self.pool)?;
            settings::load_worker_settings(&conn)?
        };

        let mut env = WorkerEnv::new(
            self.pool.clone(),
            worker_settings.clone(),
            self.cache_dir.clone(),
        );
        env.site_root = self.site_root.clone();
        env.mobile_root = self.mobile_root.clone();

        let mut inner = self.inner.lock();
        inner.workers.clear();

        let mut fleet = vec![Worker::new("worker-1", None)];
        for (index, proxy) in worker_settings.proxies.iter().enumerate() {
            fleet.push(Worker::new(
                format!("worker-{}", index + 2),
                Some(proxy.clone()),
            ));
        }

        for mut worker in fleet {
            if worker.is_pending() {
                worker.start(env.clone(), self.events_tx.clone())?;
            }
            inner.workers.insert(worker.name().to_string(), worker);
        }

        tracing::info!(count = inner.workers.len(), "workers started");
        Ok(())
    }

    /// Terminate all running workers. In-flight tasks return to the head
    /// of the queue so the next `start_workers` re-attempts them.
    pub fn stop_workers(&self) {
        let requeue: Vec<Task> = {
            let mut inner = self.inner.lock();
            let mut requeue = Vec::new();
            for worker in inner.workers.values_mut() {
                if worker.is_running() {
                    if let Some(task) = worker.current_task().cloned() {
                        requeue.push(task);
                    }
                    worker.stop();
                }
            }
            requeue
        };
        for task in requeue {
            self.add_task(task, true);
        }
    }

    /// Snapshot of the fleet for the HTTP surface.
    pub fn workers_status(&self) -> Vec<WorkerStatus> {
        let inner = self.inner.lock();
        let mut statuses: Vec<WorkerStatus> = inner
            .workers
            .values()
            .map(|worker| WorkerStatus {
                name: worker.name().to_string(),
                state: match worker.state() {
                    WorkerState::Pending => "pending",
                    WorkerState::Running => "running",
                    WorkerState::Terminated => "terminated",
                }
                .to_string(),
                proxy: worker.proxy().map(str::to_string),
                current_task: worker.current_task().map(|task| task.name.clone()),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    // -----------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------

    /// Drain worker events: update bookkeeping, forward progress to the
    /// bus, launch the next task when a worker frees up.
    pub async fn run_event_loop(self: Arc<Self>, mut events_rx: mpsc::UnboundedReceiver<WorkerEvent>) {
        while let Some(event) = events_rx.recv().await {
            let WorkerEvent { worker, kind } = event;
            match kind {
                WorkerEventKind::Ready => {
                    tracing::debug!(worker, "ready");
                    self.bus
                        .broadcast(ProgressEvent::worker(&worker, WorkerPhase::Ready));
                    self.push_task();
                }
                WorkerEventKind::Working { task } => {
                    tracing::debug!(worker, task = %task, "working");
                    self.bus.broadcast(ProgressEvent::working(&worker, &task.name));
                    let mut inner = self.inner.lock();
                    if let Some(handle) = inner.workers.get_mut(&worker) {
                        handle.toggle_task(Some(task));
                    }
                }
                WorkerEventKind::Done => {
                    tracing::debug!(worker, "done");
                    {
                        let mut inner = self.inner.lock();
                        if let Some(handle) = inner.workers.get_mut(&worker) {
                            handle.toggle_task(None);
                        }
                    }
                    self.bus
                        .broadcast(ProgressEvent::worker(&worker, WorkerPhase::Done));
                    self.push_task();
                }
                WorkerEventKind::Error { message } => {
                    tracing::debug!(worker, message, "task error");
                    {
                        let mut inner = self.inner.lock();
                        if let Some(handle) = inner.workers.get_mut(&worker) {
                            handle.toggle_task(None);
                        }
                    }
                    self.bus
                        .broadcast(ProgressEvent::worker_error(&worker, message));
                    self.push_task();
                }
                WorkerEventKind::Heartbeat { seq } => {
                    tracing::trace!(worker, seq, "heartbeat");
                }
                WorkerEventKind::Log { level, message } => {
                    self.bus.broadcast(ProgressEvent::logger(level, message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;
    use gy_db::init_memory_pool;

    fn test_scheduler() -> (Arc<Scheduler>, mpsc::UnboundedReceiver<WorkerEvent>) {
        let pool = init_memory_pool().unwrap();
        Scheduler::new(pool, std::env::temp_dir(), Arc::new(EventBus::default()))
    }

    #[test]
    fn add_task_deduplicates() {
        let (scheduler, _rx) = test_scheduler();

        let task = Task::new(TaskKind::Broadcast, 1);
        let equal = Task::new(TaskKind::Broadcast, 1);
        let other = Task::new(TaskKind::Broadcast, 2);

        assert!(scheduler.add_task(task, false));
        assert!(!scheduler.add_task(equal, false));
        assert!(scheduler.add_task(other, false));
        assert_eq!(scheduler.queued_tasks().len(), 2);
    }

    #[test]
    fn priority_tasks_jump_the_queue() {
        let (scheduler, _rx) = test_scheduler();

        scheduler.add_task(Task::new(TaskKind::Note, 1), false);
        scheduler.add_task(Task::new(TaskKind::Like, 1), true);

        let queued = scheduler.queued_tasks();
        assert_eq!(queued[0].kind, TaskKind::Like);
        assert_eq!(queued[1].kind, TaskKind::Note);
    }

    #[tokio::test]
    async fn stop_workers_requeues_current_task_at_head() {
        let (scheduler, _rx) = test_scheduler();
        scheduler.start_workers().unwrap();

        // the fleet is one primary worker
        assert_eq!(scheduler.workers_status().len(), 1);

        // pretend the worker is mid-task
        let in_flight = Task::new(TaskKind::Broadcast, 1);
        {
            let mut inner = scheduler.inner.lock();
            let worker = inner.workers.get_mut("worker-1").unwrap();
            worker.toggle_task(Some(in_flight.clone()));
        }
        scheduler.add_task(Task::new(TaskKind::Note, 1), false);

        scheduler.stop_workers();

        let queued = scheduler.queued_tasks();
        assert_eq!(queued.len(), 2);
        assert!(queued[0].equals(&in_flight), "in-flight task requeued at head");

        let statuses = scheduler.workers_status();
        assert_eq!(statuses[0].state, "terminated");
    }

    #[tokio::test]
    async fn start_workers_builds_one_per_proxy() {
        let pool = init_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            settings::set_json(
                &conn,
                gy_core::settings::KEY_PROXIES,
                &vec![
                    "http://127.0.0.1:8118".to_string(),
                    "http://127.0.0.1:8119".to_string(),
                ],
            )
            .unwrap();
        }
        let (scheduler, _rx) =
            Scheduler::new(pool, std::env::temp_dir(), Arc::new(EventBus::default()));

        scheduler.start_workers().unwrap();
        let statuses = scheduler.workers_status();
        assert_eq!(statuses.len(), 3);
        assert_eq!(statuses[0].proxy, None);
        assert_eq!(statuses[1].proxy.as_deref(), Some("http://127.0.0.1:8118"));
        scheduler.stop_workers();
    }
}
