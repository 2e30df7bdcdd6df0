//! Worker: a task-executing unit with its own HTTP session, pacing
//! clock, and store access.
//!
//! The parent shares nothing with a worker beyond two channels: the task
//! input and the event output. A worker handle moves through
//! `Pending -> Running -> Terminated`; stopping aborts the underlying
//! tokio task, which cancels any in-flight HTTP request the way process
//! death used to.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use gy_core::{Error, Result, WorkerSettings};
use gy_db::models::Account;
use gy_db::queries::accounts;
use gy_db::{get_conn, DbPool};

use crate::fetcher::{Fetcher, FetcherConfig, MOBILE_ROOT, SITE_ROOT};
use crate::tasks::{Task, TaskContext};

/// Idle interval between heartbeats.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Lifecycle events emitted on a worker's output channel.
#[derive(Debug, Clone)]
pub enum WorkerEventKind {
    /// Emitted once after startup.
    Ready,
    /// A task was picked up.
    Working { task: Task },
    /// The task finished successfully.
    Done,
    /// The task failed; the worker stays alive for the next task.
    Error { message: String },
    /// Emitted once per second of idle.
    Heartbeat { seq: u64 },
    /// A forwarded log record.
    Log { level: String, message: String },
}

#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker: String,
    pub kind: WorkerEventKind,
}

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Pending,
    Running,
    Terminated,
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Everything a worker needs to run tasks.
#[derive(Clone)]
pub struct WorkerEnv {
    pub pool: DbPool,
    pub settings: WorkerSettings,
    pub cache_dir: PathBuf,
    /// Desktop site root; overridable for tests.
    pub site_root: String,
    /// Mobile site root; overridable for tests.
    pub mobile_root: String,
}

impl WorkerEnv {
    pub fn new(pool: DbPool, settings: WorkerSettings, cache_dir: PathBuf) -> Self {
        Self {
            pool,
            settings,
            cache_dir,
            site_root: SITE_ROOT.to_string(),
            mobile_root: MOBILE_ROOT.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker handle
// ---------------------------------------------------------------------------

/// Parent-side handle of one worker.
pub struct Worker {
    name: String,
    proxy: Option<String>,
    state: WorkerState,
    current_task: Option<Task>,
    input_tx: Option<mpsc::UnboundedSender<Task>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Worker {
    pub fn new(name: impl Into<String>, proxy: Option<String>) -> Self {
        Self {
            name: name.into(),
            proxy,
            state: WorkerState::Pending,
            current_task: None,
            input_tx: None,
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == WorkerState::Pending
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkerState::Running
    }

    /// Running with no task in flight: ready for a dispatch.
    pub fn is_suspended(&self) -> bool {
        self.state == WorkerState::Running && self.current_task.is_none()
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    /// Record the task a worker is busy with (or clear it).
    pub fn toggle_task(&mut self, task: Option<Task>) {
        self.current_task = task;
    }

    /// Pending -> Running: spawn the worker loop.
    pub fn start(
        &mut self,
        env: WorkerEnv,
        out: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Result<()> {
        if self.state != WorkerState::Pending {
            return Err(Error::internal(format!(
                "worker {} cannot start from {:?}",
                self.name, self.state
            )));
        }

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker_loop(
            self.name.clone(),
            self.proxy.clone(),
            env,
            input_rx,
            out,
        ));
        self.input_tx = Some(input_tx);
        self.handle = Some(handle);
        self.state = WorkerState::Running;
        Ok(())
    }

    /// Running -> Terminated: abort the loop, cancelling any in-flight
    /// request. Half-written state stays consistent; transactions bound
    /// the damage.
    pub fn stop(&mut self) {
        if self.state != WorkerState::Running {
            return;
        }
        self.input_tx = None;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.current_task = None;
        self.state = WorkerState::Terminated;
    }

    /// Terminated -> Pending.
    pub fn reset(&mut self) {
        if self.state == WorkerState::Terminated {
            self.state = WorkerState::Pending;
        }
    }

    /// Hand a task to the worker loop.
    pub fn dispatch(&self, task: Task) -> Result<()> {
        let tx = self
            .input_tx
            .as_ref()
            .ok_or_else(|| Error::internal(format!("worker {} is not running", self.name)))?;
        tx.send(task)
            .map_err(|_| Error::internal(format!("worker {} input closed", self.name)))
    }
}

// ---------------------------------------------------------------------------
// Worker loop
// ---------------------------------------------------------------------------

async fn worker_loop(
    name: String,
    proxy: Option<String>,
    env: WorkerEnv,
    mut input_rx: mpsc::UnboundedReceiver<Task>,
    out: mpsc::UnboundedSender<WorkerEvent>,
) {
    let emit = |kind: WorkerEventKind| {
        let _ = out.send(WorkerEvent {
            worker: name.clone(),
            kind,
        });
    };

    emit(WorkerEventKind::Ready);

    let mut heartbeat_seq = 0u64;
    loop {
        tokio::select! {
            maybe_task = input_rx.recv() => {
                let Some(task) = maybe_task else { break };
                emit(WorkerEventKind::Working { task: task.clone() });

                match execute_task(&task, &proxy, &env).await {
                    Ok(()) => {
                        emit(WorkerEventKind::Log {
                            level: "INFO".to_string(),
                            message: format!("task {task} finished"),
                        });
                        emit(WorkerEventKind::Done);
                    }
                    Err(e) => {
                        tracing::warn!(task = %task, error = %e, "task failed");
                        emit(WorkerEventKind::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
            _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                heartbeat_seq += 1;
                emit(WorkerEventKind::Heartbeat { seq: heartbeat_seq });
            }
        }
    }
}

async fn execute_task(task: &Task, proxy: &Option<String>, env: &WorkerEnv) -> Result<()> {
    let account = load_account(task, env)?;

    let mut config = FetcherConfig::new(
        account.session.clone(),
        proxy.clone(),
        env.settings.requests_per_minute,
    );
    config.site_root = env.site_root.clone();
    config.mobile_root = env.mobile_root.clone();
    let fetcher = Fetcher::new(config)?;

    let mut ctx = TaskContext::new(
        env.pool.clone(),
        fetcher,
        env.settings.clone(),
        env.cache_dir.clone(),
        account,
    );

    let result = task.run(&mut ctx).await;
    if matches!(result, Err(Error::SessionInvalid)) {
        let conn = get_conn(&env.pool)?;
        accounts::mark_invalid(&conn, task.account_id)?;
        tracing::warn!(account = task.account_id, "account flagged invalid");
    }
    result
}

fn load_account(task: &Task, env: &WorkerEnv) -> Result<Account> {
    let conn = get_conn(&env.pool)?;
    let account = accounts::get_account(&conn, task.account_id)?
        .ok_or_else(|| Error::not_found("account", task.account_id))?;
    if account.is_invalid {
        return Err(Error::Validation(format!(
            "account {} has an invalid session",
            account.name
        )));
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gy_db::init_memory_pool;

    fn test_env() -> WorkerEnv {
        WorkerEnv::new(
            init_memory_pool().unwrap(),
            WorkerSettings::default(),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut worker = Worker::new("worker-1", None);
        assert!(worker.is_pending());

        worker.start(test_env(), out_tx.clone()).unwrap();
        assert!(worker.is_running());
        assert!(worker.is_suspended());

        // starting twice is illegal
        assert!(worker.start(test_env(), out_tx).is_err());

        let ready = out_rx.recv().await.unwrap();
        assert!(matches!(ready.kind, WorkerEventKind::Ready));
        assert_eq!(ready.worker, "worker-1");

        worker.stop();
        assert_eq!(worker.state(), WorkerState::Terminated);
        // stop is idempotent
        worker.stop();

        worker.reset();
        assert!(worker.is_pending());
    }

    #[tokio::test]
    async fn heartbeats_while_idle() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut worker = Worker::new("worker-1", None);
        worker.start(test_env(), out_tx).unwrap();

        // Ready first, then a heartbeat after ~1s of idleness.
        let first = out_rx.recv().await.unwrap();
        assert!(matches!(first.kind, WorkerEventKind::Ready));

        let second = tokio::time::timeout(Duration::from_secs(3), out_rx.recv())
            .await
            .expect("expected a heartbeat")
            .unwrap();
        assert!(matches!(second.kind, WorkerEventKind::Heartbeat { seq: 1 }));

        worker.stop();
    }

    #[tokio::test]
    async fn missing_account_reports_error_and_stays_alive() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let mut worker = Worker::new("worker-1", None);
        worker.start(test_env(), out_tx).unwrap();

        worker
            .dispatch(Task::new(crate::tasks::TaskKind::Note, 999))
            .unwrap();

        let mut saw_error = false;
        let mut saw_heartbeat_after_error = false;
        for _ in 0..16 {
            let Ok(Some(event)) =
                tokio::time::timeout(Duration::from_secs(3), out_rx.recv()).await
            else {
                break;
            };
            match event.kind {
                WorkerEventKind::Error { .. } => saw_error = true,
                WorkerEventKind::Heartbeat { .. } if saw_error => {
                    saw_heartbeat_after_error = true;
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_error);
        assert!(saw_heartbeat_after_error);

        worker.stop();
    }
}
