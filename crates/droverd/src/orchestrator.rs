//! The scheduler: a polling loop that admits tasks into a bounded worker
//! pool, preferring resumes over new work so human-answered tasks are not
//! starved by a full backlog.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use drover_agents::client::AgentClient;
use drover_core::config::DATA_DIR;
use drover_core::state::TaskStatus;
use drover_core::types::Task;
use drover_git::command::GitCli;
use drover_git::repo::RepoHandle;
use drover_git::worktree::WorktreeManager;
use tracing::{debug, warn};

use crate::journal::JsonlJournal;
use crate::pacer::RequestPacer;
use crate::pipeline;
use crate::store::TaskStore;
use crate::sync;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum tasks in flight at once.
    pub concurrency: usize,
    /// How long the polling loop sleeps when nothing was admitted.
    pub poll_interval: Duration,
    /// Minimum spacing between agent request start times; zero disables it.
    pub min_request_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_request_delay: Duration::ZERO,
        }
    }
}

/// Handle owning the orchestrator's process-wide state. `start` and `stop`
/// are both idempotent; `stop` blocks until the polling loop and every
/// in-flight pipeline have finished.
pub struct Orchestrator {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) store: Arc<TaskStore>,
    pub(crate) repo: RepoHandle,
    pub(crate) git: GitCli,
    pub(crate) worktrees: WorktreeManager,
    pub(crate) client: Arc<dyn AgentClient>,
    pub(crate) pacer: RequestPacer,
    pub(crate) data_dir: PathBuf,
    pub(crate) journal: JsonlJournal,
    config: OrchestratorConfig,
    running: AtomicBool,
    stop_requested: AtomicBool,
    slots: WorkerSlots,
    inflight: Mutex<HashSet<String>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        repo: RepoHandle,
        client: Arc<dyn AgentClient>,
        config: OrchestratorConfig,
    ) -> Self {
        let data_dir = repo.root.join(DATA_DIR);
        let shared = Shared {
            store,
            repo,
            git: GitCli::default(),
            worktrees: WorktreeManager::default(),
            client,
            pacer: RequestPacer::new(config.min_request_delay),
            journal: JsonlJournal::new(&data_dir),
            data_dir,
            slots: WorkerSlots::new(config.concurrency.max(1)),
            config,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            inflight: Mutex::new(HashSet::new()),
            workers: Mutex::new(Vec::new()),
            poll_handle: Mutex::new(None),
        };

        Self {
            shared: Arc::new(shared),
        }
    }

    /// Start the polling loop. Calling start on a running orchestrator is a
    /// no-op.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.stop_requested.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || poll_loop(shared));
        *sync::lock(&self.shared.poll_handle) = Some(handle);
    }

    /// Signal the polling loop to exit and wait for every in-flight pipeline
    /// to finish naturally. There is no hard kill for running agents.
    pub fn stop(&self) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        self.shared.stop_requested.store(true, Ordering::SeqCst);

        if let Some(handle) = sync::lock(&self.shared.poll_handle).take() {
            let _ = handle.join();
        }

        loop {
            let handles: Vec<JoinHandle<()>> = sync::lock(&self.shared.workers).drain(..).collect();
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let _ = handle.join();
            }
        }

        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
enum WorkerKind {
    New,
    Resume,
}

fn poll_loop(shared: Arc<Shared>) {
    while !shared.stop_requested.load(Ordering::SeqCst) {
        reap_finished_workers(&shared);

        let tasks = match shared.store.list() {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "task listing failed; retrying next poll");
                sleep_until_stop(&shared, shared.config.poll_interval);
                continue;
            }
        };

        let mut admitted = false;

        // Resumes first: a human already answered, so finishing that
        // conversation beats starting new work.
        for task in tasks.iter().filter(|task| task.is_resume_eligible()) {
            admitted |= try_admit(&shared, task, WorkerKind::Resume);
        }
        for task in tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
        {
            admitted |= try_admit(&shared, task, WorkerKind::New);
        }

        if !admitted {
            sleep_until_stop(&shared, shared.config.poll_interval);
        }
    }
}

fn try_admit(shared: &Arc<Shared>, task: &Task, kind: WorkerKind) -> bool {
    {
        let inflight = sync::lock(&shared.inflight);
        if inflight.contains(&task.id.0) {
            return false;
        }
    }

    let Some(slot) = shared.slots.try_acquire() else {
        return false;
    };
    sync::lock(&shared.inflight).insert(task.id.0.clone());
    debug!(task = %task.id, "admitted");

    let shared_worker = Arc::clone(shared);
    let task = task.clone();
    let handle = thread::spawn(move || {
        let _slot = slot;
        let task_id = task.id.0.clone();
        match kind {
            WorkerKind::New => pipeline::run_new_task(&shared_worker, task),
            WorkerKind::Resume => pipeline::run_resume(&shared_worker, task),
        }
        sync::lock(&shared_worker.inflight).remove(&task_id);
    });
    sync::lock(&shared.workers).push(handle);

    true
}

fn reap_finished_workers(shared: &Shared) {
    let mut workers = sync::lock(&shared.workers);
    let mut alive = Vec::with_capacity(workers.len());
    for handle in workers.drain(..) {
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            alive.push(handle);
        }
    }
    *workers = alive;
}

fn sleep_until_stop(shared: &Shared, interval: Duration) {
    let deadline = Instant::now() + interval;
    while Instant::now() < deadline {
        if shared.stop_requested.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(STOP_CHECK_INTERVAL.min(deadline - Instant::now()));
    }
}

/// Admission control: a fixed number of worker slots handed out without
/// blocking. The guard returns its slot on drop.
pub(crate) struct WorkerSlots {
    available: Arc<AtomicUsize>,
}

pub(crate) struct SlotGuard {
    available: Arc<AtomicUsize>,
}

impl WorkerSlots {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            available: Arc::new(AtomicUsize::new(capacity)),
        }
    }

    pub(crate) fn try_acquire(&self) -> Option<SlotGuard> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match self.available.compare_exchange(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        available: Arc::clone(&self.available),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.available.fetch_add(1, Ordering::AcqRel);
    }
}
