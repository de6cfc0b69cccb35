//! Minimal task scheduler backing the parallel read stage
//!
//! The orchestrator only needs a small contract: create a task, run it on a
//! worker pool, wait for completion with a millisecond timeout, read an
//! aggregated progress percentage and get told when per-task progress moves.
//! Tasks are spawned onto the rayon global pool, which sizes itself to the
//! hardware; correctness does not depend on the degree of parallelism.

use cadio_core::{AbortFlag, TaskProgress};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Identifier of a scheduled task, unique per manager
pub type TaskId = u64;

/// Whether a task record is discarded as soon as the task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAutoDestroy {
    /// Remove the record on completion
    On,
    /// Keep the record for later inspection
    Off,
}

type TaskFn = Box<dyn FnOnce(&TaskProgress) + Send>;
type ProgressChangedHandler = Arc<dyn Fn(TaskId, i32) + Send + Sync>;

struct TaskState {
    done: Mutex<bool>,
    done_cv: Condvar,
    progress_pct: AtomicI32,
}

struct TaskEntry {
    func: Option<TaskFn>,
    state: Arc<TaskState>,
}

struct Inner {
    tasks: Mutex<HashMap<TaskId, TaskEntry>>,
    next_id: AtomicU64,
    abort: AbortFlag,
    on_progress_changed: Mutex<Option<ProgressChangedHandler>>,
}

/// Scheduler for concurrent worker tasks with per-task progress
///
/// Cloning yields another handle to the same manager. Every task's root
/// progress shares the manager's abort flag, so a single
/// [`TaskManager::request_abort`] reaches all in-flight workers
/// cooperatively.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Manager with its own abort flag
    #[must_use = "creates a new task manager"]
    pub fn new() -> Self {
        Self::with_abort(AbortFlag::new())
    }

    /// Manager whose tasks observe an externally owned abort flag
    ///
    /// Orchestrators hand in their root progress flag so cancelling the
    /// operation cancels every worker.
    #[must_use = "creates a new task manager"]
    pub fn with_abort(abort: AbortFlag) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                abort,
                on_progress_changed: Mutex::new(None),
            }),
        }
    }

    /// Create a task record; the task does not start until [`TaskManager::run`]
    pub fn new_task(&self, func: impl FnOnce(&TaskProgress) + Send + 'static) -> TaskId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = TaskEntry {
            func: Some(Box::new(func)),
            state: Arc::new(TaskState {
                done: Mutex::new(false),
                done_cv: Condvar::new(),
                progress_pct: AtomicI32::new(0),
            }),
        };
        self.inner.tasks.lock().unwrap().insert(id, entry);
        id
    }

    /// Spawn task `id` onto the worker pool
    ///
    /// Unknown or already-running ids are ignored. With
    /// [`TaskAutoDestroy::On`] the record disappears once the task returns.
    pub fn run(&self, id: TaskId, auto_destroy: TaskAutoDestroy) {
        let (func, state) = {
            let mut tasks = self.inner.tasks.lock().unwrap();
            let Some(entry) = tasks.get_mut(&id) else {
                return;
            };
            (entry.func.take(), Arc::clone(&entry.state))
        };
        let Some(func) = func else {
            return;
        };

        let inner = Arc::clone(&self.inner);
        rayon::spawn(move || {
            let observer_state = Arc::clone(&state);
            let observer_inner = Arc::clone(&inner);
            let progress = TaskProgress::observed(inner.abort.clone(), move |pct| {
                observer_state.progress_pct.store(pct, Ordering::SeqCst);
                let handler = observer_inner.on_progress_changed.lock().unwrap().clone();
                if let Some(handler) = handler {
                    handler(id, pct);
                }
            });

            func(&progress);
            drop(progress);

            if auto_destroy == TaskAutoDestroy::On {
                inner.tasks.lock().unwrap().remove(&id);
            }
            let mut done = state.done.lock().unwrap();
            *done = true;
            state.done_cv.notify_all();
        });
    }

    /// Block until task `id` completes or `timeout` elapses
    ///
    /// Returns whether the task is done. Ids without a record (never created,
    /// or already auto-destroyed) count as done.
    #[must_use = "reports whether the task completed in time"]
    pub fn wait_for_done(&self, id: TaskId, timeout: Duration) -> bool {
        let state = {
            let tasks = self.inner.tasks.lock().unwrap();
            match tasks.get(&id) {
                Some(entry) => Arc::clone(&entry.state),
                None => return true,
            }
        };

        let done = state.done.lock().unwrap();
        let (done, _timed_out) = state
            .done_cv
            .wait_timeout_while(done, timeout, |done| !*done)
            .unwrap();
        *done
    }

    /// Mean of the live tasks' progress percentages, 0..=100
    #[must_use = "returns the aggregated progress percentage"]
    pub fn global_progress(&self) -> i32 {
        let tasks = self.inner.tasks.lock().unwrap();
        if tasks.is_empty() {
            return 0;
        }
        let sum: i64 = tasks
            .values()
            .map(|entry| i64::from(entry.state.progress_pct.load(Ordering::SeqCst)))
            .sum();
        #[allow(clippy::cast_possible_truncation)]
        let mean = (sum / tasks.len() as i64) as i32;
        mean
    }

    /// Register the progress-changed notification handler
    ///
    /// Called with `(task_id, percent)` whenever a task's root progress
    /// moves. Replaces any previous handler.
    pub fn set_on_progress_changed(&self, handler: impl Fn(TaskId, i32) + Send + Sync + 'static) {
        *self.inner.on_progress_changed.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Request cooperative cancellation of every task of this manager
    pub fn request_abort(&self) {
        self.inner.abort.request();
    }

    /// Number of live task records
    #[must_use = "returns the number of live task records"]
    pub fn task_count(&self) -> usize {
        self.inner.tasks.lock().unwrap().len()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("task_count", &self.task_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    const LONG_WAIT: Duration = Duration::from_secs(10);
    const SHORT_WAIT: Duration = Duration::from_millis(25);

    fn wait_until_done(manager: &TaskManager, id: TaskId) {
        while !manager.wait_for_done(id, SHORT_WAIT) {}
    }

    #[test]
    fn test_task_runs_and_completes() {
        let manager = TaskManager::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        let id = manager.new_task(move |_progress| {
            ran_clone.store(true, Ordering::SeqCst);
        });
        manager.run(id, TaskAutoDestroy::Off);

        assert!(manager.wait_for_done(id, LONG_WAIT));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_wait_for_done_times_out_on_running_task() {
        let manager = TaskManager::new();
        let id = manager.new_task(|_progress| {
            thread::sleep(Duration::from_millis(300));
        });
        manager.run(id, TaskAutoDestroy::Off);

        assert!(!manager.wait_for_done(id, Duration::from_millis(10)));
        assert!(manager.wait_for_done(id, LONG_WAIT));
    }

    #[test]
    fn test_unknown_task_counts_as_done() {
        let manager = TaskManager::new();
        assert!(manager.wait_for_done(42, SHORT_WAIT));
    }

    #[test]
    fn test_task_not_started_until_run() {
        let manager = TaskManager::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        let id = manager.new_task(move |_progress| {
            ran_clone.store(true, Ordering::SeqCst);
        });

        assert!(!manager.wait_for_done(id, SHORT_WAIT));
        assert!(!ran.load(Ordering::SeqCst));

        manager.run(id, TaskAutoDestroy::Off);
        wait_until_done(&manager, id);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_auto_destroy_removes_record() {
        let manager = TaskManager::new();
        let id = manager.new_task(|_progress| {});
        manager.run(id, TaskAutoDestroy::On);
        wait_until_done(&manager, id);
        assert_eq!(manager.task_count(), 0);
    }

    #[test]
    fn test_keep_record_without_auto_destroy() {
        let manager = TaskManager::new();
        let id = manager.new_task(|_progress| {});
        manager.run(id, TaskAutoDestroy::Off);
        wait_until_done(&manager, id);
        assert_eq!(manager.task_count(), 1);
    }

    #[test]
    fn test_global_progress_aggregates_tasks() {
        let manager = TaskManager::new();
        let first = manager.new_task(|progress| progress.set_value(100));
        let second = manager.new_task(|_progress| {});
        manager.run(first, TaskAutoDestroy::Off);
        manager.run(second, TaskAutoDestroy::Off);
        wait_until_done(&manager, first);
        wait_until_done(&manager, second);

        assert_eq!(manager.global_progress(), 50);
    }

    #[test]
    fn test_progress_changed_notification() {
        let manager = TaskManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        manager.set_on_progress_changed(move |id, pct| {
            seen_clone.lock().unwrap().push((id, pct));
        });

        let id = manager.new_task(|progress| {
            progress.set_value(30);
            progress.set_value(100);
        });
        manager.run(id, TaskAutoDestroy::Off);
        wait_until_done(&manager, id);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(id, 30), (id, 100)]);
    }

    #[test]
    fn test_tasks_observe_shared_abort_flag() {
        let flag = AbortFlag::new();
        let manager = TaskManager::with_abort(flag.clone());
        let observed = Arc::new(AtomicBool::new(false));
        let observed_clone = Arc::clone(&observed);

        flag.request();
        let id = manager.new_task(move |progress| {
            observed_clone.store(progress.is_abort_requested(), Ordering::SeqCst);
        });
        manager.run(id, TaskAutoDestroy::Off);
        wait_until_done(&manager, id);

        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_request_abort_reaches_running_tasks() {
        let manager = TaskManager::new();
        let id = manager.new_task(|progress| {
            while !progress.is_abort_requested() {
                thread::sleep(Duration::from_millis(5));
            }
        });
        manager.run(id, TaskAutoDestroy::Off);

        assert!(!manager.wait_for_done(id, Duration::from_millis(30)));
        manager.request_abort();
        assert!(manager.wait_for_done(id, LONG_WAIT));
    }

    #[test]
    fn test_run_twice_is_noop() {
        let manager = TaskManager::new();
        let counter = Arc::new(AtomicI32::new(0));
        let counter_clone = Arc::clone(&counter);
        let id = manager.new_task(move |_progress| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        manager.run(id, TaskAutoDestroy::Off);
        manager.run(id, TaskAutoDestroy::Off);
        wait_until_done(&manager, id);
        thread::sleep(Duration::from_millis(50));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_many_concurrent_tasks() {
        let manager = TaskManager::new();
        let counter = Arc::new(AtomicI32::new(0));
        let ids: Vec<TaskId> = (0..16)
            .map(|_| {
                let counter = Arc::clone(&counter);
                manager.new_task(move |progress| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    progress.set_value(100);
                })
            })
            .collect();
        for &id in &ids {
            manager.run(id, TaskAutoDestroy::Off);
        }
        for &id in &ids {
            wait_until_done(&manager, id);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 16);
        assert_eq!(manager.global_progress(), 100);
    }
}
