//! Bounded worker pool running one task per chromosome.
//!
//! A run blocks the submitting thread until every task has signalled
//! completion. Results come back in submission order. Cancellation is
//! cooperative: tasks poll [`TaskContext::is_stopped`] in their loops.

use std::{
    error, fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam::queue::ArrayQueue;
use indicatif::ProgressBar;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::error::Error;
use crate::aux::{
    he::TaskPanicked,
    pbar::{prepare_pbar, PBSummary},
};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker threads. 0 picks the available hardware parallelism.
    pub threads: usize,
    pub show_progress: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            show_progress: false,
        }
    }
}

impl PoolConfig {
    fn worker_count(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }

        thread::available_parallelism().map_or(1, |n| n.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl RunPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunPhase::Running,
            2 => RunPhase::Completed,
            3 => RunPhase::Cancelled,
            4 => RunPhase::Failed,
            _ => RunPhase::Idle,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Cancelled | RunPhase::Failed)
    }
}

#[derive(Debug, Default)]
struct RunShared {
    stopped: AtomicBool,
    failed: AtomicBool,
    total: AtomicUsize,
    completed: AtomicUsize,
    phase: AtomicU8,
}

/// Shared view of a run: stop it, or watch its progress from another thread.
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    inner: Arc<RunShared>,
}

impl RunHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every task of the run to return at its next checkpoint.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// `(completed, total)` task counts.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.inner.completed.load(Ordering::Acquire),
            self.inner.total.load(Ordering::Acquire),
        )
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    fn same_run(&self, other: &RunHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that already finished a run starts the next one unstopped; a
    /// stop raised on a fresh handle still cancels its first run.
    fn begin(&self, total: usize) {
        if self.phase().is_terminal() {
            self.inner.stopped.store(false, Ordering::Release);
        }
        self.inner.failed.store(false, Ordering::Release);
        self.inner.completed.store(0, Ordering::Release);
        self.inner.total.store(total, Ordering::Release);
        self.set_phase(RunPhase::Running);
    }

    fn set_phase(&self, phase: RunPhase) {
        self.inner.phase.store(phase as u8, Ordering::Release);
    }

    fn terminal_phase(&self) -> RunPhase {
        if self.inner.failed.load(Ordering::Acquire) {
            RunPhase::Failed
        } else if self.is_stopped() {
            RunPhase::Cancelled
        } else {
            RunPhase::Completed
        }
    }
}

/// What a task sees of its run.
pub struct TaskContext<'r> {
    index: usize,
    handle: &'r RunHandle,
}

impl<'r> TaskContext<'r> {
    /// Submission index, i.e. the chromosome index.
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }
}

/// One unit of chromosome-scoped work. `Ok(None)` means "nothing for this
/// chromosome".
pub type PooledTask<'a, T> = Box<dyn FnOnce(&TaskContext<'_>) -> Result<Option<T>, Error> + Send + 'a>;

#[derive(Debug)]
pub enum PoolError {
    Cancelled,
    Failed(Error),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Cancelled => write!(f, "operation cancelled"),
            PoolError::Failed(e) => write!(f, "operation failed: {}", e),
        }
    }
}

impl error::Error for PoolError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            PoolError::Cancelled => None,
            PoolError::Failed(e) => Some(e.as_ref()),
        }
    }
}

/// Outcome of one run. Slots of tasks that returned early or failed hold
/// `None`; the other chromosomes' results stay intact.
#[derive(Debug)]
pub struct PoolReport<T> {
    pub results: Vec<Option<T>>,
    pub phase: RunPhase,
    pub error: Option<Error>,
    pub elapsed: Duration,
}

impl<T> PoolReport<T> {
    pub fn is_completed(&self) -> bool {
        self.phase == RunPhase::Completed
    }

    pub fn into_result(self) -> Result<Vec<Option<T>>, PoolError> {
        match self.phase {
            RunPhase::Completed => Ok(self.results),
            RunPhase::Failed => Err(PoolError::Failed(
                self.error.unwrap_or_else(|| "task failed without an error".into()),
            )),
            _ => Err(PoolError::Cancelled),
        }
    }
}

/// Bookkeeping of one in-flight `start_pool` call.
struct PoolRun<T> {
    m_handle: RunHandle,
    m_total: usize,
    m_slots: ArrayQueue<(usize, Option<T>)>,
    m_first_error: OnceLock<Error>,
    m_pbar: ProgressBar,
}

impl<T> PoolRun<T> {
    fn new(handle: RunHandle, total: usize, pbar: ProgressBar) -> Self {
        handle.begin(total);

        Self {
            m_handle: handle,
            m_total: total,
            m_slots: ArrayQueue::new(total.max(1)),
            m_first_error: OnceLock::new(),
            m_pbar: pbar,
        }
    }

    fn fail(&self, index: usize, err: Error) {
        log::debug!("task {} failed: {}", index, err);
        if self.m_first_error.set(err).is_ok() {
            self.m_handle.inner.failed.store(true, Ordering::Release);
            // let the siblings wind down early
            self.m_handle.stop();
        }
    }

    fn store(&self, index: usize, value: Option<T>) {
        if self.m_slots.push((index, value)).is_err() {
            log::error!("result slot of task {} was written twice", index);
        }
    }

    fn notify_done(&self) {
        let done = self.m_handle.inner.completed.fetch_add(1, Ordering::AcqRel) + 1;
        self.m_pbar.inc(1);

        if done == self.m_total {
            self.m_handle.set_phase(self.m_handle.terminal_phase());
        }
    }

    fn into_report(self, started: Instant) -> PoolReport<T> {
        let mut results: Vec<Option<T>> = (0..self.m_total).map(|_| None).collect();
        while let Some((index, value)) = self.m_slots.pop() {
            results[index] = value;
        }

        // an empty run never hits notify_done
        if self.m_total == 0 {
            self.m_handle.set_phase(self.m_handle.terminal_phase());
        }

        self.m_pbar.finish_with_summary();

        PoolReport {
            results,
            phase: self.m_handle.phase(),
            error: self.m_first_error.into_inner(),
            elapsed: started.elapsed(),
        }
    }
}

/// Signals completion of one task when dropped, whatever way the task exits.
struct DoneGuard<'r, T> {
    run: &'r PoolRun<T>,
    index: usize,
    value: Option<T>,
}

impl<'r, T> DoneGuard<'r, T> {
    fn new(run: &'r PoolRun<T>, index: usize) -> Self {
        Self {
            run,
            index,
            value: None,
        }
    }
}

impl<'r, T> Drop for DoneGuard<'r, T> {
    fn drop(&mut self) {
        self.run.store(self.index, self.value.take());
        self.run.notify_done();
    }
}

/// The process-wide operation pool. Construct once at start-up and share it.
pub struct OperationPool {
    m_thread_pool: ThreadPool,
    m_config: PoolConfig,
    m_active: Mutex<Vec<RunHandle>>,
}

impl OperationPool {
    pub fn new(config: PoolConfig) -> Result<Self, Error> {
        let threads = config.worker_count();
        let m_thread_pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("OperationPool-{i}"))
            .build()?;

        log::debug!("operation pool ready with {} workers", threads);

        Ok(Self {
            m_thread_pool,
            m_config: config,
            m_active: Mutex::new(Vec::new()),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.m_thread_pool.current_num_threads()
    }

    pub fn start_pool<'a, T: Send>(&self, description: &str, tasks: Vec<PooledTask<'a, T>>) -> PoolReport<T> {
        self.start_pool_with(description, tasks, &RunHandle::new())
    }

    /// Runs `tasks` and blocks until all of them are done. `handle` may be
    /// cloned beforehand to stop the run or follow it from another thread, and
    /// reused for later runs.
    pub fn start_pool_with<'a, T: Send>(
        &self,
        description: &str,
        tasks: Vec<PooledTask<'a, T>>,
        handle: &RunHandle,
    ) -> PoolReport<T> {
        let started = Instant::now();
        let total = tasks.len();

        let pbar = prepare_pbar(total as u64, self.m_config.show_progress);
        pbar.set_message(description.to_string());

        self.register(handle);
        let run = PoolRun::new(handle.clone(), total, pbar);
        log::debug!("{}: {} tasks on {} workers", description, total, self.worker_count());

        self.m_thread_pool.scope(|s| {
            for (index, task) in tasks.into_iter().enumerate() {
                let run = &run;
                s.spawn(move |_| {
                    let mut guard = DoneGuard::new(run, index);
                    let ctx = TaskContext {
                        index,
                        handle: &run.m_handle,
                    };

                    match panic::catch_unwind(AssertUnwindSafe(|| task(&ctx))) {
                        Ok(Ok(value)) => guard.value = value,
                        Ok(Err(err)) => run.fail(index, err),
                        Err(payload) => {
                            run.fail(index, Box::new(TaskPanicked::from_payload(index, payload.as_ref())))
                        }
                    }
                });
            }
        });

        self.unregister(handle);
        let report = run.into_report(started);

        match report.phase {
            RunPhase::Completed => log::debug!("{}: done in {:.2?}", description, report.elapsed),
            RunPhase::Cancelled => log::info!("{}: cancelled", description),
            _ => log::warn!(
                "{}: failed ({})",
                description,
                report.error.as_ref().map_or(String::new(), |e| e.to_string())
            ),
        }

        report
    }

    /// Stops every run currently in flight on this pool.
    pub fn stop_all(&self) {
        let active = self.m_active.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in active.iter() {
            handle.stop();
        }
    }

    fn register(&self, handle: &RunHandle) {
        self.m_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());
    }

    fn unregister(&self, handle: &RunHandle) {
        self.m_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|h| !h.same_run(handle));
    }
}
