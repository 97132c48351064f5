//! Serial background worker.
//!
//! # Responsibility
//! - Run submitted tasks off the foreground flow, one at a time, against a
//!   state value owned by the worker thread (a connection, a client).
//! - Let callers cancel a task that has not started yet.
//!
//! # Invariants
//! - Tasks run strictly in submission order.
//! - A cancelled task never runs; cancelling a running task has no effect.
//! - A panicking task is logged and does not stop the worker.
//! - Dropping a `Drain` worker runs every task submitted before the drop,
//!   then joins the thread. Outstanding `WorkerHandle` clones do not delay
//!   the join; their later submissions are discarded.
//! - Dropping an `Abandon` worker skips every queued task and detaches the
//!   thread, so the dropping thread never waits on a running task.

use log::{debug, error};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

struct Task<S> {
    id: u64,
    cancelled: Arc<AtomicBool>,
    job: Job<S>,
}

enum Message<S> {
    Run(Task<S>),
    Stop,
}

/// What dropping a `SerialWorker` does with work still in its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Run queued tasks, then join the thread.
    Drain,
    /// Skip queued tasks and detach the thread without joining.
    Abandon,
}

/// The worker thread is gone and accepts no more tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerClosed(pub &'static str);

impl Display for WorkerClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker `{}` is closed", self.0)
    }
}

impl Error for WorkerClosed {}

/// Handle to one submitted task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Prevents the task from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cloneable submission side of a `SerialWorker`.
pub struct WorkerHandle<S> {
    name: &'static str,
    sender: Sender<Message<S>>,
    next_id: Arc<AtomicU64>,
}

impl<S> Clone for WorkerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<S: 'static> WorkerHandle<S> {
    /// Queues `job` behind every previously submitted task.
    pub fn submit(
        &self,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<TaskHandle, WorkerClosed> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = Task {
            id,
            cancelled: Arc::clone(&cancelled),
            job: Box::new(job),
        };

        self.sender.send(Message::Run(task)).map_err(|_| {
            error!(
                "event=task_submit module=work_queue status=error worker={} error_code=worker_closed",
                self.name
            );
            WorkerClosed(self.name)
        })?;

        Ok(TaskHandle { id, cancelled })
    }
}

/// Owner of a worker thread and its submission queue.
pub struct SerialWorker<S> {
    handle: Option<WorkerHandle<S>>,
    thread: Option<JoinHandle<()>>,
    policy: ShutdownPolicy,
    abandoned: Arc<AtomicBool>,
}

impl<S: Send + 'static> SerialWorker<S> {
    /// Starts a worker thread that owns `state` and drains on drop.
    pub fn spawn(name: &'static str, state: S) -> std::io::Result<Self> {
        Self::spawn_with(name, state, ShutdownPolicy::Drain)
    }

    /// Starts a worker thread that owns `state`.
    pub fn spawn_with(
        name: &'static str,
        state: S,
        policy: ShutdownPolicy,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Message<S>>();
        let abandoned = Arc::new(AtomicBool::new(false));
        let thread_abandoned = Arc::clone(&abandoned);
        let thread = thread::Builder::new()
            .name(format!("booksearch-{name}"))
            .spawn(move || run_tasks(name, state, receiver, &thread_abandoned))?;

        debug!("event=worker_start module=work_queue status=ok worker={name} policy={policy:?}");
        Ok(Self {
            handle: Some(WorkerHandle {
                name,
                sender,
                next_id: Arc::new(AtomicU64::new(1)),
            }),
            thread: Some(thread),
            policy,
            abandoned,
        })
    }

    /// Returns a cloneable submission handle.
    pub fn handle(&self) -> Result<WorkerHandle<S>, WorkerClosed> {
        self.handle.clone().ok_or(WorkerClosed("unknown"))
    }

    /// Queues `job` behind every previously submitted task.
    pub fn submit(
        &self,
        job: impl FnOnce(&mut S) + Send + 'static,
    ) -> Result<TaskHandle, WorkerClosed> {
        match &self.handle {
            Some(handle) => handle.submit(job),
            None => Err(WorkerClosed("unknown")),
        }
    }
}

impl<S> Drop for SerialWorker<S> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let name = handle.name;
        if self.policy == ShutdownPolicy::Abandon {
            self.abandoned.store(true, Ordering::Release);
        }
        // A closed queue means the thread already exited.
        let _ = handle.sender.send(Message::Stop);
        drop(handle);

        let Some(thread) = self.thread.take() else {
            return;
        };
        match self.policy {
            ShutdownPolicy::Abandon => {
                drop(thread);
                debug!("event=worker_stop module=work_queue status=detached worker={name}");
            }
            ShutdownPolicy::Drain => {
                if thread.join().is_err() {
                    error!("event=worker_stop module=work_queue status=error worker={name}");
                } else {
                    debug!("event=worker_stop module=work_queue status=ok worker={name}");
                }
            }
        }
    }
}

fn run_tasks<S>(
    name: &'static str,
    mut state: S,
    receiver: Receiver<Message<S>>,
    abandoned: &AtomicBool,
) {
    while let Ok(message) = receiver.recv() {
        let task = match message {
            Message::Run(task) => task,
            Message::Stop => break,
        };
        if abandoned.load(Ordering::Acquire) {
            debug!(
                "event=task_run module=work_queue status=abandoned worker={} task_id={}",
                name, task.id
            );
            continue;
        }
        if task.cancelled.load(Ordering::Acquire) {
            debug!(
                "event=task_run module=work_queue status=cancelled worker={} task_id={}",
                name, task.id
            );
            continue;
        }

        let job = task.job;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut state)));
        if outcome.is_err() {
            error!(
                "event=task_run module=work_queue status=error worker={} task_id={} error_code=task_panicked",
                name, task.id
            );
        }
    }

    let discarded = receiver.try_iter().count();
    if discarded > 0 {
        debug!(
            "event=worker_stop module=work_queue status=discarded worker={name} count={discarded}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{SerialWorker, ShutdownPolicy};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn tasks_run_in_submission_order() {
        let (tx, rx) = mpsc::channel();
        {
            let worker = SerialWorker::spawn("order", Vec::<u32>::new()).unwrap();
            for value in 0..20 {
                worker.submit(move |seen: &mut Vec<u32>| seen.push(value)).unwrap();
            }
            worker
                .submit(move |seen: &mut Vec<u32>| tx.send(seen.clone()).unwrap())
                .unwrap();
        }
        assert_eq!(rx.recv().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn cancelled_task_never_runs() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn("cancel", ()).unwrap();

        worker
            .submit(move |_| {
                gate_rx.recv().unwrap();
            })
            .unwrap();
        let skipped_tx = tx.clone();
        let skipped = worker
            .submit(move |_| skipped_tx.send("skipped").unwrap())
            .unwrap();
        worker.submit(move |_| tx.send("ran").unwrap()).unwrap();

        skipped.cancel();
        assert!(skipped.is_cancelled());
        gate_tx.send(()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "ran");
        drop(worker);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn panicking_task_does_not_stop_worker() {
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn("panic", 0_u32).unwrap();

        worker.submit(|_| panic!("boom")).unwrap();
        worker
            .submit(move |count: &mut u32| {
                *count += 1;
                tx.send(*count).unwrap();
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    }

    #[test]
    fn task_ids_increase() {
        let worker = SerialWorker::spawn("ids", ()).unwrap();
        let first = worker.submit(|_| {}).unwrap();
        let second = worker.handle().unwrap().submit(|_| {}).unwrap();
        assert!(second.id() > first.id());
    }

    #[test]
    fn drain_worker_runs_queued_tasks_before_join() {
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn("drain", 0_u32).unwrap();
        let straggler = worker.handle().unwrap();
        for _ in 0..5 {
            worker
                .submit(|count: &mut u32| {
                    std::thread::sleep(Duration::from_millis(10));
                    *count += 1;
                })
                .unwrap();
        }
        worker
            .submit(move |count: &mut u32| tx.send(*count).unwrap())
            .unwrap();

        drop(worker);
        assert_eq!(rx.try_recv().unwrap(), 5);
        assert!(straggler.submit(|_| {}).is_err());
    }

    #[test]
    fn abandon_worker_drop_does_not_wait_for_running_task() {
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        let worker = SerialWorker::spawn_with("abandon", (), ShutdownPolicy::Abandon).unwrap();

        worker
            .submit(move |_| {
                started_tx.send(()).unwrap();
                let _ = gate_rx.recv();
            })
            .unwrap();
        worker.submit(move |_| tx.send("queued").unwrap()).unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let started_at = Instant::now();
        drop(worker);
        assert!(started_at.elapsed() < Duration::from_millis(500));

        gate_tx.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }
}
