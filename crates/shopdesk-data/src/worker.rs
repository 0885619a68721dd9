//! # Background Task Queue
//!
//! Fire-and-forget side effects (audit writes, webhook calls, session
//! repair) run here so their failures never reach the caller.
//!
//! ```text
//! ┌─────────────┐   Command::Run    ┌──────────────────────────────────┐
//! │  services   │ ────────────────► │  worker loop (tokio::select!)    │
//! │  submit()   │   unbounded mpsc  │                                  │
//! └─────────────┘                   │  JoinSet ─► task A  (Ok)         │
//!                                   │          ─► task B  (Err → warn) │
//! ┌─────────────┐   Flush/Shutdown  │          ─► task C  (panic→error)│
//! │  flush()    │ ────────────────► │                                  │
//! └─────────────┘   oneshot reply   └──────────────────────────────────┘
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, trace, warn};

use crate::error::DataResult;

type BoxTask = Pin<Box<dyn Future<Output = DataResult<()>> + Send>>;

enum Command {
    Run { label: String, task: BoxTask },
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the background worker. Dropping it lets the worker finish
/// what it has and exit.
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Starts the worker on the current runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(rx));
        TaskQueue {
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues `task`. Never fails; after shutdown the task is dropped.
    pub fn submit<F>(&self, label: impl Into<String>, task: F)
    where
        F: Future<Output = DataResult<()>> + Send + 'static,
    {
        let label = label.into();
        trace!(%label, "Submitting background task");
        if self
            .tx
            .send(Command::Run {
                label: label.clone(),
                task: Box::pin(task),
            })
            .is_err()
        {
            debug!(%label, "Task queue stopped, dropping task");
        }
    }

    /// Waits until the queue is idle, including tasks submitted by tasks.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Runs everything queued so far, then stops the worker.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

struct Worker {
    tasks: JoinSet<(String, DataResult<()>)>,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl Worker {
    fn start(&mut self, label: String, task: BoxTask) {
        self.tasks.spawn(async move {
            let result = task.await;
            (label, result)
        });
    }

    fn finished(&mut self, joined: Result<(String, DataResult<()>), JoinError>) {
        match joined {
            Ok((label, Ok(()))) => trace!(%label, "Background task finished"),
            Ok((label, Err(e))) => warn!(%label, error = %e, "Background task failed"),
            Err(e) if e.is_panic() => error!(error = %e, "Background task panicked"),
            Err(e) => warn!(error = %e, "Background task aborted"),
        }
    }

    /// Pulls commands that are already waiting so tasks queued by a task
    /// that just finished are not missed.
    fn absorb_pending(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) -> Option<oneshot::Sender<()>> {
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Run { label, task } => self.start(label, task),
                Command::Flush(done) => self.flush_waiters.push(done),
                Command::Shutdown(done) => return Some(done),
            }
        }
        None
    }

    fn release_waiters_if_idle(&mut self, rx: &mut mpsc::UnboundedReceiver<Command>) -> Option<oneshot::Sender<()>> {
        let shutdown = self.absorb_pending(rx);
        if self.tasks.is_empty() {
            for waiter in self.flush_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
        shutdown
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.finished(joined);
        }
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut worker = Worker {
        tasks: JoinSet::new(),
        flush_waiters: Vec::new(),
    };
    debug!("Task queue started");

    let shutdown = loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Run { label, task }) => worker.start(label, task),
                Some(Command::Flush(done)) => {
                    worker.flush_waiters.push(done);
                    if let Some(done) = worker.release_waiters_if_idle(&mut rx) {
                        break Some(done);
                    }
                }
                Some(Command::Shutdown(done)) => break Some(done),
                None => break None,
            },
            Some(joined) = worker.tasks.join_next(), if !worker.tasks.is_empty() => {
                worker.finished(joined);
                if let Some(done) = worker.release_waiters_if_idle(&mut rx) {
                    break Some(done);
                }
            }
        }
    };

    // Whatever was queued before the stop request still runs.
    loop {
        worker.drain().await;
        if worker.absorb_pending(&mut rx).is_none() && worker.tasks.is_empty() {
            break;
        }
    }
    rx.close();

    info!("Task queue stopped");
    if let Some(done) = shutdown {
        let _ = done.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_flush_waits_for_submitted_tasks() {
        let queue = TaskQueue::spawn();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..5u64 {
            let done = done.clone();
            queue.submit("count", async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        queue.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
    }

    fn done_never() -> bool {
        false
    }

    #[tokio::test]
    async fn test_failures_and_panics_are_isolated() {
        let queue = TaskQueue::spawn();
        let done = Arc::new(AtomicUsize::new(0));

        queue.submit("fails", async { Err(DataError::Notification("down".into())) });
        queue.submit("panics", async {
            if done_never() {
                return Ok(());
            }
            panic!("boom")
        });
        let d = done.clone();
        queue.submit("ok", async move {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        queue.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_covers_tasks_submitted_by_tasks() {
        let queue = Arc::new(TaskQueue::spawn());
        let done = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let d = done.clone();
        queue.submit("outer", async move {
            let d2 = d.clone();
            inner_queue.submit("inner", async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                d2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        queue.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_drops_later_submissions() {
        let queue = TaskQueue::spawn();
        let done = Arc::new(AtomicUsize::new(0));

        let d = done.clone();
        queue.submit("before", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        queue.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);

        let d = done.clone();
        queue.submit("after", async move {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        queue.flush().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
