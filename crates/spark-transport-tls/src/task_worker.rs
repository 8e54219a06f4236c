//! The delegated-task worker (spec §4.4): a single background thread that
//! runs the crypto-heavy step of a handshake (`NEED_TASK`) off the selector
//! thread, then notifies the selector so it can resume driving the
//! channel. Queuing is a plain FIFO; ordering across channels doesn't
//! matter, only that a given channel's own tasks run in the order they
//! were enqueued relative to each other (true here, since a channel never
//! enqueues a second task before `task_pending` clears).

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    shutdown: Mutex<bool>,
}

/// Owns the single delegated-task thread. Dropping it stops the thread
/// (after it finishes whatever job it's mid-run on) and joins it.
pub struct TaskWorker {
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TaskWorker {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutdown: Mutex::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("spark-tls-task".to_string())
            .spawn(move || run(worker_shared))
            .expect("failed to spawn spark-tls-task worker thread");

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Enqueues a job to run on the task thread. Callers are responsible
    /// for the `task_pending` guard (spec §4.4) that keeps a channel from
    /// being enqueued twice before its first task completes.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.queue.lock().push_back(Box::new(job));
        self.shared.condvar.notify_one();
    }
}

impl Default for TaskWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskWorker {
    fn drop(&mut self) {
        *self.shared.shutdown.lock() = true;
        self.shared.condvar.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    break Some(job);
                }
                if *shared.shutdown.lock() {
                    return;
                }
                shared.condvar.wait(&mut queue);
            }
        };
        if let Some(job) = job {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_enqueued_jobs() {
        let worker = TaskWorker::new();
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            worker.enqueue(move || {
                tx.send(i).unwrap();
            });
        }
        let mut got: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }
}
