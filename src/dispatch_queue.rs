//! Bounded FIFO of pending device writes.
//!
//! Many producers enqueue, one consumer dispatches. Enqueue never blocks:
//! a full queue rejects the task on the spot and the caller decides what to
//! do with the already formatted message (the logger drops it).

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::trace;

use crate::message::LogMessage;

/// What the consumer does with a dequeued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Write the message to the device.
    Print,
    /// Flush the device; the message is ignored.
    Flush,
}

/// A queued unit of work: an operation tag plus the line it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTask {
    pub op: WriteOp,
    pub message: LogMessage,
}

impl WriteTask {
    pub fn print(message: LogMessage) -> Self {
        Self {
            op: WriteOp::Print,
            message,
        }
    }

    pub fn flush() -> Self {
        Self {
            op: WriteOp::Flush,
            message: LogMessage::new(""),
        }
    }
}

/// Identifies an accepted task. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(NonZeroU64);

impl TaskHandle {
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// The queue refused a task. The task is handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dispatch queue rejected task ({len} of {capacity} slots in use)")]
pub struct Rejected {
    pub task: WriteTask,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded multi-producer, single-consumer task queue.
///
/// Capacity is fixed when the queue is built; it is never resized.
///
/// # Examples
///
/// ```
/// # use rtos_logger::dispatch_queue::{DispatchQueue, WriteTask};
/// # use rtos_logger::LogMessage;
/// let queue = DispatchQueue::new(2);
/// assert!(queue.enqueue(WriteTask::print(LogMessage::new("a"))).is_ok());
/// assert!(queue.enqueue(WriteTask::print(LogMessage::new("b"))).is_ok());
/// assert!(queue.enqueue(WriteTask::print(LogMessage::new("c"))).is_err());
/// ```
pub struct DispatchQueue {
    tasks_tx: Sender<WriteTask>,
    tasks_rx: Receiver<WriteTask>,
    break_tx: Sender<usize>,
    break_rx: Receiver<usize>,
    capacity: usize,
    next_handle: AtomicU64,
}

impl DispatchQueue {
    /// Creates a queue holding at most `capacity` tasks.
    ///
    /// A `capacity` of zero builds a queue that rejects every task.
    pub fn new(capacity: usize) -> Self {
        // A zero-capacity crossbeam channel is a rendezvous channel, which
        // would accept tasks while the consumer is parked in `recv`.
        let (tasks_tx, tasks_rx) = channel::bounded(capacity.max(1));
        let (break_tx, break_rx) = channel::bounded(1);
        Self {
            tasks_tx,
            tasks_rx,
            break_tx,
            break_rx,
            capacity,
            next_handle: AtomicU64::new(1),
        }
    }

    /// Adds `task` to the tail of the queue without blocking.
    pub fn enqueue(&self, task: WriteTask) -> Result<TaskHandle, Rejected> {
        if self.capacity == 0 {
            return Err(self.rejected(task));
        }
        match self.tasks_tx.try_send(task) {
            Ok(()) => {
                let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
                // Starts at 1 and would need 2^64 tasks to wrap.
                let handle = NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN);
                Ok(TaskHandle(handle))
            }
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => {
                let rejected = self.rejected(task);
                trace!(len = rejected.len, capacity = rejected.capacity, "enqueue rejected");
                Err(rejected)
            }
        }
    }

    /// Runs tasks in FIFO order until [`DispatchQueue::break_dispatch`] is
    /// called, blocking while the queue is empty.
    ///
    /// On a break, the tasks that were queued when the break was requested
    /// still run; the loop then returns. Tasks enqueued after the request
    /// stay in the queue.
    pub fn dispatch_forever(&self, mut run: impl FnMut(WriteTask)) {
        loop {
            if let Ok(pending) = self.break_rx.try_recv() {
                self.run_pending(pending, &mut run);
                break;
            }

            channel::select! {
                recv(self.tasks_rx) -> task => match task {
                    Ok(task) => run(task),
                    Err(_) => break,
                },
                recv(self.break_rx) -> pending => {
                    self.run_pending(pending.unwrap_or(0), &mut run);
                    break;
                }
            }
        }
    }

    /// Asks a running (or the next) `dispatch_forever` call to return once
    /// the tasks queued right now have run.
    ///
    /// Does not wait for the consumer.
    pub fn break_dispatch(&self) {
        // A full break channel already holds an earlier, smaller snapshot.
        let _ = self.break_tx.try_send(self.len());
    }

    /// Removes the head task without blocking.
    pub fn try_dequeue(&self) -> Option<WriteTask> {
        self.tasks_rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.tasks_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks_rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn run_pending(&self, pending: usize, run: &mut impl FnMut(WriteTask)) {
        for _ in 0..pending {
            match self.tasks_rx.try_recv() {
                Ok(task) => run(task),
                Err(_) => break,
            }
        }
    }

    fn rejected(&self, task: WriteTask) -> Rejected {
        Rejected {
            task,
            len: self.len(),
            capacity: self.capacity,
        }
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
