use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, warn};

use crate::dispatch_queue::DispatchQueue;
use crate::serial_writer::SerialWriter;

/// Name given to the consumer thread.
pub const CONSUMER_THREAD_NAME: &str = "RTOS_Logger";

/// Smallest stack handed to the consumer thread on hosted targets.
pub const MIN_STACK_SIZE: usize = 32 * 1024;

/// The single thread that drains the dispatch queue into the device.
///
/// Dropping the context (or calling [`ConsumerContext::stop`]) asks the
/// dispatch loop to break and joins the thread. Tasks queued before the
/// break still run first; tasks enqueued afterwards are left behind.
#[derive(Debug)]
pub struct ConsumerContext {
    queue: Arc<DispatchQueue>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl ConsumerContext {
    /// Spawns the consumer with the requested stack size in bytes.
    ///
    /// Requests below [`MIN_STACK_SIZE`] are raised to it, and the platform
    /// may round up further.
    pub fn spawn(
        queue: Arc<DispatchQueue>,
        writer: SerialWriter,
        stack_size: usize,
    ) -> io::Result<Self> {
        let dispatch_queue = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name(CONSUMER_THREAD_NAME.to_string())
            .stack_size(stack_size.max(MIN_STACK_SIZE))
            .spawn(move || {
                dispatch_queue.dispatch_forever(|task| writer.execute(task));
                debug!("logger consumer loop exited");
            })?;
        let thread_id = thread.thread().id();

        Ok(Self {
            queue,
            thread: Some(thread),
            thread_id,
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Breaks the dispatch loop and waits for the already queued tasks to run.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.queue.break_dispatch();
        if thread.join().is_err() {
            warn!("logger consumer thread panicked");
        }
    }
}

impl Drop for ConsumerContext {
    fn drop(&mut self) {
        self.stop();
    }
}
