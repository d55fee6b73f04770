// THEORY:
// Running a neural detector is far more expensive than tracking exposures, so the
// detection stage may be spread over several workers. The tracker, however, must
// see frames strictly in time order: a window closes on the first frame in which
// its target is absent, and an out-of-order frame would close (or reopen) windows
// at the wrong time.
//
// This module runs the expensive stage in parallel and re-serializes the results:
// 1.  **Dispatch**: every submitted frame gets a sequential frame id and is handed
//     round-robin to a worker running on tokio's blocking pool.
// 2.  **Reorder**: finished frames land in a `ReorderBuffer` keyed by frame id.
//     Only the frame the consumer expects next is ever released.
// 3.  **Consume**: `next_ordered` yields results in submission order, so the
//     caller can feed them straight into the single-threaded tracker.

use crate::error::{ExposureError, Result};
use futures::future::join_all;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The expensive, per-frame stage executed by each worker.
pub trait FrameWorker: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn process(&mut self, input: Self::Input) -> Result<Self::Output>;
}

/// Number of workers to use when the caller has no preference.
pub fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

struct FrameTask<I> {
    frame_id: u64,
    input: I,
}

/// Holds results that finished early until every earlier frame has been released.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    pending: HashMap<u64, T>,
    next_expected: u64,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_expected: 0,
        }
    }

    pub fn insert(&mut self, frame_id: u64, item: T) {
        if frame_id < self.next_expected || self.pending.contains_key(&frame_id) {
            warn!(frame_id, "dropping duplicate frame result");
            return;
        }
        self.pending.insert(frame_id, item);
    }

    /// Releases the next frame in order, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(u64, T)> {
        let frame_id = self.next_expected;
        let item = self.pending.remove(&frame_id)?;
        self.next_expected += 1;
        Some((frame_id, item))
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// A pool of detection workers whose results come back in submission order.
///
/// Must be created from within a tokio runtime.
pub struct OrderedWorkerPool<W: FrameWorker> {
    task_sender: Option<mpsc::UnboundedSender<FrameTask<W::Input>>>,
    result_receiver: mpsc::UnboundedReceiver<(u64, Result<W::Output>)>,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    reorder: ReorderBuffer<Result<W::Output>>,
    next_frame_id: u64,
    in_flight: usize,
}

impl<W: FrameWorker> OrderedWorkerPool<W> {
    pub fn new(workers: impl IntoIterator<Item = W>) -> Result<Self> {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask<W::Input>>();
        let (result_sender, result_receiver) = mpsc::unbounded_channel();

        let mut worker_senders = Vec::new();
        let mut handles = Vec::new();
        for mut worker in workers {
            let (worker_sender, mut worker_receiver) = mpsc::unbounded_channel::<FrameTask<W::Input>>();
            let results = result_sender.clone();
            let handle = tokio::task::spawn_blocking(move || {
                // A worker that panicked is never called again; its remaining
                // frames still get a result so the reorder buffer can advance.
                let mut poisoned = false;
                while let Some(task) = worker_receiver.blocking_recv() {
                    let output = if poisoned {
                        Err(ExposureError::Source(format!(
                            "frame {} skipped: detection worker panicked earlier",
                            task.frame_id
                        )))
                    } else {
                        match panic::catch_unwind(AssertUnwindSafe(|| worker.process(task.input))) {
                            Ok(output) => output,
                            Err(payload) => {
                                poisoned = true;
                                let message = panic_message(payload.as_ref());
                                warn!(frame_id = task.frame_id, "detection worker panicked: {message}");
                                Err(ExposureError::Source(format!(
                                    "frame {}: detection worker panicked: {message}",
                                    task.frame_id
                                )))
                            }
                        }
                    };
                    if results.send((task.frame_id, output)).is_err() {
                        break;
                    }
                }
            });
            worker_senders.push(worker_sender);
            handles.push(handle);
        }

        if worker_senders.is_empty() {
            return Err(ExposureError::Configuration(
                "worker pool needs at least one worker".to_owned(),
            ));
        }

        // Spawn dispatcher
        let worker_count = worker_senders.len();
        let dispatcher = tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    break;
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        debug!(workers = worker_count, "ordered worker pool started");

        Ok(Self {
            task_sender: Some(task_sender),
            result_receiver,
            dispatcher,
            workers: handles,
            reorder: ReorderBuffer::new(),
            next_frame_id: 0,
            in_flight: 0,
        })
    }

    /// Queues a frame and returns the id it will be released under.
    pub fn submit(&mut self, input: W::Input) -> Result<u64> {
        let frame_id = self.next_frame_id;
        let sender = self
            .task_sender
            .as_ref()
            .ok_or_else(|| ExposureError::Source("worker pool is shut down".to_owned()))?;
        sender
            .send(FrameTask { frame_id, input })
            .map_err(|_| ExposureError::Source("failed to send frame to worker pool".to_owned()))?;
        self.next_frame_id += 1;
        self.in_flight += 1;
        Ok(frame_id)
    }

    /// Frames submitted but not yet returned by `next_ordered`.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Waits for the oldest outstanding frame. Returns `None` when nothing is in flight.
    pub async fn next_ordered(&mut self) -> Option<(u64, Result<W::Output>)> {
        if self.in_flight == 0 {
            return None;
        }
        loop {
            if let Some(ready) = self.reorder.pop_ready() {
                self.in_flight -= 1;
                return Some(ready);
            }
            match self.result_receiver.recv().await {
                Some((frame_id, output)) => self.reorder.insert(frame_id, output),
                None => {
                    warn!(
                        missing = self.reorder.next_expected(),
                        "worker pool closed with frames outstanding"
                    );
                    self.in_flight = 0;
                    return None;
                }
            }
        }
    }

    /// Stops accepting frames and waits for every worker to exit.
    pub async fn shutdown(mut self) {
        self.task_sender.take();
        let _ = self.dispatcher.await;
        for joined in join_all(self.workers).await {
            if let Err(e) = joined {
                warn!(error = %e, "detection worker terminated abnormally");
            }
        }
    }
}
