use std::future::Future;

use futures::stream::{self, StreamExt};
use tracing::info;

/// Progress is logged every this many completed tasks
const PROGRESS_EVERY: usize = 10;

/// Probe scheduler - drives a queue of probe tasks under a concurrency ceiling.
///
/// Tasks run interleaved on the caller's task. At most `limit` are unresolved
/// at any time; as one finishes the next queued task is admitted. A task's
/// outcome never stops the queue from draining.
#[derive(Debug, Clone, Copy)]
pub struct ProbeScheduler {
    limit: usize,
}

impl ProbeScheduler {
    /// Create a scheduler; a limit of zero is treated as one
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run every task to completion, returning outputs in completion order.
    ///
    /// `passed` picks the outputs counted as passes in the progress log.
    pub async fn run<I, F, T, P>(&self, tasks: I, passed: P) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: ExactSizeIterator,
        F: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let tasks = tasks.into_iter();
        let total = tasks.len();
        let mut finished = 0;
        let mut passes = 0;
        let mut outputs = Vec::with_capacity(total);

        let mut running = stream::iter(tasks).buffer_unordered(self.limit);
        while let Some(output) = running.next().await {
            finished += 1;
            if passed(&output) {
                passes += 1;
            }
            if finished % PROGRESS_EVERY == 0 || finished == total {
                info!("Progress: {}/{} ({} passed)", finished, total, passes);
            }
            outputs.push(output);
        }

        outputs
    }
}
