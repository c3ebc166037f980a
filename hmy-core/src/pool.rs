// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{collections::VecDeque, ops::Range, thread};

use parking_lot::Mutex;

use crate::error::{HarnessError, HarnessResult};

/// A fixed number of threads draining a queue of index ranges. `run` returns only
/// once every range has been processed.
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Split `0..len` into at most `workers` contiguous ranges of `ceil(len / workers)`
    /// items each. Empty ranges are dropped.
    pub fn partition(&self, len: usize) -> Vec<Range<usize>> {
        if len == 0 {
            return Vec::new();
        }
        let step = (len + self.workers - 1) / self.workers;
        (0..self.workers)
            .map(|i| (i * step).min(len)..((i + 1) * step).min(len))
            .filter(|range| !range.is_empty())
            .collect()
    }

    /// Run `task` on every range. Results come back in the order of `ranges`. A panicking
    /// task only loses its own range: the worker stops and the others drain the queue.
    pub fn run<T, F>(&self, ranges: Vec<Range<usize>>, task: F) -> HarnessResult<Vec<T>>
    where
        T: Send,
        F: Fn(Range<usize>) -> T + Sync,
    {
        let total = ranges.len();
        let queue = Mutex::new(ranges.into_iter().enumerate().collect::<VecDeque<_>>());
        let done = Mutex::new(Vec::with_capacity(total));
        let workers = self.workers.min(total);

        thread::scope(|scope| -> HarnessResult<()> {
            let mut handles = Vec::with_capacity(workers);
            for i in 0..workers {
                let (queue, done, task) = (&queue, &done, &task);
                let handle = thread::Builder::new()
                    .name(format!("hmy-worker-{i}"))
                    .spawn_scoped(scope, move || loop {
                        let Some((index, range)) = queue.lock().pop_front() else {
                            break;
                        };
                        tracing::debug!("Worker {i} processing {range:?}");
                        let result = task(range);
                        done.lock().push((index, result));
                    })
                    .map_err(|e| HarnessError::Worker(format!("failed to spawn worker: {e}")))?;
                handles.push(handle);
            }

            // Join every handle so no panic escapes the scope.
            for (i, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    tracing::error!("Worker {i} panicked, its current range is dropped");
                }
            }
            Ok(())
        })?;

        let mut results = done.into_inner();
        if results.len() < total {
            tracing::warn!("{} of {total} ranges did not complete", total - results.len());
        }
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}
