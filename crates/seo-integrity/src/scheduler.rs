//! Bounded-concurrency work scheduler with cooperative stop.
//!
//! `concurrency` worker loops share one FIFO queue and run interleaved on
//! the calling task (no threads are spawned). Each loop checks the stop
//! predicate before every dequeue; when it fires, the loop empties the queue
//! so the other workers see it drained at their next check, then exits.
//! An item that was already dequeued always runs to completion.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::progress::{NoopObserver, ProgressEvent, ProgressObserver};

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { concurrency: 3 }
    }
}

/// What happened during one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerReport {
    pub total: usize,
    pub completed: usize,
    /// Items removed from the queue unprocessed because of a stop.
    pub drained: usize,
    pub stopped: bool,
}

/// Runs queued items through an async processor, at most `concurrency` at
/// a time.
#[derive(Clone)]
pub struct BoundedConcurrencyScheduler {
    concurrency: usize,
    observer: Arc<dyn ProgressObserver>,
}

impl BoundedConcurrencyScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.concurrency)
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every item exactly once unless `should_stop` fires first.
    pub async fn run<T, P, Fut, S>(
        &self,
        items: impl IntoIterator<Item = T>,
        processor: P,
        should_stop: S,
    ) -> SchedulerReport
    where
        P: Fn(T) -> Fut,
        Fut: Future<Output = ()>,
        S: Fn() -> bool,
    {
        let queue: Mutex<VecDeque<T>> = Mutex::new(items.into_iter().collect());
        let total = lock(&queue).len();
        let completed = AtomicUsize::new(0);
        let drained = AtomicUsize::new(0);
        let stopped = AtomicBool::new(false);

        let queue = &queue;
        let completed = &completed;
        let drained = &drained;
        let stopped = &stopped;
        let processor = &processor;
        let should_stop = &should_stop;
        let observer = self.observer.as_ref();

        let workers = (0..self.concurrency).map(|worker| async move {
            loop {
                if should_stop() {
                    // Drain under the same lock the next dequeue takes.
                    let removed = {
                        let mut q = lock(queue);
                        let n = q.len();
                        q.clear();
                        n
                    };
                    drained.fetch_add(removed, Ordering::SeqCst);
                    if !stopped.swap(true, Ordering::SeqCst) {
                        tracing::info!(worker, removed, "stop requested, queue drained");
                    }
                    break;
                }

                let next = lock(queue).pop_front();
                let Some(item) = next else {
                    break;
                };

                processor(item).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                observer.on_event(&ProgressEvent::ItemCompleted {
                    completed: done,
                    total,
                });
            }
        });

        join_all(workers).await;

        let report = SchedulerReport {
            total,
            completed: completed.load(Ordering::SeqCst),
            drained: drained.load(Ordering::SeqCst),
            stopped: stopped.load(Ordering::SeqCst),
        };
        if report.stopped {
            observer.on_event(&ProgressEvent::SchedulerStopped {
                completed: report.completed,
                drained: report.drained,
            });
        }
        tracing::debug!(
            total = report.total,
            completed = report.completed,
            drained = report.drained,
            "scheduler finished"
        );
        report
    }
}

/// Run `items` through `processor` with `concurrency` workers.
pub async fn run_bounded<T, P, Fut, S>(
    items: impl IntoIterator<Item = T>,
    processor: P,
    concurrency: usize,
    observer: Arc<dyn ProgressObserver>,
    should_stop: S,
) -> SchedulerReport
where
    P: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
    S: Fn() -> bool,
{
    BoundedConcurrencyScheduler::new(concurrency)
        .with_observer(observer)
        .run(items, processor, should_stop)
        .await
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
