//! Bounded-concurrency execution of CPU-bound variant work.
//!
//! Specs are cut into windows of `concurrency` items. A window runs on the
//! blocking pool and is awaited as a whole before the next one starts, so at
//! most `concurrency` encoders hold full-size buffers at any moment. One slow
//! item stalls its whole window.

use futures_util::future::join_all;
use std::sync::Arc;

use crate::error::PipelineError;

/// Default window size.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Runs a closure over a list of items in sequential windows.
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    concurrency: usize,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BatchScheduler {
    /// A window size of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Apply `f` to every item and return the results in input order.
    ///
    /// Fails with the error of the earliest failing item; results of a
    /// failed run are discarded and later windows are not started.
    pub async fn run<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>, PipelineError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Result<R, PipelineError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        let mut pending = items.into_iter().peekable();
        let mut window_index = 0usize;

        while pending.peek().is_some() {
            let window: Vec<T> = pending.by_ref().take(self.concurrency).collect();
            tracing::trace!(
                window = window_index,
                size = window.len(),
                total,
                "Starting batch window"
            );

            let handles = window.into_iter().map(|item| {
                let f = Arc::clone(&f);
                tokio::task::spawn_blocking(move || f(item))
            });

            for joined in join_all(handles).await {
                let result = joined
                    .map_err(|e| PipelineError::Unknown(format!("Batch task failed: {}", e)))?;
                results.push(result?);
            }
            window_index += 1;
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_in_input_order() {
        let scheduler = BatchScheduler::new(3);
        let out = scheduler
            .run((0..10u64).collect(), |n| {
                // later items finish first inside a window
                std::thread::sleep(Duration::from_millis(10 - n));
                Ok(n * 2)
            })
            .await
            .unwrap();
        assert_eq!(out, (0..10u64).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_never_exceeds_window() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (flight, top) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let out = BatchScheduler::new(2)
            .run((0..7).collect(), move |n: i32| {
                let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                top.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(5));
                flight.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            })
            .await
            .unwrap();

        assert_eq!(out.len(), 7);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_first_error_fails_run() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let err = BatchScheduler::new(2)
            .run((0..6).collect(), move |n: i32| {
                counter.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    Err(PipelineError::Encode {
                        variant: format!("{n}"),
                        message: "boom".into(),
                    })
                } else {
                    Ok(n)
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Encode { ref variant, .. } if variant == "1"));
        // only the first window ran
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_and_zero_concurrency() {
        let scheduler = BatchScheduler::new(0);
        assert_eq!(scheduler.concurrency(), 1);
        let out: Vec<i32> = scheduler.run(Vec::new(), |n: i32| Ok(n)).await.unwrap();
        assert!(out.is_empty());
    }
}
