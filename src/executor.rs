//! Bounded-concurrency runner for bulk remote work.
//!
//! Items run as cooperative futures on the caller's task through
//! `buffer_unordered`, so at most `concurrency` are in flight. Each item's
//! result is captured on its own; one failure never cancels its siblings.

use std::future::Future;

use futures::stream::{self, StreamExt};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::ExecutorSettings;
use crate::error::Result;

/// Result of a single work item, tagged with its key.
#[derive(Debug)]
pub struct ItemOutcome<K, T> {
    pub key: K,
    pub result: Result<T>,
}

impl<K, T> ItemOutcome<K, T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundedExecutor {
    settings: ExecutorSettings,
}

impl BoundedExecutor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run every item in one pool capped at `concurrency`.
    ///
    /// `observe` sees each outcome as it settles (completion order).
    pub async fn run_all<I, K, T, KF, F, Fut, O>(
        &self,
        items: Vec<I>,
        key: KF,
        action: F,
        mut observe: O,
    ) -> Vec<ItemOutcome<K, T>>
    where
        KF: Fn(&I) -> K,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(&ItemOutcome<K, T>),
    {
        self.run_pool(items, &key, &action, &mut observe).await
    }

    /// Run items in batches of `batch_size`, pausing `batch_pause` between
    /// batches. A batch starts only after the previous one fully settled.
    pub async fn run_batched<I, K, T, KF, F, Fut, O>(
        &self,
        items: Vec<I>,
        key: KF,
        action: F,
        mut observe: O,
    ) -> Vec<ItemOutcome<K, T>>
    where
        KF: Fn(&I) -> K,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(&ItemOutcome<K, T>),
    {
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = items.len().div_ceil(batch_size);
        let mut outcomes = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter();

        for batch_no in 1..=total_batches {
            let batch: Vec<I> = remaining.by_ref().take(batch_size).collect();
            if batch_no > 1 && !self.settings.batch_pause.is_zero() {
                info!(
                    "Pausing {:.1}s before batch {}/{}",
                    self.settings.batch_pause.as_secs_f64(),
                    batch_no,
                    total_batches
                );
                sleep(self.settings.batch_pause).await;
            }

            debug!(batch = batch_no, size = batch.len(), "Starting batch");
            let settled = self.run_pool(batch, &key, &action, &mut observe).await;
            outcomes.extend(settled);
        }

        outcomes
    }

    async fn run_pool<I, K, T, KF, F, Fut, O>(
        &self,
        items: Vec<I>,
        key: &KF,
        action: &F,
        observe: &mut O,
    ) -> Vec<ItemOutcome<K, T>>
    where
        KF: Fn(&I) -> K,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T>>,
        O: FnMut(&ItemOutcome<K, T>),
    {
        let concurrency = self.settings.concurrency.max(1);
        let mut outcomes = Vec::with_capacity(items.len());

        let mut pending = stream::iter(items.into_iter().map(|item| {
            let key = key(&item);
            let work = action(item);
            async move {
                ItemOutcome {
                    key,
                    result: work.await,
                }
            }
        }))
        .buffer_unordered(concurrency);

        while let Some(outcome) = pending.next().await {
            observe(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }
}
