// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Outcome of one item in a best-effort batch
#[derive(Debug)]
pub struct ItemResult<T, R, E> {
    pub item: T,
    pub outcome: Result<R, E>,
}

/// Per-item results of a best-effort batch, in input order
#[derive(Debug)]
pub struct BatchReport<T, R, E> {
    pub results: Vec<ItemResult<T, R, E>>,
}

impl<T, R, E> Default for BatchReport<T, R, E> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
        }
    }
}

impl<T, R, E> BatchReport<T, R, E> {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&T, &R)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok().map(|value| (&r.item, value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&T, &E)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|error| (&r.item, error)))
    }
}

impl<T, R, E: Display> BatchReport<T, R, E> {
    /// `(label, error message)` pairs for every failed item
    pub fn failure_messages(&self, label: impl Fn(&T) -> String) -> Vec<(String, String)> {
        self.failures()
            .map(|(item, error)| (label(item), error.to_string()))
            .collect()
    }
}

/// Apply `op` to every item in order, one at a time.
///
/// A failing item never stops the batch. `pacing` is slept between
/// consecutive items (not before the first or after the last).
pub async fn apply_each<T, R, E, F, Fut>(
    items: Vec<T>,
    pacing: Duration,
    mut op: F,
) -> BatchReport<T, R, E>
where
    T: Clone,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut report = BatchReport {
        results: Vec::with_capacity(items.len()),
    };

    for (index, item) in items.into_iter().enumerate() {
        if index > 0 && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
        let outcome = op(item.clone()).await;
        report.results.push(ItemResult { item, outcome });
    }

    report
}
