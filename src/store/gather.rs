use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use rayon::prelude::*;

use super::{TableRequest, TableStore};
use crate::error::{QcError, QcResult};
use crate::table::Table;

/// Shared flag a caller sets to abandon an in-flight gather.
///
/// Fetches that have not started yet return [`QcError::Cancelled`]; fetches
/// already running complete and are discarded with the result set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of every requested fetch, keyed by request
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<TableRequest, QcResult<Table>>,
}

impl TableSet {
    /// Build from individual results
    pub fn from_results(results: impl IntoIterator<Item = (TableRequest, QcResult<Table>)>) -> Self {
        Self {
            tables: results.into_iter().collect(),
        }
    }

    /// Outcome of one request, if it was part of the gather
    pub fn get(&self, request: &TableRequest) -> Option<&QcResult<Table>> {
        self.tables.get(request)
    }

    /// The table for a request; a request that was never gathered counts as
    /// unavailable
    pub fn table(&self, request: &TableRequest) -> QcResult<&Table> {
        match self.tables.get(request) {
            Some(Ok(table)) => Ok(table),
            Some(Err(err)) => Err(err.clone()),
            None => Err(QcError::SourceUnavailable {
                table: request.table_name(),
                reason: "not requested".to_string(),
            }),
        }
    }

    /// Number of requests
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether nothing was requested
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of tables fetched successfully
    pub fn loaded_count(&self) -> usize {
        self.tables.values().filter(|r| r.is_ok()).count()
    }

    /// Failed requests, sorted by request
    pub fn failures(&self) -> Vec<(&TableRequest, &QcError)> {
        let mut failures: Vec<_> = self
            .tables
            .iter()
            .filter_map(|(request, result)| result.as_ref().err().map(|err| (request, err)))
            .collect();
        failures.sort_by(|a, b| a.0.cmp(b.0));
        failures
    }
}

/// Fetch `requests` concurrently on a pool of at most `workers` threads.
///
/// Each fetch is independent; a failure is kept as that request's result and
/// never stops the others. Results are joined once every task has finished.
pub fn gather(
    store: &dyn TableStore,
    requests: &[TableRequest],
    workers: usize,
    cancel: &CancellationToken,
) -> TableSet {
    let fetch = |request: &TableRequest| -> (TableRequest, QcResult<Table>) {
        let result = if cancel.is_cancelled() {
            Err(QcError::Cancelled(request.table_name()))
        } else {
            debug!("Fetching {}", request);
            store.fetch(request)
        };
        (request.clone(), result)
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("msqc-fetch-{}", i))
        .build();

    let results: Vec<(TableRequest, QcResult<Table>)> = match pool {
        Ok(pool) => pool.install(|| requests.par_iter().map(fetch).collect()),
        Err(err) => {
            warn!("Could not start fetch pool ({}); fetching sequentially", err);
            requests.iter().map(fetch).collect()
        }
    };

    let set = TableSet::from_results(results);
    for (request, err) in set.failures() {
        warn!("{}: {}", request, err);
    }
    debug!("Gathered {}/{} tables", set.loaded_count(), set.len());
    set
}
