use std::collections::HashMap;

use super::{TableRequest, TableStore};
use crate::error::{QcError, QcResult};
use crate::model::InstrumentRun;
use crate::table::Table;

/// In-process table store.
///
/// Populate it with `&mut` access, then share it read-only. Failures can be
/// registered for a request to simulate a broken source.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    runs: HashMap<String, InstrumentRun>,
    tables: HashMap<TableRequest, QcResult<Table>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run record
    pub fn insert_run(&mut self, run: InstrumentRun) {
        self.runs.insert(run.run_id.clone(), run);
    }

    /// Register a table
    pub fn insert(&mut self, request: TableRequest, table: Table) {
        let name = request.table_name();
        self.tables.insert(request, Ok(table.with_name(name)));
    }

    /// Make a request fail with `error`
    pub fn insert_failure(&mut self, request: TableRequest, error: QcError) {
        self.tables.insert(request, Err(error));
    }
}

impl TableStore for MemoryStore {
    fn fetch(&self, request: &TableRequest) -> QcResult<Table> {
        match self.tables.get(request) {
            Some(result) => result.clone(),
            None => Err(QcError::SourceUnavailable {
                table: request.table_name(),
                reason: "no such table".to_string(),
            }),
        }
    }

    fn load_run(&self, run_id: &str) -> QcResult<InstrumentRun> {
        self.runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| QcError::SourceUnavailable {
                table: format!("{}/run", run_id),
                reason: "no such run".to_string(),
            })
    }

    fn run_ids(&self) -> QcResult<Vec<String>> {
        Ok(self.runs.keys().cloned().collect())
    }
}
