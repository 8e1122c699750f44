//! # Table Loader
//!
//! Boundary between msqc and whatever holds the raw tables of a run. The core
//! only ever asks a [`TableStore`] for one table at a time, read-only, and
//! treats every fetch as fallible on its own.
//!
//! Two stores ship with the crate:
//!
//! - [`DirectoryStore`]: CSV or Parquet files under an explicit root path
//! - [`MemoryStore`]: in-process tables, mostly for tests and embedding
//!
//! [`gather`] fetches many tables concurrently on a bounded worker pool.

mod directory;
mod gather;
mod memory;


use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalog::Polarity;
use crate::error::QcResult;
use crate::model::InstrumentRun;
use crate::table::{Table, TableSchema};

pub use directory::{DirectoryStore, StoreFormat};
pub use gather::{gather, CancellationToken, TableSet};
pub use memory::MemoryStore;

/// Kind of per-standard result held in a measurement table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResultType {
    /// Precursor m/z
    #[serde(rename = "precursor_mz")]
    PrecursorMz,
    /// Retention time
    #[serde(rename = "retention_time")]
    RetentionTime,
    /// Peak intensity
    #[serde(rename = "intensity")]
    Intensity,
    /// Retention time delta versus library
    #[serde(rename = "Delta RT")]
    DeltaRt,
    /// Retention time delta versus the in-run reference
    #[serde(rename = "In-run delta RT")]
    InRunDeltaRt,
    /// Precursor m/z delta versus library
    #[serde(rename = "Delta m/z")]
    DeltaMz,
    /// Warning annotations
    #[serde(rename = "Warnings")]
    Warnings,
    /// Fail annotations
    #[serde(rename = "Fails")]
    Fails,
}

impl ResultType {
    /// Every result type, in fetch order
    pub const ALL: [ResultType; 8] = [
        ResultType::PrecursorMz,
        ResultType::RetentionTime,
        ResultType::Intensity,
        ResultType::DeltaRt,
        ResultType::InRunDeltaRt,
        ResultType::DeltaMz,
        ResultType::Warnings,
        ResultType::Fails,
    ];

    /// Name used by the table store
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::PrecursorMz => "precursor_mz",
            ResultType::RetentionTime => "retention_time",
            ResultType::Intensity => "intensity",
            ResultType::DeltaRt => "Delta RT",
            ResultType::InRunDeltaRt => "In-run delta RT",
            ResultType::DeltaMz => "Delta m/z",
            ResultType::Warnings => "Warnings",
            ResultType::Fails => "Fails",
        }
    }

    /// Snake-case name used in file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            ResultType::PrecursorMz => "precursor_mz",
            ResultType::RetentionTime => "retention_time",
            ResultType::Intensity => "intensity",
            ResultType::DeltaRt => "delta_rt",
            ResultType::InRunDeltaRt => "in_run_delta_rt",
            ResultType::DeltaMz => "delta_mz",
            ResultType::Warnings => "warnings",
            ResultType::Fails => "fails",
        }
    }

    /// Warnings and Fails hold text, not readings
    pub fn is_annotation(&self) -> bool {
        matches!(self, ResultType::Warnings | ResultType::Fails)
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which table of a run is requested
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableKind {
    /// Acquisition sequence
    Sequence,
    /// Sample metadata
    Metadata,
    /// Sample × internal standard results
    InternalStandard {
        /// Ionization mode
        polarity: Polarity,
        /// Result type
        result: ResultType,
    },
    /// Run × targeted metabolite results of a biological standard
    BiologicalStandard {
        /// Biological standard name
        standard: String,
        /// Ionization mode
        polarity: Polarity,
        /// Result type
        result: ResultType,
    },
}

impl TableKind {
    /// Ingestion schema for this kind of table
    pub fn schema(&self) -> TableSchema {
        match self {
            TableKind::Sequence => TableSchema::sequence(),
            TableKind::Metadata => TableSchema::metadata(),
            TableKind::InternalStandard { result, .. } if result.is_annotation() => {
                TableSchema::annotations()
            }
            TableKind::InternalStandard { .. } => TableSchema::measurement(),
            TableKind::BiologicalStandard { result, .. } if result.is_annotation() => {
                TableSchema::biological_standard_annotations()
            }
            TableKind::BiologicalStandard { .. } => TableSchema::biological_standard(),
        }
    }

    /// File stem, e.g. `istd_pos_retention_time` or `bio_urine_neg_intensity`
    pub fn file_stem(&self) -> String {
        match self {
            TableKind::Sequence => "sequence".to_string(),
            TableKind::Metadata => "metadata".to_string(),
            TableKind::InternalStandard { polarity, result } => {
                format!("istd_{}_{}", polarity, result.file_stem())
            }
            TableKind::BiologicalStandard {
                standard,
                polarity,
                result,
            } => format!("bio_{}_{}_{}", slug(standard), polarity, result.file_stem()),
        }
    }
}

fn slug(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// One table of one run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRequest {
    /// Run the table belongs to
    pub run_id: String,
    /// Table within the run
    pub kind: TableKind,
}

impl TableRequest {
    /// Request a table of a run
    pub fn new(run_id: impl Into<String>, kind: TableKind) -> Self {
        Self {
            run_id: run_id.into(),
            kind,
        }
    }

    /// Sequence table of a run
    pub fn sequence(run_id: &str) -> Self {
        Self::new(run_id, TableKind::Sequence)
    }

    /// Metadata table of a run
    pub fn metadata(run_id: &str) -> Self {
        Self::new(run_id, TableKind::Metadata)
    }

    /// Internal standard result table of a run
    pub fn internal_standard(run_id: &str, polarity: Polarity, result: ResultType) -> Self {
        Self::new(run_id, TableKind::InternalStandard { polarity, result })
    }

    /// Biological standard result table of a run
    pub fn biological_standard(
        run_id: &str,
        standard: &str,
        polarity: Polarity,
        result: ResultType,
    ) -> Self {
        Self::new(
            run_id,
            TableKind::BiologicalStandard {
                standard: standard.to_string(),
                polarity,
                result,
            },
        )
    }

    /// Table name used in logs, errors and failure reports
    pub fn table_name(&self) -> String {
        format!("{}/{}", self.run_id, self.kind.file_stem())
    }
}

impl fmt::Display for TableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table_name())
    }
}

/// Read-only source of run tables.
///
/// Implementations own their locking; every method may be called from several
/// worker threads at once.
pub trait TableStore: Send + Sync {
    /// Fetch and parse one table
    fn fetch(&self, request: &TableRequest) -> QcResult<Table>;

    /// Load the run record
    fn load_run(&self, run_id: &str) -> QcResult<InstrumentRun>;

    /// Identifiers of every run record in the store
    fn run_ids(&self) -> QcResult<Vec<String>>;

    /// All readable runs in the store, oldest first.
    ///
    /// A run record that fails to load is skipped with a warning.
    fn list_runs(&self) -> QcResult<Vec<InstrumentRun>> {
        let mut runs = Vec::new();
        for run_id in self.run_ids()? {
            match self.load_run(&run_id) {
                Ok(run) => runs.push(run),
                Err(err) => warn!("Skipping run {}: {}", run_id, err),
            }
        }
        sort_runs(&mut runs);
        Ok(runs)
    }
}

/// Order runs oldest first: by start time when known, then by run id
pub fn sort_runs(runs: &mut [InstrumentRun]) {
    runs.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
}
