//! Error taxonomy shared by every QC computation, and the failure ledger
//! the result assembler reports from.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Chromatography, Polarity};
use crate::table::TableError;

/// Category of an isolated failure, as reported by the result assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A table could not be fetched
    SourceUnavailable,
    /// A table was malformed or did not match its schema
    ParseError,
    /// No library value for a standard or metabolite under the run's method
    ReferenceNotFound,
    /// An identifier was absent from a table being joined against
    JoinMiss,
    /// The caller abandoned the request before the fetch started
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceUnavailable => "SourceUnavailable",
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ReferenceNotFound => "ReferenceNotFound",
            ErrorKind::JoinMiss => "JoinMiss",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Errors raised by a single table load or metric computation.
///
/// Each of these is confined to the computation that produced it; the
/// pipeline records it and carries on with everything else.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QcError {
    /// A table could not be fetched from the store
    #[error("Table '{table}' unavailable: {reason}")]
    SourceUnavailable {
        /// Requested table
        table: String,
        /// Why the store could not supply it
        reason: String,
    },

    /// A table was malformed
    #[error("Failed to parse table '{table}': {detail}")]
    Parse {
        /// Offending table
        table: String,
        /// Parser diagnostic
        detail: String,
    },

    /// Tables that must align (same standards, same samples) do not
    #[error("Schema mismatch in '{table}': {detail}")]
    SchemaMismatch {
        /// Offending table
        table: String,
        /// What did not line up
        detail: String,
    },

    /// No library reference for a name under the run's method and polarity
    #[error("No library reference for '{name}' under {chromatography} ({polarity})")]
    ReferenceNotFound {
        /// Standard or metabolite name
        name: String,
        /// Method of the run
        chromatography: Chromatography,
        /// Polarity of the measurement
        polarity: Polarity,
    },

    /// An identifier was not found in the table it is joined against
    #[error("'{key}' not found in table '{table}'")]
    JoinMiss {
        /// Missing identifier
        key: String,
        /// Table searched
        table: String,
    },

    /// The fetch was abandoned before it started
    #[error("Fetch of '{0}' cancelled")]
    Cancelled(String),
}

impl QcError {
    /// Wrap a table ingestion error
    pub fn parse(table: impl Into<String>, source: &TableError) -> Self {
        QcError::Parse {
            table: table.into(),
            detail: source.to_string(),
        }
    }

    /// Category used in failure reports
    pub fn kind(&self) -> ErrorKind {
        match self {
            QcError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            QcError::Parse { .. } | QcError::SchemaMismatch { .. } => ErrorKind::ParseError,
            QcError::ReferenceNotFound { .. } => ErrorKind::ReferenceNotFound,
            QcError::JoinMiss { .. } => ErrorKind::JoinMiss,
            QcError::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

/// Result alias for isolated computations
pub type QcResult<T> = Result<T, QcError>;

/// One isolated failure, as carried in result envelopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// What failed (a table name or a computation such as `QC01_Pos_5/metrics`)
    pub subject: String,
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
}

impl FailureRecord {
    /// Record `error` against `subject`
    pub fn new(subject: impl Into<String>, error: &QcError) -> Self {
        Self {
            subject: subject.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Collects isolated failures while a result is being assembled.
///
/// Each fallible step goes through [`FailureLedger::take`], which turns an
/// error into an absent value plus a ledger entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureLedger {
    records: Vec<FailureRecord>,
}

impl FailureLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn record(&mut self, subject: impl Into<String>, error: &QcError) {
        let record = FailureRecord::new(subject, error);
        if !self.records.contains(&record) {
            self.records.push(record);
        }
    }

    /// Keep the value of `result`, or record its error and yield `None`
    pub fn take<T>(&mut self, subject: impl Into<String>, result: QcResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.record(subject, &err);
                None
            }
        }
    }

    /// Append every record of another ledger
    pub fn extend(&mut self, other: impl IntoIterator<Item = FailureRecord>) {
        for record in other {
            if !self.records.contains(&record) {
                self.records.push(record);
            }
        }
    }

    /// Recorded failures, in the order they happened
    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    /// Whether anything failed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume into the records
    pub fn into_records(self) -> Vec<FailureRecord> {
        self.records
    }
}

impl IntoIterator for FailureLedger {
    type Item = FailureRecord;
    type IntoIter = std::vec::IntoIter<FailureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_reports_as_parse_error() {
        let err = QcError::SchemaMismatch {
            table: "RUN_001/istd_pos_intensity".to_string(),
            detail: "standards differ".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ParseError);
    }

    #[test]
    fn test_ledger_take() {
        let mut ledger = FailureLedger::new();
        let ok: QcResult<u32> = Ok(3);
        let missing: QcResult<u32> = Err(QcError::JoinMiss {
            key: "QC01_HILIC_Pos_5".to_string(),
            table: "RUN_001/istd_pos_precursor_mz".to_string(),
        });

        assert_eq!(ledger.take("mz", ok), Some(3));
        assert_eq!(ledger.take("mz", missing.clone()), None);
        assert_eq!(ledger.take("mz", missing), None);

        assert_eq!(ledger.records().len(), 1);
        assert_eq!(ledger.records()[0].kind, ErrorKind::JoinMiss);
        assert!(ledger.records()[0].message.contains("QC01_HILIC_Pos_5"));
    }
}
