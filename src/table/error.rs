use super::ColumnType;

/// Errors that can occur while ingesting, converting or persisting a table
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// I/O error reading or writing a table file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    /// Arrow error while building or reading record batches
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Required column absent from the header
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The same column name appears twice in the header
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// A cell could not be read as the declared column type
    #[error("Invalid value {value:?} in column '{column}' (row {row}): expected {expected}")]
    InvalidValue {
        /// Column holding the bad cell
        column: String,
        /// Zero-based data row
        row: usize,
        /// Raw cell text
        value: String,
        /// Declared column type
        expected: ColumnType,
    },

    /// A row does not match the header width
    #[error("Row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        /// Zero-based data row
        row: usize,
        /// Number of cells found
        found: usize,
        /// Number of columns in the header
        expected: usize,
    },

    /// A column was stored with a type other than the one declared for it
    #[error("Column '{column}' is {found}, expected {expected}")]
    TypeMismatch {
        /// Offending column
        column: String,
        /// Stored type
        found: ColumnType,
        /// Declared type
        expected: ColumnType,
    },

    /// Structurally invalid table
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
