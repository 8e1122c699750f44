use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Column, Table, TableError};

/// Declared scalar type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Floating point reading
    Float,
    /// Free text (identifiers, annotations)
    Text,
    /// A float, or a dual `"value: delta"` reading
    Reading,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Float => write!(f, "float"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Reading => write!(f, "reading"),
        }
    }
}

/// Ingestion contract for one kind of table.
///
/// A schema names the identity (key) column, the columns that must be present,
/// and the declared type of every other column. Headers are validated once,
/// when the table is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Accepted names for the key column, in order of preference
    pub key_aliases: Vec<String>,
    /// Columns that must be present besides the key
    pub required: Vec<String>,
    /// Type of columns not listed in `overrides`
    pub value_type: ColumnType,
    /// Per-column type declarations
    pub overrides: Vec<(String, ColumnType)>,
}

/// Sequence table columns
pub mod sequence_columns {
    /// Acquired raw file name (join key)
    pub const FILE_NAME: &str = "File Name";
    /// Study identifier
    pub const STUDY: &str = "L1 Study";
    /// Autosampler position
    pub const POSITION: &str = "Position";
    /// Injection volume
    pub const INJECTION_VOLUME: &str = "Inj Vol";
    /// Instrument method path
    pub const INSTRUMENT_METHOD: &str = "Instrument Method";
}

/// Metadata table columns
pub mod metadata_columns {
    /// Sample file name (join key)
    pub const FILENAME: &str = "Filename";
    /// Species
    pub const SPECIES: &str = "Species";
    /// Sample matrix
    pub const MATRIX: &str = "Matrix";
    /// Growth and harvest conditions
    pub const GROWTH_HARVEST: &str = "Growth-Harvest Conditions";
    /// Treatment
    pub const TREATMENT: &str = "Treatment";
}

impl TableSchema {
    /// Internal-standard measurement table (`Sample`/`Title` × standard)
    pub fn measurement() -> Self {
        Self {
            key_aliases: vec!["Sample".to_string(), "Title".to_string()],
            required: Vec::new(),
            value_type: ColumnType::Reading,
            overrides: Vec::new(),
        }
    }

    /// Warnings / Fails annotation table (`Sample`/`Title` × standard, text cells)
    pub fn annotations() -> Self {
        Self {
            value_type: ColumnType::Text,
            ..Self::measurement()
        }
    }

    /// Biological standard table (`Name`/`Title` × metabolite)
    pub fn biological_standard() -> Self {
        Self {
            key_aliases: vec!["Name".to_string(), "Title".to_string()],
            required: Vec::new(),
            value_type: ColumnType::Reading,
            overrides: Vec::new(),
        }
    }

    /// Biological standard Warnings / Fails table
    pub fn biological_standard_annotations() -> Self {
        Self {
            value_type: ColumnType::Text,
            ..Self::biological_standard()
        }
    }

    /// Acquisition sequence table
    pub fn sequence() -> Self {
        use sequence_columns::*;
        Self {
            key_aliases: vec![FILE_NAME.to_string()],
            required: vec![
                STUDY.to_string(),
                POSITION.to_string(),
                INJECTION_VOLUME.to_string(),
                INSTRUMENT_METHOD.to_string(),
            ],
            value_type: ColumnType::Text,
            overrides: vec![(INJECTION_VOLUME.to_string(), ColumnType::Float)],
        }
    }

    /// Sample metadata table
    pub fn metadata() -> Self {
        use metadata_columns::*;
        Self {
            key_aliases: vec![FILENAME.to_string()],
            required: vec![
                SPECIES.to_string(),
                MATRIX.to_string(),
                GROWTH_HARVEST.to_string(),
                TREATMENT.to_string(),
            ],
            value_type: ColumnType::Text,
            overrides: Vec::new(),
        }
    }

    /// Sample information projection (`Sample` × sequence and metadata fields)
    pub fn sample_info() -> Self {
        Self {
            key_aliases: vec!["Sample".to_string()],
            required: Vec::new(),
            value_type: ColumnType::Text,
            overrides: vec![(sequence_columns::INJECTION_VOLUME.to_string(), ColumnType::Float)],
        }
    }

    /// Cross-run benchmark table (`Name` = run id × metabolite, float cells)
    pub fn benchmark_series() -> Self {
        Self {
            value_type: ColumnType::Float,
            ..Self::biological_standard()
        }
    }

    /// Declared type of a column; key columns are always text
    pub fn column_type(&self, name: &str) -> ColumnType {
        if self.is_key_alias(name) {
            return ColumnType::Text;
        }
        self.overrides
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, ty)| *ty)
            .unwrap_or(self.value_type)
    }

    /// Whether `name` is one of the accepted key column names
    pub fn is_key_alias(&self, name: &str) -> bool {
        self.key_aliases.iter().any(|alias| alias == name)
    }

    /// Check an already typed table (e.g. one read from Parquet) against this
    /// schema: key column, required columns and declared column types.
    pub fn validate(&self, table: &Table) -> Result<(), TableError> {
        if !self.is_key_alias(table.key_column()) {
            return Err(TableError::MissingColumn(self.key_aliases.join(" | ")));
        }
        for required in &self.required {
            if table.column_index(required).is_none() {
                return Err(TableError::MissingColumn(required.clone()));
            }
        }
        for column in table.columns() {
            let expected = self.column_type(&column.name);
            if column.dtype != expected {
                return Err(TableError::TypeMismatch {
                    column: column.name.clone(),
                    found: column.dtype,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Resolve a header row into typed columns and the key column position.
    pub fn resolve_header(&self, headers: &[String]) -> Result<(Vec<Column>, usize), TableError> {
        let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
        for name in headers {
            if columns.iter().any(|c| &c.name == name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
            columns.push(Column::new(name.clone(), self.column_type(name)));
        }

        let key = self
            .key_aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
            .ok_or_else(|| TableError::MissingColumn(self.key_aliases.join(" | ")))?;

        for required in &self.required {
            if !headers.iter().any(|h| h == required) {
                return Err(TableError::MissingColumn(required.clone()));
            }
        }

        Ok((columns, key))
    }
}
