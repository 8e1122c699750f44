use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Cell, Column, ColumnType, Table, TableError, TableSchema};

/// Flat key → value map used for scalar metadata (chromatography, thresholds,
/// catalog entries)
pub type ScalarMap = BTreeMap<String, Value>;

/// Order-preserving transport form of a [`Table`]: columns, index labels and
/// row values.
///
/// ```json
/// {"columns": ["Sample", "Methionine d8"], "index": [0], "data": [["QC01_HILIC_Pos_5", 7.55]]}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransportTable {
    /// Column headers, in order
    pub columns: Vec<String>,
    /// Row index labels
    pub index: Vec<usize>,
    /// Row values; `null` marks an absent cell
    pub data: Vec<Vec<Value>>,
}

impl TransportTable {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Table {
    /// Convert to the transport form
    pub fn to_transport(&self) -> TransportTable {
        TransportTable {
            columns: self.column_names().map(str::to_string).collect(),
            index: self.index().to_vec(),
            data: self
                .rows()
                .iter()
                .map(|row| row.iter().map(cell_to_value).collect())
                .collect(),
        }
    }

    /// Rebuild a table from its transport form, typing columns with `schema`.
    ///
    /// Only `null` marks an absent cell; strings are taken as values.
    pub fn from_transport(
        name: &str,
        transport: &TransportTable,
        schema: &TableSchema,
    ) -> Result<Self, TableError> {
        if transport.index.len() != transport.data.len() {
            return Err(TableError::InvalidFormat(format!(
                "{} index labels for {} rows",
                transport.index.len(),
                transport.data.len()
            )));
        }

        let (columns, key) = schema.resolve_header(&transport.columns)?;
        let mut table = Table::new(name, columns, key)?;

        for (row_number, (label, values)) in transport.index.iter().zip(&transport.data).enumerate() {
            if values.len() != transport.columns.len() {
                return Err(TableError::RaggedRow {
                    row: row_number,
                    found: values.len(),
                    expected: transport.columns.len(),
                });
            }
            let row = table
                .columns()
                .iter()
                .zip(values)
                .map(|(column, value)| value_to_cell(column, value, row_number))
                .collect::<Result<Vec<_>, _>>()?;
            table.push_indexed_row(*label, row)?;
        }
        Ok(table)
    }
}

fn cell_to_value(cell: &Option<Cell>) -> Value {
    match cell {
        None => Value::Null,
        Some(Cell::Float(v)) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(cell @ (Cell::Text(_) | Cell::Dual { .. })) => Value::String(cell.to_string()),
    }
}

fn value_to_cell(column: &Column, value: &Value, row: usize) -> Result<Option<Cell>, TableError> {
    let invalid = || TableError::InvalidValue {
        column: column.name.clone(),
        row,
        value: value.to_string(),
        expected: column.dtype,
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match column.dtype {
            ColumnType::Text => Ok(Some(Cell::Text(n.to_string()))),
            ColumnType::Float | ColumnType::Reading => {
                n.as_f64().map(|v| Some(Cell::Float(v))).ok_or_else(invalid)
            }
        },
        Value::String(s) => Cell::parse_present(s, column.dtype).map(Some).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
