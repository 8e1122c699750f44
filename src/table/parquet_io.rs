use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use super::{Cell, Column, ColumnType, Table, TableError};

/// Hidden column holding the row index labels
pub const INDEX_COLUMN: &str = "__index__";

const META_COLUMN_TYPES: &str = "msqc:column_types";
const META_KEY: &str = "msqc:key";
const META_TABLE: &str = "msqc:table";

impl Table {
    /// Convert to an Arrow record batch.
    ///
    /// Float columns become `Float64`; text and reading columns become `Utf8`
    /// (readings keep their `"value: delta"` form). Declared types, key column
    /// and table name are stored in the schema metadata.
    pub fn to_record_batch(&self) -> Result<RecordBatch, TableError> {
        let mut fields = Vec::with_capacity(self.columns().len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns().len() + 1);

        for (position, column) in self.columns().iter().enumerate() {
            match column.dtype {
                ColumnType::Float => {
                    let values: Vec<Option<f64>> = self
                        .rows()
                        .iter()
                        .map(|row| row[position].as_ref().and_then(Cell::as_f64))
                        .collect();
                    fields.push(Field::new(&column.name, DataType::Float64, true));
                    arrays.push(Arc::new(Float64Array::from(values)));
                }
                ColumnType::Text | ColumnType::Reading => {
                    let values: Vec<Option<String>> = self
                        .rows()
                        .iter()
                        .map(|row| row[position].as_ref().map(|c| c.to_string()))
                        .collect();
                    fields.push(Field::new(&column.name, DataType::Utf8, true));
                    arrays.push(Arc::new(StringArray::from(values)));
                }
            }
        }

        let labels: Vec<u64> = self.index().iter().map(|&i| i as u64).collect();
        fields.push(Field::new(INDEX_COLUMN, DataType::UInt64, false));
        arrays.push(Arc::new(UInt64Array::from(labels)));

        let types: Vec<ColumnType> = self.columns().iter().map(|c| c.dtype).collect();
        let mut metadata = HashMap::new();
        metadata.insert(META_COLUMN_TYPES.to_string(), serde_json::to_string(&types)?);
        metadata.insert(META_KEY.to_string(), self.key_position().to_string());
        metadata.insert(META_TABLE.to_string(), self.name().to_string());

        let schema = Schema::new(fields).with_metadata(metadata);
        Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
    }

    /// Rebuild a table from record batches written by [`Table::to_record_batch`].
    ///
    /// `schema` carries the table metadata; it is passed separately so that a
    /// zero-row file (no batches) still yields its columns.
    pub fn from_record_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Self, TableError> {
        let metadata = schema.metadata();

        let types: Vec<ColumnType> = match metadata.get(META_COLUMN_TYPES) {
            Some(json) => serde_json::from_str(json)?,
            None => {
                return Err(TableError::InvalidFormat(format!(
                    "missing '{}' schema metadata",
                    META_COLUMN_TYPES
                )))
            }
        };
        let key: usize = metadata
            .get(META_KEY)
            .and_then(|k| k.parse().ok())
            .ok_or_else(|| TableError::InvalidFormat(format!("missing '{}' schema metadata", META_KEY)))?;
        let name = metadata.get(META_TABLE).cloned().unwrap_or_default();

        let data_fields: Vec<&Arc<Field>> = schema
            .fields()
            .iter()
            .filter(|f| f.name() != INDEX_COLUMN)
            .collect();
        if data_fields.len() != types.len() {
            return Err(TableError::InvalidFormat(format!(
                "{} columns but {} declared types",
                data_fields.len(),
                types.len()
            )));
        }
        let columns: Vec<Column> = data_fields
            .iter()
            .zip(&types)
            .map(|(field, ty)| Column::new(field.name().clone(), *ty))
            .collect();

        let mut table = Table::new(name, columns, key)?;
        for batch in batches {
            let labels = batch
                .column_by_name(INDEX_COLUMN)
                .ok_or_else(|| TableError::MissingColumn(INDEX_COLUMN.to_string()))?
                .as_any()
                .downcast_ref::<UInt64Array>()
                .ok_or_else(|| TableError::InvalidFormat(format!("{} is not UInt64", INDEX_COLUMN)))?;

            for row_number in 0..batch.num_rows() {
                let mut row = Vec::with_capacity(types.len());
                for column in table.columns() {
                    row.push(read_cell(batch, column, row_number)?);
                }
                table.push_indexed_row(labels.value(row_number) as usize, row)?;
            }
        }
        Ok(table)
    }

    /// Persist the table as a ZSTD-compressed Parquet file
    pub fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let batch = self.to_record_batch()?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
            .build();
        let file = File::create(path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    /// Load a table persisted with [`Table::write_parquet`]
    pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Self::from_record_batches(&schema, &batches)
    }
}

fn read_cell(batch: &RecordBatch, column: &Column, row: usize) -> Result<Option<Cell>, TableError> {
    let array = batch
        .column_by_name(&column.name)
        .ok_or_else(|| TableError::MissingColumn(column.name.clone()))?;
    if array.is_null(row) {
        return Ok(None);
    }

    match column.dtype {
        ColumnType::Float => {
            let values = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| TableError::InvalidFormat(format!("{} is not Float64", column.name)))?;
            Ok(Some(Cell::Float(values.value(row))))
        }
        ColumnType::Text | ColumnType::Reading => {
            let values = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| TableError::InvalidFormat(format!("{} is not Utf8", column.name)))?;
            let raw = values.value(row);
            Cell::parse_present(raw, column.dtype).map(Some).map_err(|_| TableError::InvalidValue {
                column: column.name.clone(),
                row,
                value: raw.to_string(),
                expected: column.dtype,
            })
        }
    }
}
