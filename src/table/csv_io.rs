use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use log::debug;

use super::{Cell, Table, TableError, TableSchema};

impl Table {
    /// Load a table from a CSV file
    pub fn from_csv_path<P: AsRef<Path>>(
        path: P,
        name: &str,
        schema: &TableSchema,
    ) -> Result<Self, TableError> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file), name, schema)
    }

    /// Parse a table from CSV.
    ///
    /// Lines before the header (vendor preambles such as `Bracket Type=4`) are
    /// skipped: the header is the first record containing a key column alias.
    /// Blank records are ignored; short records are padded with absent cells.
    pub fn from_csv_reader<R: Read>(
        reader: R,
        name: &str,
        schema: &TableSchema,
    ) -> Result<Self, TableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();
        let mut skipped = 0usize;
        let headers: Vec<String> = loop {
            let record = match records.next() {
                Some(record) => record?,
                None => {
                    return Err(TableError::MissingColumn(schema.key_aliases.join(" | ")));
                }
            };
            let fields: Vec<String> = record.iter().map(|f| f.trim().to_string()).collect();
            if fields.iter().any(|f| schema.is_key_alias(f)) {
                break fields;
            }
            skipped += 1;
        };
        if skipped > 0 {
            debug!("{}: skipped {} preamble line(s) before header", name, skipped);
        }

        let (columns, key) = schema.resolve_header(&headers)?;
        let mut table = Table::new(name, columns, key)?;

        for (row_number, record) in records.enumerate() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if record.len() > headers.len() {
                return Err(TableError::RaggedRow {
                    row: row_number,
                    found: record.len(),
                    expected: headers.len(),
                });
            }

            let mut row = Vec::with_capacity(headers.len());
            for (position, column) in table.columns().iter().enumerate() {
                let raw = record.get(position).unwrap_or("");
                let cell = Cell::parse(raw, column.dtype).map_err(|_| TableError::InvalidValue {
                    column: column.name.clone(),
                    row: row_number,
                    value: raw.to_string(),
                    expected: column.dtype,
                })?;
                row.push(cell);
            }
            table.push_indexed_row(row_number, row)?;
        }

        Ok(table)
    }

    /// Write the table as CSV (header row first, absent cells empty)
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.column_names())?;
        for row in self.rows() {
            csv_writer.write_record(
                row.iter()
                    .map(|cell| cell.as_ref().map(|c| c.to_string()).unwrap_or_default()),
            )?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let file = File::create(path)?;
        self.to_csv_writer(file)
    }
}
