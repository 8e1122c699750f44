//! # Sample Matcher
//!
//! Reconciles sample identifiers across the acquisition sequence, the sample
//! metadata and the measurement tables. All joins are exact string equality on
//! the file name; there is no fuzzy or case-insensitive matching.

use log::debug;

use crate::catalog::Polarity;
use crate::model::Sample;
use crate::table::{
    metadata_columns, sequence_columns, Cell, Column, ColumnType, Row, Table, TableError, TableSchema,
};

/// Key column of a sample information projection
pub const SAMPLE_COLUMN: &str = "Sample";

/// Strip a trailing `": <marker>"` suffix (e.g. `": RT Info"`) that some
/// exports append to sample identifiers.
pub fn strip_marker(sample_id: &str) -> &str {
    match sample_id.split_once(": ") {
        Some((id, _)) => id.trim_end(),
        None => sample_id.trim_end(),
    }
}

/// Trailing run of ASCII digits of an identifier, e.g. `QC01_HILIC_Pos_5` → 5
pub fn numeric_suffix(sample_id: &str) -> Option<u64> {
    let id = strip_marker(sample_id);
    let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    id[id.len() - digits..].parse().ok()
}

/// Order identifiers by numeric suffix, descending.
///
/// Ties keep their original order; identifiers without a numeric suffix
/// follow all numbered ones.
pub fn order_samples<S: AsRef<str>>(sample_ids: &[S]) -> Vec<String> {
    let mut keyed: Vec<(Option<u64>, &str)> = sample_ids
        .iter()
        .map(|id| (numeric_suffix(id.as_ref()), id.as_ref()))
        .collect();
    keyed.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    keyed.into_iter().map(|(_, id)| id.to_string()).collect()
}

/// Row of a measurement table for `sample_id`.
///
/// Tries the exact key first, then keys with their marker stripped.
pub fn find_sample_row<'t>(table: &'t Table, sample_id: &str) -> Option<&'t Row> {
    if let Some(row) = table.find_row(sample_id) {
        return Some(row);
    }
    let key = table.key_position();
    table
        .rows()
        .iter()
        .find(|row| matches!(&row[key], Some(Cell::Text(k)) if strip_marker(k) == sample_id))
}

/// Concatenate sample lists (e.g. from the positive and negative tables),
/// stripping markers and dropping repeats.
pub fn concat_sample_lists<S: AsRef<str>>(lists: &[Vec<S>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in lists.iter().flatten() {
        let id = strip_marker(id.as_ref());
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}

/// Single-row projection of everything the sequence and metadata tables know
/// about one sample.
///
/// A source with no matching row contributes no fields; when neither matches
/// the projection is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfo {
    /// Requested sample identifier
    pub sample_id: String,
    /// Matched fields, sequence columns first, then metadata columns
    pub fields: Vec<(String, Option<Cell>)>,
    /// Whether the sequence table had a matching row
    pub in_sequence: bool,
    /// Whether the metadata table had a matching row
    pub in_metadata: bool,
}

impl SampleInfo {
    /// Whether no source matched
    pub fn is_empty(&self) -> bool {
        !self.in_sequence && !self.in_metadata
    }

    /// Field value by column name
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, cell)| cell.as_ref())
    }

    /// As a table: one row when anything matched, zero rows otherwise
    pub fn to_table(&self) -> Result<Table, TableError> {
        let schema = TableSchema::sample_info();
        let mut columns = vec![Column::new(SAMPLE_COLUMN, ColumnType::Text)];
        columns.extend(
            self.fields
                .iter()
                .map(|(name, _)| Column::new(name.clone(), schema.column_type(name))),
        );

        let mut table = Table::new("sample_info", columns, 0)?;
        if !self.is_empty() {
            let mut row = vec![Some(Cell::Text(self.sample_id.clone()))];
            row.extend(self.fields.iter().map(|(_, cell)| cell.clone()));
            table.push_row(row)?;
        }
        Ok(table)
    }
}

/// Joins measurement-table sample ids against the sequence and metadata tables
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleMatcher<'a> {
    sequence: Option<&'a Table>,
    metadata: Option<&'a Table>,
}

impl<'a> SampleMatcher<'a> {
    /// Either table may be unavailable
    pub fn new(sequence: Option<&'a Table>, metadata: Option<&'a Table>) -> Self {
        Self { sequence, metadata }
    }

    /// Sample information projection for one sample
    pub fn sample_info(&self, sample_id: &str) -> SampleInfo {
        let mut info = SampleInfo {
            sample_id: sample_id.to_string(),
            fields: Vec::new(),
            in_sequence: false,
            in_metadata: false,
        };

        let sources = [
            (self.sequence, sequence_columns::FILE_NAME),
            (self.metadata, metadata_columns::FILENAME),
        ];
        for (position, (table, key)) in sources.into_iter().enumerate() {
            let Some(table) = table else { continue };
            let matched = table.filter_eq(key, sample_id);
            if matched.len() > 1 {
                debug!("{} rows match {} in {}; using the first", matched.len(), sample_id, table.name());
            }
            let Some(row) = matched.rows().first() else { continue };

            for (column, cell) in matched.columns().iter().zip(row) {
                if column.name == key || info.fields.iter().any(|(name, _)| *name == column.name) {
                    continue;
                }
                info.fields.push((column.name.clone(), cell.clone()));
            }
            if position == 0 {
                info.in_sequence = true;
            } else {
                info.in_metadata = true;
            }
        }
        info
    }

    /// Autosampler position of a sample (markers stripped before lookup)
    pub fn position(&self, sample_id: &str) -> Option<String> {
        let sequence = self.sequence?;
        let column = sequence.column_index(sequence_columns::POSITION)?;
        let matched = sequence.filter_eq(sequence_columns::FILE_NAME, strip_marker(sample_id));
        let position = matched.rows().first()?[column].as_ref()?.to_string();
        Some(position)
    }

    /// Build [`Sample`] records for the ids observed in one polarity's tables,
    /// in run order (descending numeric suffix).
    pub fn samples<S: AsRef<str>>(&self, polarity: Polarity, observed: &[S]) -> Vec<Sample> {
        let ids = concat_sample_lists(&[observed.iter().map(|s| s.as_ref()).collect::<Vec<_>>()]);
        order_samples(&ids)
            .into_iter()
            .map(|sample_id| Sample {
                position: self.position(&sample_id),
                order: numeric_suffix(&sample_id),
                polarity,
                sample_id,
            })
            .collect()
    }
}
