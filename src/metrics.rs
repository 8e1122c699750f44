//! # Standard Metrics Aggregator
//!
//! Builds the per-sample metric table: one row per internal standard (or
//! targeted metabolite) with its m/z, RT, intensity, library and in-run deltas
//! and the warning / fail annotations.
//!
//! The retention time table is canonical. Its standard order fixes the row
//! order, and a sample missing from it cannot be reported at all. Every other
//! table is optional: when one is unavailable its column is left absent, and
//! when a delta table is unavailable the delta is computed from the catalog.
//!
//! ```text
//! Internal Standard | m/z | RT | Intensity | Delta RT | Delta m/z | In-Run Delta RT | Warnings | Fails
//! ```

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::{Panel, Polarity};
use crate::delta::{DeltaCalculator, DeltaRecord};
use crate::error::{FailureLedger, FailureRecord, QcError, QcResult};
use crate::matcher::find_sample_row;
use crate::store::{ResultType, TableRequest, TableSet};
use crate::table::{Cell, Column, ColumnType, Table, TableError, TableSchema};

/// Metric table headers (besides the name column)
pub mod columns {
    /// Precursor m/z
    pub const MZ: &str = "m/z";
    /// Retention time
    pub const RT: &str = "RT";
    /// Formatted intensity
    pub const INTENSITY: &str = "Intensity";
    /// Library RT delta
    pub const DELTA_RT: &str = "Delta RT";
    /// Library m/z delta
    pub const DELTA_MZ: &str = "Delta m/z";
    /// In-run RT delta
    pub const IN_RUN_DELTA_RT: &str = "In-Run Delta RT";
    /// Warning reasons
    pub const WARNINGS: &str = "Warnings";
    /// Fail reasons
    pub const FAILS: &str = "Fails";
}

/// Format an intensity for display, e.g. `1.23E+06`
pub fn format_intensity(value: f64) -> String {
    let formatted = format!("{:.2E}", value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

/// The tables of one polarity and panel, as fetched
#[derive(Debug, Clone, Default)]
pub struct MeasurementTables<'a> {
    tables: BTreeMap<ResultType, QcResult<&'a Table>>,
}

impl<'a> MeasurementTables<'a> {
    /// No tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the tables of one polarity and panel out of a gathered set
    pub fn from_set(set: &'a TableSet, request: impl Fn(ResultType) -> TableRequest) -> Self {
        let tables = ResultType::ALL
            .iter()
            .map(|&result| (result, set.table(&request(result))))
            .collect();
        Self { tables }
    }

    /// Add a table
    pub fn insert(&mut self, result: ResultType, table: QcResult<&'a Table>) {
        self.tables.insert(result, table);
    }

    /// Builder form of [`MeasurementTables::insert`]
    pub fn with(mut self, result: ResultType, table: &'a Table) -> Self {
        self.insert(result, Ok(table));
        self
    }

    /// One table; never provided counts as unavailable
    pub fn get(&self, result: ResultType) -> QcResult<&'a Table> {
        match self.tables.get(&result) {
            Some(table) => table.clone(),
            None => Err(QcError::SourceUnavailable {
                table: result.to_string(),
                reason: "not provided".to_string(),
            }),
        }
    }

    /// Sample ids of the canonical (RT) table, in table order
    pub fn sample_ids(&self) -> QcResult<Vec<String>> {
        Ok(self
            .get(ResultType::RetentionTime)?
            .keys()
            .map(str::to_string)
            .collect())
    }
}

/// Metrics of one standard in one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardMetrics {
    /// Standard or metabolite name
    pub name: String,
    /// Measured precursor m/z
    pub precursor_mz: Option<f64>,
    /// Measured retention time
    pub retention_time: Option<f64>,
    /// Measured intensity
    pub intensity: Option<f64>,
    /// RT delta versus library
    pub delta_rt: Option<f64>,
    /// m/z delta versus library
    pub delta_mz: Option<f64>,
    /// RT delta versus the in-run reference
    pub in_run_delta_rt: Option<f64>,
    /// Warning reasons
    pub warnings: BTreeSet<String>,
    /// Fail reasons
    pub fails: BTreeSet<String>,
}

/// Metric rows of one sample, in canonical standard order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetrics {
    /// Sample identifier
    pub sample_id: String,
    /// Ionization mode
    pub polarity: Polarity,
    /// Panel the rows belong to
    pub panel: Panel,
    /// One row per standard
    pub rows: Vec<StandardMetrics>,
    /// Delta records behind the delta columns
    pub deltas: Vec<DeltaRecord>,
    /// Isolated failures met while aggregating
    pub failures: Vec<FailureRecord>,
}

impl SampleMetrics {
    /// Intensity readings in row order
    pub fn intensities(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.intensity).collect()
    }

    /// Metrics of one standard
    pub fn standard(&self, name: &str) -> Option<&StandardMetrics> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Schema that rebuilds [`SampleMetrics::to_table`] output for `panel`
    pub fn table_schema(panel: &Panel) -> TableSchema {
        TableSchema {
            key_aliases: vec![panel.name_column().to_string()],
            required: vec![columns::MZ.to_string(), columns::RT.to_string(), columns::INTENSITY.to_string()],
            value_type: ColumnType::Float,
            overrides: [columns::INTENSITY, columns::WARNINGS, columns::FAILS]
                .iter()
                .map(|name| (name.to_string(), ColumnType::Text))
                .collect(),
        }
    }

    /// Display table. A missing intensity shows as `0.00E+00`.
    pub fn to_table(&self) -> Result<Table, TableError> {
        let columns = vec![
            Column::new(self.panel.name_column(), ColumnType::Text),
            Column::new(columns::MZ, ColumnType::Float),
            Column::new(columns::RT, ColumnType::Float),
            Column::new(columns::INTENSITY, ColumnType::Text),
            Column::new(columns::DELTA_RT, ColumnType::Float),
            Column::new(columns::DELTA_MZ, ColumnType::Float),
            Column::new(columns::IN_RUN_DELTA_RT, ColumnType::Float),
            Column::new(columns::WARNINGS, ColumnType::Text),
            Column::new(columns::FAILS, ColumnType::Text),
        ];
        let mut table = Table::new(format!("{}/metrics", self.sample_id), columns, 0)?;

        let float = |v: Option<f64>| v.map(Cell::Float);
        let reasons = |set: &BTreeSet<String>| {
            if set.is_empty() {
                None
            } else {
                Some(Cell::Text(set.iter().cloned().collect::<Vec<_>>().join(", ")))
            }
        };
        for row in &self.rows {
            table.push_row(vec![
                Some(Cell::Text(row.name.clone())),
                float(row.precursor_mz),
                float(row.retention_time),
                Some(Cell::Text(format_intensity(row.intensity.unwrap_or(0.0)))),
                float(row.delta_rt),
                float(row.delta_mz),
                float(row.in_run_delta_rt),
                reasons(&row.warnings),
                reasons(&row.fails),
            ])?;
        }
        Ok(table)
    }
}

/// One secondary table's cells for a sample, aligned to the canonical standards
type Aligned = Option<Vec<Option<Cell>>>;

fn align(
    table: &Table,
    sample_id: &str,
    standards: &[&str],
    canonical: &Table,
    ledger: &mut FailureLedger,
) -> QcResult<Aligned> {
    let mut found: Vec<&str> = table.value_columns().collect();
    let mut expected = standards.to_vec();
    found.sort_unstable();
    expected.sort_unstable();
    if found != expected {
        return Err(QcError::SchemaMismatch {
            table: table.name().to_string(),
            detail: format!("standards differ from '{}'", canonical.name()),
        });
    }

    let Some(row) = find_sample_row(table, sample_id) else {
        ledger.record(
            format!("{}: {}", sample_id, table.name()),
            &QcError::JoinMiss {
                key: sample_id.to_string(),
                table: table.name().to_string(),
            },
        );
        return Ok(None);
    };

    Ok(Some(
        standards
            .iter()
            .map(|name| table.column_index(name).and_then(|i| row[i].clone()))
            .collect(),
    ))
}

fn cell_at(aligned: &BTreeMap<ResultType, Aligned>, result: ResultType, i: usize) -> Option<&Cell> {
    aligned.get(&result)?.as_ref()?.get(i)?.as_ref()
}

fn reasons_from(cell: Option<&Cell>) -> impl Iterator<Item = String> + '_ {
    cell.and_then(Cell::as_text)
        .into_iter()
        .flat_map(|text| text.split([',', ';']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Aggregate the metric rows of one sample.
///
/// Fails only when the sample cannot be reported: the RT table is unavailable,
/// the sample is absent from it ([`QcError::JoinMiss`]) or a loaded table lists
/// different standards ([`QcError::SchemaMismatch`]). Everything else ends up
/// as an absent cell plus an entry in [`SampleMetrics::failures`].
pub fn aggregate_sample(
    sample_id: &str,
    tables: &MeasurementTables<'_>,
    calc: &DeltaCalculator<'_>,
) -> QcResult<SampleMetrics> {
    let rt = tables.get(ResultType::RetentionTime)?;
    let rt_row = find_sample_row(rt, sample_id).ok_or_else(|| QcError::JoinMiss {
        key: sample_id.to_string(),
        table: rt.name().to_string(),
    })?;
    let standards: Vec<&str> = rt.value_columns().collect();
    let mut ledger = FailureLedger::new();

    let mut aligned: BTreeMap<ResultType, Aligned> = BTreeMap::new();
    for result in ResultType::ALL {
        if result == ResultType::RetentionTime {
            continue;
        }
        let cells = match tables.get(result) {
            Ok(table) => align(table, sample_id, &standards, rt, &mut ledger)?,
            Err(err) => {
                debug!("{} unavailable for {}: {}", result, sample_id, err);
                None
            }
        };
        aligned.insert(result, cells);
    }
    let intensity_loaded = aligned
        .get(&ResultType::Intensity)
        .is_some_and(|cells| cells.is_some());

    let mut rows = Vec::with_capacity(standards.len());
    let mut deltas = Vec::with_capacity(standards.len());
    for (i, name) in standards.iter().enumerate() {
        let rt_cell = rt.column_index(name).and_then(|c| rt_row[c].as_ref());
        let retention_time = rt_cell.and_then(Cell::as_f64);
        let mz_cell = cell_at(&aligned, ResultType::PrecursorMz, i);
        let precursor_mz = mz_cell.and_then(Cell::as_f64);
        let intensity = cell_at(&aligned, ResultType::Intensity, i).and_then(Cell::as_f64);

        let delta_rt = match cell_at(&aligned, ResultType::DeltaRt, i)
            .and_then(Cell::as_f64)
            .or_else(|| rt_cell.and_then(Cell::delta))
        {
            Some(stored) => Some(stored),
            None => retention_time.and_then(|measured| {
                ledger.take(
                    format!("{}: {} ({})", sample_id, name, ResultType::DeltaRt),
                    calc.delta_rt(name, measured),
                )
            }),
        };
        let delta_mz = match cell_at(&aligned, ResultType::DeltaMz, i)
            .and_then(Cell::as_f64)
            .or_else(|| mz_cell.and_then(Cell::delta))
        {
            Some(stored) => Some(stored),
            None => precursor_mz.and_then(|measured| {
                ledger.take(
                    format!("{}: {} ({})", sample_id, name, ResultType::DeltaMz),
                    calc.delta_mz(name, measured),
                )
            }),
        };
        let in_run_delta_rt = cell_at(&aligned, ResultType::InRunDeltaRt, i)
            .and_then(Cell::as_f64)
            .or_else(|| retention_time.and_then(|measured| calc.in_run_delta_rt(name, measured)));

        let mut record = DeltaRecord::new(sample_id, *name);
        record.delta_rt_vs_library = delta_rt;
        record.delta_rt_vs_in_run = in_run_delta_rt;
        record.delta_mz_vs_library = delta_mz;
        record.delta_mz_ppm = delta_mz.and_then(|d| calc.delta_mz_ppm(name, d).ok());
        calc.flag(&mut record, !intensity_loaded || intensity.is_some());

        let mut warnings: BTreeSet<String> = reasons_from(cell_at(&aligned, ResultType::Warnings, i)).collect();
        warnings.extend(record.warnings.iter().map(|r| r.to_string()));
        let mut fails: BTreeSet<String> = reasons_from(cell_at(&aligned, ResultType::Fails, i)).collect();
        fails.extend(record.fails.iter().map(|r| r.to_string()));

        rows.push(StandardMetrics {
            name: name.to_string(),
            precursor_mz,
            retention_time,
            intensity,
            delta_rt,
            delta_mz,
            in_run_delta_rt,
            warnings,
            fails,
        });
        deltas.push(record);
    }

    Ok(SampleMetrics {
        sample_id: sample_id.to_string(),
        polarity: calc.polarity(),
        panel: calc.panel().clone(),
        rows,
        deltas,
        failures: ledger.into_records(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Chromatography, ReferenceCatalog};
    use crate::delta::{DeltaSettings, InRunReference, Reason};
    use crate::error::ErrorKind;

    fn table(name: &str, csv: &str) -> Table {
        Table::from_csv_reader(csv.as_bytes(), name, &TableSchema::measurement()).unwrap()
    }

    fn calculator(catalog: &ReferenceCatalog) -> DeltaCalculator<'_> {
        DeltaCalculator::new(catalog, Chromatography::Hilic, Polarity::Positive, Panel::InternalStandards)
    }

    #[test]
    fn test_format_intensity() {
        assert_eq!(format_intensity(1_234_567.0), "1.23E+06");
        assert_eq!(format_intensity(0.0), "0.00E+00");
        assert_eq!(format_intensity(0.000123), "1.23E-04");
        assert_eq!(format_intensity(5.5e12), "5.50E+12");
    }

    #[test]
    fn test_aggregate_follows_rt_order() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8,Creatinine d3\nQC01_HILIC_Pos_5,7.55,4.25\n");
        let intensity = table("intensity", "Sample,Creatinine d3,Methionine d8\nQC01_HILIC_Pos_5,2.5e6,\n");
        let tables = MeasurementTables::new()
            .with(ResultType::RetentionTime, &rt)
            .with(ResultType::Intensity, &intensity);

        let metrics = aggregate_sample("QC01_HILIC_Pos_5", &tables, &calculator(&catalog)).unwrap();
        let names: Vec<_> = metrics.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Methionine d8", "Creatinine d3"]);
        assert_eq!(metrics.rows[1].intensity, Some(2.5e6));
        assert_eq!(metrics.intensities(), vec![None, Some(2.5e6)]);

        let methionine = metrics.standard("Methionine d8").unwrap();
        assert!((methionine.delta_rt.unwrap() - 0.071).abs() < 1e-9);
        assert!(methionine.fails.contains(Reason::MissingIntensity.as_str()));
        assert_eq!(methionine.precursor_mz, None);

        let display = metrics.to_table().unwrap();
        assert_eq!(display.key_column(), "Internal Standard");
        assert_eq!(
            display.get("Methionine d8", columns::INTENSITY),
            Some(&Cell::Text("0.00E+00".to_string()))
        );
        assert_eq!(
            display.get("Creatinine d3", columns::INTENSITY),
            Some(&Cell::Text("2.50E+06".to_string()))
        );

        let schema = SampleMetrics::table_schema(&Panel::InternalStandards);
        let rebuilt = Table::from_transport(display.name(), &display.to_transport(), &schema).unwrap();
        assert_eq!(rebuilt, display);
    }

    #[test]
    fn test_stored_and_dual_deltas_take_precedence() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8,Creatinine d3\nS_1,7.55: 0.5,4.25\n");
        let delta_rt = table("delta_rt", "Sample,Methionine d8,Creatinine d3\nS_1,,0.01\n");
        let tables = MeasurementTables::new()
            .with(ResultType::RetentionTime, &rt)
            .with(ResultType::DeltaRt, &delta_rt);

        let metrics = aggregate_sample("S_1", &tables, &calculator(&catalog)).unwrap();
        assert_eq!(metrics.rows[0].retention_time, Some(7.55));
        assert_eq!(metrics.rows[0].delta_rt, Some(0.5));
        assert_eq!(metrics.rows[1].delta_rt, Some(0.01));
        assert!(metrics.rows[0].fails.contains("Delta RT"));
    }

    #[test]
    fn test_in_run_delta_from_reference() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8\nS_1,7.50\nS_2,7.60\nS_3,7.55\n");
        let reference = crate::delta::in_run_reference_rts(&rt, &InRunReference::Median).unwrap();
        let calc = calculator(&catalog)
            .with_settings(DeltaSettings::default())
            .with_in_run_reference(reference);
        let tables = MeasurementTables::new().with(ResultType::RetentionTime, &rt);

        let metrics = aggregate_sample("S_2", &tables, &calc).unwrap();
        assert!((metrics.rows[0].in_run_delta_rt.unwrap() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_missing_sample_is_join_miss() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8\nS_1,7.50\n");
        let tables = MeasurementTables::new().with(ResultType::RetentionTime, &rt);

        let err = aggregate_sample("S_2", &tables, &calculator(&catalog)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JoinMiss);
    }

    #[test]
    fn test_standard_mismatch_is_schema_error() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8,Creatinine d3\nS_1,7.50,4.2\n");
        let mz = table("mz", "Sample,Methionine d8\nS_1,158.11\n");
        let tables = MeasurementTables::new()
            .with(ResultType::RetentionTime, &rt)
            .with(ResultType::PrecursorMz, &mz);

        let err = aggregate_sample("S_1", &tables, &calculator(&catalog)).unwrap_err();
        assert!(matches!(err, QcError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_secondary_failures_are_isolated() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8,Not A Standard\nS_1,7.50,3.0\n");
        let mz = table("mz", "Sample,Methionine d8,Not A Standard\nS_9,158.11,200.0\n");
        let mut tables = MeasurementTables::new()
            .with(ResultType::RetentionTime, &rt)
            .with(ResultType::PrecursorMz, &mz);
        tables.insert(
            ResultType::Intensity,
            Err(QcError::Parse {
                table: "intensity".to_string(),
                detail: "bad".to_string(),
            }),
        );

        let metrics = aggregate_sample("S_1", &tables, &calculator(&catalog)).unwrap();
        assert_eq!(metrics.rows.len(), 2);
        assert_eq!(metrics.rows[1].delta_rt, None);
        assert!(metrics.rows.iter().all(|r| r.precursor_mz.is_none()));

        let kinds: Vec<_> = metrics.failures.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&ErrorKind::JoinMiss));
        assert!(kinds.contains(&ErrorKind::ReferenceNotFound));
        assert!(!metrics.rows[0].fails.contains(Reason::MissingIntensity.as_str()));
    }

    #[test]
    fn test_stored_annotations_are_merged() {
        let catalog = ReferenceCatalog::builtin();
        let rt = table("rt", "Sample,Methionine d8\nS_1,7.48\n");
        let warnings = Table::from_csv_reader(
            "Sample,Methionine d8\nS_1,Peak shape; Delta RT\n".as_bytes(),
            "warnings",
            &TableSchema::annotations(),
        )
        .unwrap();
        let tables = MeasurementTables::new()
            .with(ResultType::RetentionTime, &rt)
            .with(ResultType::Warnings, &warnings);

        let metrics = aggregate_sample("S_1", &tables, &calculator(&catalog)).unwrap();
        let expected: BTreeSet<String> = ["Delta RT", "Peak shape"].iter().map(|s| s.to_string()).collect();
        assert_eq!(metrics.rows[0].warnings, expected);
    }
}
