//! # Biological Standard Benchmarks
//!
//! A biological standard is injected in many runs. For each targeted
//! metabolite of its panel this module builds the series of intensities across
//! runs (oldest first) and the percent change of each run against a baseline
//! of the others.
//!
//! Not every run includes every biological standard: a run without the
//! standard's tables contributes nothing to any series and is not an error.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::catalog::{Chromatography, Polarity};
use crate::delta::{in_run_reference_rts, series_percent_change, BaselineWindow, DeltaCalculator, InRunReference};
use crate::error::{FailureLedger, FailureRecord, QcError, QcResult};
use crate::matcher::strip_marker;
use crate::metrics::{aggregate_sample, MeasurementTables, SampleMetrics};
use crate::store::ResultType;
use crate::table::{Cell, Column, ColumnType, Table, TableError};

/// Key column of benchmark tables
pub const RUN_COLUMN: &str = "Name";

/// One run's reading in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Run identifier
    pub run_id: String,
    /// Intensity of the metabolite in that run
    pub intensity: f64,
}

/// Intensities of one metabolite across runs, oldest run first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSeries {
    /// Metabolite or standard name
    pub name: String,
    /// Readings, in run order
    pub points: Vec<SeriesPoint>,
}

impl BenchmarkSeries {
    /// Empty series
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Intensities in run order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.intensity).collect()
    }

    /// Percent change of every point against its baseline
    pub fn percent_changes(&self, window: BaselineWindow) -> Vec<(String, f64)> {
        let values = self.values();
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, point)| {
                series_percent_change(&values, i, window).map(|change| (point.run_id.clone(), change))
            })
            .collect()
    }
}

/// Row of a run's biological standard table that represents the run: the row
/// keyed by the run id when present, otherwise the first row.
pub fn run_row_key(rt: &Table, run_id: &str) -> Option<String> {
    let mut keys = rt.keys();
    let first = keys.next()?;
    if strip_marker(first) == run_id {
        return Some(first.to_string());
    }
    Some(
        keys.find(|k| strip_marker(k) == run_id)
            .unwrap_or(first)
            .to_string(),
    )
}

/// Metrics of one run's biological standard injection.
///
/// `Ok(None)` when the run has no table (or an empty one) for the standard.
/// The in-run reference is computed from the run's own RT table.
pub fn aggregate_run(
    run_id: &str,
    tables: &MeasurementTables<'_>,
    calc: &DeltaCalculator<'_>,
    reference: &InRunReference,
) -> QcResult<Option<SampleMetrics>> {
    let rt = match tables.get(ResultType::RetentionTime) {
        Ok(rt) => rt,
        Err(QcError::SourceUnavailable { .. }) => {
            debug!("{} has no {} table", run_id, calc.panel());
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let Some(key) = run_row_key(rt, run_id) else {
        return Ok(None);
    };

    let in_run = match in_run_reference_rts(rt, reference) {
        Ok(in_run) => in_run,
        Err(err) => {
            debug!("No in-run reference for {}: {}", run_id, err);
            Default::default()
        }
    };
    let calc = calc.clone().with_in_run_reference(in_run);
    aggregate_sample(&key, tables, &calc).map(Some)
}

/// One run's contribution to a benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunBenchmark {
    /// Run identifier
    pub run_id: String,
    /// Metrics of the run's injection, absent when the run lacks the standard
    /// or the computation failed
    pub metrics: Option<SampleMetrics>,
}

/// Benchmark of one biological standard in one polarity across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiologicalStandardBenchmark {
    /// Biological standard name
    pub standard: String,
    /// Chromatography method shared by the runs
    pub chromatography: Chromatography,
    /// Ionization mode
    pub polarity: Polarity,
    /// Per-run metrics, oldest run first
    pub runs: Vec<RunBenchmark>,
    /// One series per panel metabolite, in panel order
    pub series: Vec<BenchmarkSeries>,
    /// Isolated failures
    pub failures: Vec<FailureRecord>,
}

impl BiologicalStandardBenchmark {
    /// Assemble the benchmark from per-run results (oldest first).
    ///
    /// `panel` fixes the series order; metabolites measured but not in the
    /// panel are appended after it.
    pub fn build(
        standard: impl Into<String>,
        chromatography: Chromatography,
        polarity: Polarity,
        panel: &[&str],
        results: Vec<(String, QcResult<Option<SampleMetrics>>)>,
    ) -> Self {
        let standard = standard.into();
        let mut ledger = FailureLedger::new();
        let mut runs = Vec::with_capacity(results.len());
        for (run_id, result) in results {
            let metrics = ledger
                .take(format!("{}: {} ({})", run_id, standard, polarity), result)
                .flatten();
            if let Some(metrics) = &metrics {
                ledger.extend(metrics.failures.iter().cloned());
            }
            runs.push(RunBenchmark { run_id, metrics });
        }

        let mut names: Vec<String> = panel.iter().map(|s| s.to_string()).collect();
        for run in &runs {
            for row in run.metrics.iter().flat_map(|m| &m.rows) {
                if !names.contains(&row.name) {
                    names.push(row.name.clone());
                }
            }
        }

        let series = names
            .into_iter()
            .map(|name| {
                let mut series = BenchmarkSeries::new(name);
                for run in &runs {
                    let reading = run
                        .metrics
                        .as_ref()
                        .and_then(|m| m.standard(&series.name))
                        .and_then(|row| row.intensity);
                    if let Some(intensity) = reading {
                        series.points.push(SeriesPoint {
                            run_id: run.run_id.clone(),
                            intensity,
                        });
                    }
                }
                series
            })
            .collect();

        let benchmark = Self {
            standard,
            chromatography,
            polarity,
            runs,
            series,
            failures: ledger.into_records(),
        };
        info!(
            "{} {} ({}): {} runs, {} with data",
            benchmark.chromatography,
            benchmark.standard,
            benchmark.polarity,
            benchmark.runs.len(),
            benchmark.runs.iter().filter(|r| r.metrics.is_some()).count()
        );
        benchmark
    }

    /// Series of one metabolite
    pub fn series(&self, name: &str) -> Option<&BenchmarkSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Percent change table: one row per run, one column per metabolite.
    /// Cells are absent where the run has no reading.
    pub fn percent_change_table(&self, window: BaselineWindow) -> Result<Table, TableError> {
        let mut columns = vec![Column::new(RUN_COLUMN, ColumnType::Text)];
        columns.extend(self.series.iter().map(|s| Column::new(s.name.clone(), ColumnType::Float)));
        let mut table = Table::new(format!("{} {}", self.standard, window.label()), columns, 0)?;

        let changes: Vec<Vec<(String, f64)>> = self.series.iter().map(|s| s.percent_changes(window)).collect();
        for run in &self.runs {
            let mut row = vec![Some(Cell::Text(run.run_id.clone()))];
            row.extend(changes.iter().map(|series| {
                series
                    .iter()
                    .find(|(run_id, _)| *run_id == run.run_id)
                    .map(|(_, change)| Cell::Float(*change))
            }));
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Intensity table: one row per run, one column per metabolite
    pub fn intensity_table(&self) -> Result<Table, TableError> {
        let mut columns = vec![Column::new(RUN_COLUMN, ColumnType::Text)];
        columns.extend(self.series.iter().map(|s| Column::new(s.name.clone(), ColumnType::Float)));
        let mut table = Table::new(format!("{} intensity", self.standard), columns, 0)?;

        for run in &self.runs {
            let mut row = vec![Some(Cell::Text(run.run_id.clone()))];
            row.extend(self.series.iter().map(|series| {
                series
                    .points
                    .iter()
                    .find(|p| p.run_id == run.run_id)
                    .map(|p| Cell::Float(p.intensity))
            }));
            table.push_row(row)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Panel, ReferenceCatalog};
    use crate::error::ErrorKind;
    use crate::table::TableSchema;

    fn bio_table(csv: &str) -> Table {
        Table::from_csv_reader(csv.as_bytes(), "bio", &TableSchema::biological_standard()).unwrap()
    }

    fn run_metrics(
        catalog: &ReferenceCatalog,
        run_id: &str,
        rt: Option<&Table>,
        intensity: Option<&Table>,
    ) -> QcResult<Option<SampleMetrics>> {
        let calc = DeltaCalculator::new(
            catalog,
            Chromatography::Hilic,
            Polarity::Positive,
            Panel::BiologicalStandard("Urine".to_string()),
        );
        let mut tables = MeasurementTables::new();
        if let Some(rt) = rt {
            tables.insert(ResultType::RetentionTime, Ok(rt));
        }
        if let Some(intensity) = intensity {
            tables.insert(ResultType::Intensity, Ok(intensity));
        }
        aggregate_run(run_id, &tables, &calc, &InRunReference::Median)
    }

    #[test]
    fn test_run_without_standard_is_empty() {
        let catalog = ReferenceCatalog::builtin();
        assert_eq!(run_metrics(&catalog, "RUN_1", None, None), Ok(None));
    }

    #[test]
    fn test_run_row_key() {
        let rt = bio_table("Name,Creatinine\nUrine_QC_1,4.25\nRUN_2,4.27\n");
        assert_eq!(run_row_key(&rt, "RUN_2").as_deref(), Some("RUN_2"));
        assert_eq!(run_row_key(&rt, "RUN_9").as_deref(), Some("Urine_QC_1"));
        assert_eq!(run_row_key(&bio_table("Name,Creatinine\n"), "RUN_2"), None);
    }

    #[test]
    fn test_series_across_runs() {
        let catalog = ReferenceCatalog::builtin();
        let rt1 = bio_table("Name,Creatinine,Carnitine\nRUN_1,4.25,8.58\n");
        let in1 = bio_table("Name,Creatinine,Carnitine\nRUN_1,100,\n");
        let rt3 = bio_table("Name,Creatinine,Carnitine\nRUN_3,4.26,8.60\n");
        let in3 = bio_table("Name,Creatinine,Carnitine\nRUN_3,300,50\n");

        let results = vec![
            ("RUN_1".to_string(), run_metrics(&catalog, "RUN_1", Some(&rt1), Some(&in1))),
            ("RUN_2".to_string(), run_metrics(&catalog, "RUN_2", None, None)),
            ("RUN_3".to_string(), run_metrics(&catalog, "RUN_3", Some(&rt3), Some(&in3))),
        ];
        let benchmark = BiologicalStandardBenchmark::build(
            "Urine",
            Chromatography::Hilic,
            Polarity::Positive,
            &["Creatinine", "Carnitine", "Betaine"],
            results,
        );

        assert_eq!(benchmark.runs.len(), 3);
        assert!(benchmark.runs[1].metrics.is_none());
        assert!(benchmark.failures.is_empty());

        let creatinine = benchmark.series("Creatinine").unwrap();
        assert_eq!(creatinine.values(), vec![100.0, 300.0]);
        let others = creatinine.percent_changes(BaselineWindow::OtherRuns);
        assert_eq!(others.len(), 2);
        assert!((others[0].1 - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(others[1], ("RUN_3".to_string(), 200.0));
        assert_eq!(
            creatinine.percent_changes(BaselineWindow::PriorRuns),
            vec![("RUN_1".to_string(), 0.0), ("RUN_3".to_string(), 50.0)]
        );

        let carnitine = benchmark.series("Carnitine").unwrap();
        assert_eq!(carnitine.percent_changes(BaselineWindow::OtherRuns), vec![("RUN_3".to_string(), 0.0)]);
        assert!(benchmark.series("Betaine").unwrap().points.is_empty());

        let table = benchmark.percent_change_table(BaselineWindow::PriorRuns).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("RUN_3", "Creatinine"), Some(&Cell::Float(50.0)));
        assert_eq!(table.get("RUN_2", "Creatinine"), None);

        let intensities = benchmark.intensity_table().unwrap();
        assert_eq!(intensities.get("RUN_1", "Creatinine"), Some(&Cell::Float(100.0)));

        let schema = TableSchema::benchmark_series();
        for output in [table, intensities] {
            let rebuilt = Table::from_transport(output.name(), &output.to_transport(), &schema).unwrap();
            assert_eq!(rebuilt, output);
        }
    }

    #[test]
    fn test_failed_run_is_recorded() {
        let results = vec![(
            "RUN_1".to_string(),
            Err(QcError::Parse {
                table: "RUN_1/bio_urine_pos_intensity".to_string(),
                detail: "bad".to_string(),
            }),
        )];
        let benchmark = BiologicalStandardBenchmark::build(
            "Urine",
            Chromatography::Hilic,
            Polarity::Positive,
            &["Creatinine"],
            results,
        );
        assert!(benchmark.runs[0].metrics.is_none());
        assert_eq!(benchmark.failures[0].kind, ErrorKind::ParseError);
    }
}
