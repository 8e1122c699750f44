//! # QC Pipeline
//!
//! Wires the components together for one request: a run, a single sample or a
//! benchmark series. Each request gathers its tables concurrently from a
//! [`TableStore`], then runs matcher → metrics / benchmarks → verdict →
//! assembler on the joined results.
//!
//! Only two things abort a request: the run record itself cannot be loaded, or
//! (for a single-sample request) the sample is absent from every retention
//! time table. Everything else is isolated and reported in the envelope.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::assembler::{
    assemble_benchmark, assemble_sample, run_metadata, BenchmarkReport, RunReport, SampleReport,
};
use crate::benchmark::{aggregate_run, BiologicalStandardBenchmark};
use crate::catalog::{Chromatography, Panel, Polarity, ReferenceCatalog};
use crate::delta::{in_run_reference_rts, DeltaCalculator, DeltaSettings};
use crate::error::{FailureLedger, FailureRecord, QcError, QcResult};
use crate::matcher::{concat_sample_lists, numeric_suffix, SampleMatcher};
use crate::metrics::{aggregate_sample, MeasurementTables};
use crate::model::{InstrumentRun, Sample};
use crate::store::{gather, sort_runs, CancellationToken, ResultType, TableRequest, TableSet, TableStore};
use crate::verdict::evaluate_table;

/// Default size of the fetch pool
pub const DEFAULT_WORKERS: usize = 8;

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent table fetches per request
    pub workers: usize,
    /// Delta and tolerance settings
    pub delta: DeltaSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            delta: DeltaSettings::default(),
        }
    }
}

/// Tables needed to evaluate a run: sequence, metadata, every internal
/// standard result in both polarities and every result of each biological
/// standard of the run.
pub fn run_requests(run: &InstrumentRun) -> Vec<TableRequest> {
    let mut requests = vec![
        TableRequest::sequence(&run.run_id),
        TableRequest::metadata(&run.run_id),
    ];
    for polarity in Polarity::BOTH {
        for result in ResultType::ALL {
            requests.push(TableRequest::internal_standard(&run.run_id, polarity, result));
        }
    }
    for standard in &run.biological_standards {
        requests.extend(biological_standard_requests(&run.run_id, standard));
    }
    requests
}

/// Every result table of one biological standard of a run
pub fn biological_standard_requests(run_id: &str, standard: &str) -> Vec<TableRequest> {
    Polarity::BOTH
        .iter()
        .flat_map(|&polarity| {
            ResultType::ALL
                .iter()
                .map(move |&result| TableRequest::biological_standard(run_id, standard, polarity, result))
        })
        .collect()
}

fn table_failures(set: &TableSet) -> Vec<FailureRecord> {
    set.failures()
        .into_iter()
        .map(|(request, err)| FailureRecord::new(request.table_name(), err))
        .collect()
}

/// Runs QC requests against a table store
#[derive(Clone)]
pub struct QcPipeline {
    store: Arc<dyn TableStore>,
    catalog: Arc<ReferenceCatalog>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl QcPipeline {
    /// Pipeline over `store` with library values from `catalog`
    pub fn new(store: Arc<dyn TableStore>, catalog: Arc<ReferenceCatalog>, config: PipelineConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Settings in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Catalog in use
    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    fn gather(&self, requests: &[TableRequest]) -> TableSet {
        debug!("Gathering {} tables with {} workers", requests.len(), self.config.workers);
        gather(self.store.as_ref(), requests, self.config.workers, &self.cancel)
    }

    fn istd_tables<'s>(&self, set: &'s TableSet, run_id: &str, polarity: Polarity) -> MeasurementTables<'s> {
        MeasurementTables::from_set(set, |result| TableRequest::internal_standard(run_id, polarity, result))
    }

    fn calculator(
        &self,
        chromatography: Chromatography,
        polarity: Polarity,
        panel: Panel,
        tables: &MeasurementTables<'_>,
        ledger: &mut FailureLedger,
        subject: &str,
    ) -> DeltaCalculator<'_> {
        let calc = DeltaCalculator::new(&self.catalog, chromatography, polarity, panel)
            .with_settings(self.config.delta.clone());
        let reference = tables
            .get(ResultType::RetentionTime)
            .and_then(|rt| in_run_reference_rts(rt, &self.config.delta.in_run_reference));
        match reference {
            Ok(reference) => calc.with_in_run_reference(reference),
            Err(err) => {
                // an unavailable RT table is already reported by the gather
                if matches!(err, QcError::JoinMiss { .. }) {
                    ledger.record(format!("{} in-run reference", subject), &err);
                }
                calc
            }
        }
    }

    fn sample_report(
        &self,
        run: &InstrumentRun,
        sample: &Sample,
        matcher: &SampleMatcher<'_>,
        tables: &MeasurementTables<'_>,
        calc: &DeltaCalculator<'_>,
    ) -> SampleReport {
        let info = matcher.sample_info(&sample.sample_id);
        let metrics = aggregate_sample(&sample.sample_id, tables, calc);
        let verdict = tables
            .get(ResultType::Intensity)
            .and_then(|intensity| evaluate_table(intensity, &sample.sample_id, sample.polarity));
        assemble_sample(&run.run_id, sample, &info, metrics, verdict)
    }

    fn run_benchmarks(&self, run: &InstrumentRun, set: &TableSet) -> Vec<BenchmarkReport> {
        let mut reports = Vec::new();
        for standard in &run.biological_standards {
            for polarity in Polarity::BOTH {
                let tables = MeasurementTables::from_set(set, |result| {
                    TableRequest::biological_standard(&run.run_id, standard, polarity, result)
                });
                let calc = DeltaCalculator::new(
                    &self.catalog,
                    run.chromatography,
                    polarity,
                    Panel::BiologicalStandard(standard.clone()),
                )
                .with_settings(self.config.delta.clone());
                let result = aggregate_run(&run.run_id, &tables, &calc, &self.config.delta.in_run_reference);
                if matches!(result, Ok(None)) {
                    continue;
                }
                let panel = self.panel_names(run.chromatography, standard, polarity);
                let panel: Vec<&str> = panel.iter().map(String::as_str).collect();
                let benchmark = BiologicalStandardBenchmark::build(
                    standard.clone(),
                    run.chromatography,
                    polarity,
                    &panel,
                    vec![(run.run_id.clone(), result)],
                );
                reports.push(assemble_benchmark(&benchmark));
            }
        }
        reports
    }

    fn panel_names(&self, chromatography: Chromatography, standard: &str, polarity: Polarity) -> Vec<String> {
        self.catalog
            .panel(chromatography, &Panel::BiologicalStandard(standard.to_string()), polarity)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Evaluate every sample of a run, both polarities
    pub fn evaluate_run(&self, run_id: &str) -> QcResult<RunReport> {
        let run = self.store.load_run(run_id)?;
        info!("Evaluating run {} ({})", run.run_id, run.chromatography);

        let set = self.gather(&run_requests(&run));
        let mut ledger = FailureLedger::new();
        ledger.extend(table_failures(&set));

        let sequence = set.table(&TableRequest::sequence(&run.run_id)).ok();
        let metadata = set.table(&TableRequest::metadata(&run.run_id)).ok();
        let matcher = SampleMatcher::new(sequence, metadata);

        let mut samples = Vec::new();
        for polarity in Polarity::BOTH {
            let tables = self.istd_tables(&set, &run.run_id, polarity);
            let Ok(observed) = tables.sample_ids() else {
                warn!("No {} retention time table for {}", polarity, run.run_id);
                continue;
            };
            let subject = format!("{} ({})", run.run_id, polarity);
            let calc = self.calculator(
                run.chromatography,
                polarity,
                Panel::InternalStandards,
                &tables,
                &mut ledger,
                &subject,
            );
            for sample in matcher.samples(polarity, &observed) {
                samples.push(self.sample_report(&run, &sample, &matcher, &tables, &calc));
            }
        }

        let biological_standards = self.run_benchmarks(&run, &set);
        let metadata = run_metadata(&run, &self.catalog, &self.config.delta);
        let report = RunReport::new(run, metadata, samples, biological_standards, ledger.into_records());

        let summary = report.summary();
        info!(
            "{}: {} passed, {} failed, {} without verdict, {} failures",
            report.run.run_id,
            summary.passed,
            summary.failed,
            summary.unknown,
            report.all_failures().len()
        );
        Ok(report)
    }

    /// Evaluate one sample of a run.
    ///
    /// Every polarity whose RT table lists the sample gets an envelope. A
    /// sample absent from all of them is a [`QcError::JoinMiss`].
    pub fn evaluate_sample(&self, run_id: &str, sample_id: &str) -> QcResult<Vec<SampleReport>> {
        let run = self.store.load_run(run_id)?;
        let mut requests = vec![TableRequest::sequence(run_id), TableRequest::metadata(run_id)];
        for polarity in Polarity::BOTH {
            for result in ResultType::ALL {
                requests.push(TableRequest::internal_standard(run_id, polarity, result));
            }
        }
        let set = self.gather(&requests);

        let sequence = set.table(&TableRequest::sequence(run_id)).ok();
        let metadata = set.table(&TableRequest::metadata(run_id)).ok();
        let matcher = SampleMatcher::new(sequence, metadata);

        let mut reports = Vec::new();
        for polarity in Polarity::BOTH {
            let tables = self.istd_tables(&set, run_id, polarity);
            let Ok(observed) = tables.sample_ids() else { continue };
            let observed = concat_sample_lists(&[observed]);
            if !observed.iter().any(|id| id == sample_id) {
                continue;
            }

            let mut ledger = FailureLedger::new();
            let subject = format!("{} ({})", run_id, polarity);
            let calc = self.calculator(
                run.chromatography,
                polarity,
                Panel::InternalStandards,
                &tables,
                &mut ledger,
                &subject,
            );
            let sample = Sample {
                sample_id: sample_id.to_string(),
                polarity,
                position: matcher.position(sample_id),
                order: numeric_suffix(sample_id),
            };
            let mut report = self.sample_report(&run, &sample, &matcher, &tables, &calc);
            let mut failures = ledger.into_records();
            failures.append(&mut report.failures);
            report.failures = failures;
            reports.push(report);
        }

        if reports.is_empty() {
            return Err(QcError::JoinMiss {
                key: sample_id.to_string(),
                table: format!("{} retention time tables", run_id),
            });
        }
        Ok(reports)
    }

    /// Benchmark a biological standard across runs.
    ///
    /// `run_ids` selects runs explicitly; `None` takes every run in the store
    /// that lists the standard. Runs are ordered oldest first and must share a
    /// chromatography method; the first run's method wins and others are
    /// skipped with a warning.
    ///
    /// A run record that fails to load is skipped and listed in the failures
    /// of every returned report. The request fails only when explicitly
    /// selected runs exist and none of them loads.
    pub fn benchmark(&self, standard: &str, run_ids: Option<&[String]>) -> QcResult<Vec<BenchmarkReport>> {
        let candidates = match run_ids {
            Some(ids) => ids.to_vec(),
            None => self.store.run_ids()?,
        };

        let mut run_failures = FailureLedger::new();
        let mut last_error = None;
        let mut runs = Vec::new();
        for run_id in &candidates {
            match self.store.load_run(run_id) {
                Ok(run) => runs.push(run),
                Err(err) => {
                    warn!("Skipping run {}: {}", run_id, err);
                    run_failures.record(run_id.as_str(), &err);
                    last_error = Some(err);
                }
            }
        }
        if run_ids.is_some() && runs.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        if run_ids.is_none() {
            runs.retain(|run| run.biological_standards.contains(standard));
        }
        sort_runs(&mut runs);

        let Some(chromatography) = runs.first().map(|run| run.chromatography) else {
            info!("No runs include {}", standard);
            return Ok(Vec::new());
        };
        runs.retain(|run| {
            let same = run.chromatography == chromatography;
            if !same {
                warn!(
                    "Skipping {}: {} differs from {}",
                    run.run_id, run.chromatography, chromatography
                );
            }
            same
        });
        info!("Benchmarking {} over {} {} runs", standard, runs.len(), chromatography);

        let requests: Vec<TableRequest> = runs
            .iter()
            .flat_map(|run| biological_standard_requests(&run.run_id, standard))
            .collect();
        let set = self.gather(&requests);

        let mut reports = Vec::new();
        for polarity in Polarity::BOTH {
            let calc = DeltaCalculator::new(
                &self.catalog,
                chromatography,
                polarity,
                Panel::BiologicalStandard(standard.to_string()),
            )
            .with_settings(self.config.delta.clone());

            let results: Vec<_> = runs
                .iter()
                .map(|run| {
                    let tables = MeasurementTables::from_set(&set, |result| {
                        TableRequest::biological_standard(&run.run_id, standard, polarity, result)
                    });
                    let result = aggregate_run(&run.run_id, &tables, &calc, &self.config.delta.in_run_reference);
                    (run.run_id.clone(), result)
                })
                .collect();
            if results.iter().all(|(_, r)| matches!(r, Ok(None))) {
                debug!("No {} data for {}", polarity, standard);
                continue;
            }

            let panel = self.panel_names(chromatography, standard, polarity);
            let panel: Vec<&str> = panel.iter().map(String::as_str).collect();
            let benchmark = BiologicalStandardBenchmark::build(standard, chromatography, polarity, &panel, results);
            let mut report = assemble_benchmark(&benchmark);
            let mut failures = run_failures.records().to_vec();
            failures.append(&mut report.failures);
            report.failures = failures;
            reports.push(report);
        }
        Ok(reports)
    }
}
