//! # Result Assembler
//!
//! Turns matcher, metrics, verdict and benchmark outputs into the transport
//! envelopes handed to rendering layers. Tables travel as
//! [`TransportTable`]s, scalar metadata as a flat [`ScalarMap`].
//!
//! A failed sub-computation never aborts the envelope: its slot is `null` and
//! the failure is listed in `failures` as `{subject, kind, message}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::benchmark::BiologicalStandardBenchmark;
use crate::catalog::{Chromatography, Polarity, ReferenceCatalog};
use crate::delta::{BaselineWindow, DeltaRecord, DeltaSettings};
use crate::error::{FailureLedger, FailureRecord, QcError, QcResult};
use crate::matcher::SampleInfo;
use crate::metrics::SampleMetrics;
use crate::model::{InstrumentRun, Sample};
use crate::table::{ScalarMap, Table, TableError, TransportTable};
use crate::verdict::{aggregate, QcVerdict, Verdict, MISSING_STANDARD_FAIL_THRESHOLD};

fn transport(
    ledger: &mut FailureLedger,
    subject: &str,
    table: Result<Table, TableError>,
) -> Option<TransportTable> {
    ledger
        .take(subject, table.map_err(|err| QcError::parse(subject, &err)))
        .map(|t| t.to_transport())
}

/// Everything reported about one sample in one polarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    /// Run the sample belongs to
    pub run_id: String,
    /// Sample identifier
    pub sample_id: String,
    /// Ionization mode
    pub polarity: Polarity,
    /// Autosampler position
    pub position: Option<String>,
    /// Injection order
    pub order: Option<u64>,
    /// Sequence and metadata fields; zero rows when the sample is unmatched
    pub info: TransportTable,
    /// Per-standard metric table
    pub metrics: Option<TransportTable>,
    /// Delta records behind the metric table
    pub deltas: Option<Vec<DeltaRecord>>,
    /// QC verdict
    pub verdict: Option<QcVerdict>,
    /// Isolated failures
    pub failures: Vec<FailureRecord>,
}

impl SampleReport {
    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Assemble one sample's envelope
pub fn assemble_sample(
    run_id: &str,
    sample: &Sample,
    info: &SampleInfo,
    metrics: QcResult<SampleMetrics>,
    verdict: QcResult<QcVerdict>,
) -> SampleReport {
    let mut ledger = FailureLedger::new();
    let subject = format!("{}/{}", run_id, sample.sample_id);

    let info = transport(&mut ledger, &format!("{} info", subject), info.to_table()).unwrap_or_default();

    let metrics = ledger.take(format!("{} metrics", subject), metrics);
    let (metric_table, deltas) = match metrics {
        Some(metrics) => {
            ledger.extend(metrics.failures.iter().cloned());
            let table = transport(&mut ledger, &format!("{} metrics", subject), metrics.to_table());
            (table, Some(metrics.deltas))
        }
        None => (None, None),
    };
    let verdict = ledger.take(format!("{} verdict", subject), verdict);

    SampleReport {
        run_id: run_id.to_string(),
        sample_id: sample.sample_id.clone(),
        polarity: sample.polarity,
        position: sample.position.clone(),
        order: sample.order,
        info,
        metrics: metric_table,
        deltas,
        verdict,
        failures: ledger.into_records(),
    }
}

/// One run's metric table within a benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Run identifier
    pub run_id: String,
    /// Metric table of the run's injection
    pub metrics: Option<TransportTable>,
}

/// Envelope of one biological standard benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Biological standard name
    pub standard: String,
    /// Chromatography method
    pub chromatography: Chromatography,
    /// Ionization mode
    pub polarity: Polarity,
    /// Intensities: one row per run, one column per metabolite
    pub intensity: Option<TransportTable>,
    /// Percent change against every other run
    pub percent_change_other_runs: Option<TransportTable>,
    /// Percent change against the runs up to the current one
    pub percent_change_prior_runs: Option<TransportTable>,
    /// Per-run metric tables
    pub runs: Vec<RunMetrics>,
    /// Isolated failures
    pub failures: Vec<FailureRecord>,
}

impl BenchmarkReport {
    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Assemble a benchmark envelope
pub fn assemble_benchmark(benchmark: &BiologicalStandardBenchmark) -> BenchmarkReport {
    let mut ledger = FailureLedger::new();
    ledger.extend(benchmark.failures.iter().cloned());
    let subject = format!("{} ({})", benchmark.standard, benchmark.polarity);

    let intensity = transport(&mut ledger, &format!("{} intensity", subject), benchmark.intensity_table());
    let percent_change_other_runs = transport(
        &mut ledger,
        &format!("{} {}", subject, BaselineWindow::OtherRuns.label()),
        benchmark.percent_change_table(BaselineWindow::OtherRuns),
    );
    let percent_change_prior_runs = transport(
        &mut ledger,
        &format!("{} {}", subject, BaselineWindow::PriorRuns.label()),
        benchmark.percent_change_table(BaselineWindow::PriorRuns),
    );

    let runs = benchmark
        .runs
        .iter()
        .map(|run| RunMetrics {
            run_id: run.run_id.clone(),
            metrics: run.metrics.as_ref().and_then(|m| {
                transport(&mut ledger, &format!("{}/{} metrics", run.run_id, subject), m.to_table())
            }),
        })
        .collect();

    BenchmarkReport {
        standard: benchmark.standard.clone(),
        chromatography: benchmark.chromatography,
        polarity: benchmark.polarity,
        intensity,
        percent_change_other_runs,
        percent_change_prior_runs,
        runs,
        failures: ledger.into_records(),
    }
}

/// Scalar metadata of a run report: run fields, thresholds and the catalog
/// entries of the run's method (under `catalog.`)
pub fn run_metadata(run: &InstrumentRun, catalog: &ReferenceCatalog, settings: &DeltaSettings) -> ScalarMap {
    let mut map = ScalarMap::new();
    map.insert("run_id".to_string(), Value::from(run.run_id.clone()));
    map.insert("instrument_id".to_string(), Value::from(run.instrument_id.clone()));
    map.insert("chromatography".to_string(), Value::from(run.chromatography.as_str()));
    map.insert("status".to_string(), Value::from(run.status.to_string()));
    map.insert("samples_completed".to_string(), Value::from(run.samples_completed));
    if let Some(started_at) = run.started_at {
        map.insert("started_at".to_string(), Value::from(started_at.to_rfc3339()));
    }
    map.insert(
        "biological_standards".to_string(),
        Value::from(run.biological_standards.iter().cloned().collect::<Vec<_>>().join(",")),
    );
    for (key, value) in &run.derived_metrics {
        map.insert(format!("derived.{}", key), Value::from(value.clone()));
    }

    map.insert(
        "missing_standard_fail_threshold".to_string(),
        Value::from(MISSING_STANDARD_FAIL_THRESHOLD),
    );
    map.insert("in_run_reference".to_string(), Value::from(settings.in_run_reference.to_string()));
    map.insert("rt_window".to_string(), Value::from(settings.rt_window));
    let tolerances = &settings.tolerances;
    for (key, value) in [
        ("delta_rt_warn", tolerances.delta_rt_warn),
        ("delta_rt_fail", tolerances.delta_rt_fail),
        ("in_run_delta_rt_warn", tolerances.in_run_delta_rt_warn),
        ("in_run_delta_rt_fail", tolerances.in_run_delta_rt_fail),
        ("delta_mz_ppm_warn", tolerances.delta_mz_ppm_warn),
        ("delta_mz_ppm_fail", tolerances.delta_mz_ppm_fail),
    ] {
        map.insert(key.to_string(), Value::from(value));
    }

    for (key, value) in catalog.to_scalar_map(Some(run.chromatography)) {
        map.insert(format!("catalog.{}", key), value);
    }
    map
}

/// Pass / fail counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictSummary {
    /// Samples with a Pass verdict
    pub passed: usize,
    /// Samples with a Fail verdict
    pub failed: usize,
    /// Samples without a verdict
    pub unknown: usize,
}

/// Everything reported about one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run record
    pub run: InstrumentRun,
    /// Scalar metadata
    pub metadata: ScalarMap,
    /// One envelope per sample and polarity, in run order
    pub samples: Vec<SampleReport>,
    /// Biological standards measured in the run
    pub biological_standards: Vec<BenchmarkReport>,
    /// Run-level isolated failures (table loads)
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// Assemble a run envelope
    pub fn new(
        run: InstrumentRun,
        metadata: ScalarMap,
        samples: Vec<SampleReport>,
        biological_standards: Vec<BenchmarkReport>,
        failures: Vec<FailureRecord>,
    ) -> Self {
        Self {
            run,
            metadata,
            samples,
            biological_standards,
            failures,
        }
    }

    /// Pass / fail counts over sample envelopes
    pub fn summary(&self) -> VerdictSummary {
        let mut summary = VerdictSummary::default();
        for sample in &self.samples {
            match sample.verdict.as_ref().map(|v| v.verdict) {
                Some(Verdict::Pass) => summary.passed += 1,
                Some(Verdict::Fail) => summary.failed += 1,
                None => summary.unknown += 1,
            }
        }
        summary
    }

    /// Verdict of a sample across polarities (any Fail fails)
    pub fn overall_verdict(&self, sample_id: &str) -> Option<Verdict> {
        aggregate(
            self.samples
                .iter()
                .filter(|s| s.sample_id == sample_id)
                .filter_map(|s| s.verdict.as_ref()),
        )
    }

    /// Envelope of a sample in one polarity
    pub fn sample(&self, sample_id: &str, polarity: Polarity) -> Option<&SampleReport> {
        self.samples
            .iter()
            .find(|s| s.sample_id == sample_id && s.polarity == polarity)
    }

    /// Every failure of the run, run-level first
    pub fn all_failures(&self) -> Vec<&FailureRecord> {
        self.failures
            .iter()
            .chain(self.samples.iter().flat_map(|s| &s.failures))
            .chain(self.biological_standards.iter().flat_map(|b| &b.failures))
            .collect()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a JSON envelope
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Panel;
    use crate::error::ErrorKind;
    use crate::matcher::SampleMatcher;
    use crate::verdict::evaluate;

    fn sample() -> Sample {
        Sample {
            sample_id: "QC01_HILIC_Pos_5".to_string(),
            polarity: Polarity::Positive,
            position: None,
            order: Some(5),
        }
    }

    fn metrics() -> SampleMetrics {
        SampleMetrics {
            sample_id: "QC01_HILIC_Pos_5".to_string(),
            polarity: Polarity::Positive,
            panel: Panel::InternalStandards,
            rows: Vec::new(),
            deltas: Vec::new(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_failed_parts_become_absent_markers() {
        let info = SampleMatcher::new(None, None).sample_info("QC01_HILIC_Pos_5");
        let report = assemble_sample(
            "RUN_001",
            &sample(),
            &info,
            Err(QcError::SourceUnavailable {
                table: "RUN_001/istd_pos_retention_time".to_string(),
                reason: "missing".to_string(),
            }),
            Ok(evaluate("QC01_HILIC_Pos_5", Polarity::Positive, &[None, None, None, None])),
        );

        assert!(report.metrics.is_none());
        assert!(report.info.is_empty());
        assert_eq!(report.verdict.as_ref().map(|v| v.verdict), Some(Verdict::Fail));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, ErrorKind::SourceUnavailable);

        let json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert!(json["metrics"].is_null());
        assert_eq!(json["verdict"]["verdict"], "Fail");
        assert_eq!(json["failures"][0]["kind"], "SourceUnavailable");
    }

    #[test]
    fn test_run_report_roundtrip_and_summary() {
        let info = SampleMatcher::new(None, None).sample_info("QC01_HILIC_Pos_5");
        let pass = assemble_sample(
            "RUN_001",
            &sample(),
            &info,
            Ok(metrics()),
            Ok(evaluate("QC01_HILIC_Pos_5", Polarity::Positive, &[Some(1.0)])),
        );
        let mut negative = sample();
        negative.polarity = Polarity::Negative;
        let fail = assemble_sample(
            "RUN_001",
            &negative,
            &info,
            Ok(metrics()),
            Ok(evaluate("QC01_HILIC_Pos_5", Polarity::Negative, &[None; 5])),
        );

        let run = InstrumentRun::new("RUN_001", "QE-1", Chromatography::Hilic);
        let metadata = run_metadata(&run, &ReferenceCatalog::builtin(), &DeltaSettings::default());
        assert_eq!(metadata["chromatography"], "HILIC");
        assert_eq!(metadata["missing_standard_fail_threshold"], 4);
        assert_eq!(metadata["catalog.HILIC.pos.Methionine d8.retention_time"], 7.479);

        let report = RunReport::new(run, metadata, vec![pass, fail], Vec::new(), Vec::new());
        assert_eq!(
            report.summary(),
            VerdictSummary {
                passed: 1,
                failed: 1,
                unknown: 0
            }
        );
        assert_eq!(report.overall_verdict("QC01_HILIC_Pos_5"), Some(Verdict::Fail));
        assert_eq!(report.overall_verdict("QC99"), None);

        let parsed = RunReport::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.run, report.run);
        assert_eq!(parsed.samples, report.samples);
        assert_eq!(parsed.summary(), report.summary());
    }
}
