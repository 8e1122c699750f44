//! Instrument runs and samples.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Chromatography, Polarity};

/// Lifecycle state of an instrument run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Samples are still being acquired
    Active,
    /// Acquisition finished
    Complete,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Active => write!(f, "Active"),
            RunStatus::Complete => write!(f, "Complete"),
        }
    }
}

/// Errors from invalid run state transitions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunStateError {
    /// The run is complete and only accepts derived metrics
    #[error("Run '{0}' is complete")]
    AlreadyComplete(String),
}

/// One instrument run (a sequence of injections on one instrument)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRun {
    /// Run identifier
    pub run_id: String,
    /// Instrument identifier
    pub instrument_id: String,
    /// Chromatography method
    pub chromatography: Chromatography,
    /// Lifecycle state
    pub status: RunStatus,
    /// Biological standards included in this run
    #[serde(default)]
    pub biological_standards: BTreeSet<String>,
    /// Samples acquired so far
    #[serde(default)]
    pub samples_completed: u32,
    /// Acquisition start, used to order historical runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Metrics appended after acquisition
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub derived_metrics: BTreeMap<String, String>,
}

impl InstrumentRun {
    /// Start a new, active run
    pub fn new(
        run_id: impl Into<String>,
        instrument_id: impl Into<String>,
        chromatography: Chromatography,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            instrument_id: instrument_id.into(),
            chromatography,
            status: RunStatus::Active,
            biological_standards: BTreeSet::new(),
            samples_completed: 0,
            started_at: None,
            derived_metrics: BTreeMap::new(),
        }
    }

    /// Add a biological standard to an active run
    pub fn with_biological_standard(mut self, name: impl Into<String>) -> Self {
        self.biological_standards.insert(name.into());
        self
    }

    /// Set the acquisition start time
    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Whether the run has finished acquisition
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    /// Count one more acquired sample
    pub fn record_sample_completed(&mut self) -> Result<u32, RunStateError> {
        if self.is_complete() {
            return Err(RunStateError::AlreadyComplete(self.run_id.clone()));
        }
        self.samples_completed += 1;
        Ok(self.samples_completed)
    }

    /// Transition Active → Complete
    pub fn mark_complete(&mut self) -> Result<(), RunStateError> {
        if self.is_complete() {
            return Err(RunStateError::AlreadyComplete(self.run_id.clone()));
        }
        self.status = RunStatus::Complete;
        Ok(())
    }

    /// Append a derived metric; allowed in any state
    pub fn append_metric(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.derived_metrics.insert(key.into(), value.into());
    }
}

/// One injection of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample identifier (acquired file name)
    pub sample_id: String,
    /// Ionization mode
    pub polarity: Polarity,
    /// Autosampler slot from the sequence table
    pub position: Option<String>,
    /// Injection order, from the numeric suffix of the identifier
    pub order: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_lifecycle() {
        let mut run = InstrumentRun::new("RUN_001", "QE-1", Chromatography::Hilic);
        assert_eq!(run.status, RunStatus::Active);
        assert_eq!(run.record_sample_completed().unwrap(), 1);
        assert_eq!(run.record_sample_completed().unwrap(), 2);

        run.mark_complete().unwrap();
        assert!(run.is_complete());
        assert_eq!(
            run.record_sample_completed(),
            Err(RunStateError::AlreadyComplete("RUN_001".to_string()))
        );
        assert!(run.mark_complete().is_err());

        // derived metrics are still accepted after completion
        run.append_metric("median_rt_shift", "0.02");
        assert_eq!(run.derived_metrics.get("median_rt_shift").map(String::as_str), Some("0.02"));
        assert_eq!(run.samples_completed, 2);
    }

    #[test]
    fn test_run_record_json() {
        let run = InstrumentRun::new("RUN_002", "QE-2", Chromatography::C18)
            .with_biological_standard("Urine")
            .with_started_at(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap());

        let json = serde_json::to_string(&run).unwrap();
        assert!(json.contains("\"chromatography\":\"C18\""));
        assert!(json.contains("\"status\":\"Active\""));
        assert!(!json.contains("derived_metrics"));
        assert_eq!(serde_json::from_str::<InstrumentRun>(&json).unwrap(), run);
    }

    #[test]
    fn test_minimal_run_record() {
        let json = r#"{"run_id":"RUN_003","instrument_id":"QE-1","chromatography":"HILIC","status":"Complete"}"#;
        let run: InstrumentRun = serde_json::from_str(json).unwrap();
        assert!(run.is_complete());
        assert!(run.biological_standards.is_empty());
        assert_eq!(run.started_at, None);
    }
}
