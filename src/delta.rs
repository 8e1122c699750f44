//! # Delta Calculator
//!
//! Deviations of measured readings from reference values:
//!
//! - **Library delta**: measured − catalog reference (RT in minutes, m/z in Da)
//! - **In-run delta**: measured RT − the standard's reference RT within the run,
//!   either the median across the run's samples or a designated injection
//! - **ppm error**: library m/z delta relative to the library m/z
//! - **Percent change**: deviation of a benchmark reading from a baseline mean
//!
//! [`DeltaTolerances`] turns deltas into warning and fail reasons on a
//! [`DeltaRecord`]. Those reasons annotate the metrics; they never change the
//! QC verdict.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{Chromatography, LibraryEntry, Panel, Polarity, ReferenceCatalog};
use crate::error::{QcError, QcResult};
use crate::matcher::find_sample_row;
use crate::table::{Cell, Table};

/// Default half width of the library RT display window, in minutes
pub const DEFAULT_RT_WINDOW: f64 = 0.1;

/// Library delta: `measured - library`
pub fn library_delta(measured: f64, library: f64) -> f64 {
    measured - library
}

/// Parts-per-million error of a measured m/z
pub fn ppm_error(measured: f64, library: f64) -> f64 {
    (measured - library) / library * 1e6
}

/// RT window `[library - half_width, library + half_width]`
pub fn rt_window(library_rt: f64, half_width: f64) -> (f64, f64) {
    (library_rt - half_width, library_rt + half_width)
}

/// Percent change of `current` from `baseline_mean`.
///
/// A zero baseline clamps to 100 (or 0 when `current` is also 0).
pub fn percent_change(current: f64, baseline_mean: f64) -> f64 {
    if baseline_mean == 0.0 {
        return if current == 0.0 { 0.0 } else { 100.0 };
    }
    (current - baseline_mean).abs() / baseline_mean.abs() * 100.0
}

/// Median of the given values
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Which runs of a series form the baseline of a percent change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineWindow {
    /// Every run except the current one
    OtherRuns,
    /// Runs up to and including the current one
    PriorRuns,
}

impl BaselineWindow {
    /// Both windows
    pub const ALL: [BaselineWindow; 2] = [BaselineWindow::OtherRuns, BaselineWindow::PriorRuns];

    /// Column label used in benchmark tables
    pub fn label(&self) -> &'static str {
        match self {
            BaselineWindow::OtherRuns => "% Change vs Other Runs",
            BaselineWindow::PriorRuns => "% Change vs Prior Runs",
        }
    }
}

/// Baseline mean for `values[index]` under `window`
pub fn baseline_mean(values: &[f64], index: usize, window: BaselineWindow) -> Option<f64> {
    if index >= values.len() {
        return None;
    }
    let baseline: Vec<f64> = match window {
        BaselineWindow::OtherRuns => values
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, v)| *v)
            .collect(),
        BaselineWindow::PriorRuns => values[..=index].to_vec(),
    };
    if baseline.is_empty() {
        return None;
    }
    Some(baseline.iter().sum::<f64>() / baseline.len() as f64)
}

/// Percent change of `values[index]` against its baseline.
///
/// A comparison set of one run yields 0; an out of range index yields `None`.
pub fn series_percent_change(values: &[f64], index: usize, window: BaselineWindow) -> Option<f64> {
    let current = *values.get(index)?;
    if values.len() == 1 {
        return Some(0.0);
    }
    baseline_mean(values, index, window).map(|baseline| percent_change(current, baseline))
}

/// Where the in-run reference RT of a standard comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InRunReference {
    /// Median RT across every sample of the run
    #[default]
    Median,
    /// RT in one designated reference injection
    Injection(String),
}

impl FromStr for InRunReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("in-run reference must be 'median' or a sample id".to_string());
        }
        if s.eq_ignore_ascii_case("median") {
            Ok(InRunReference::Median)
        } else {
            Ok(InRunReference::Injection(s.to_string()))
        }
    }
}

impl TryFrom<String> for InRunReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InRunReference> for String {
    fn from(value: InRunReference) -> Self {
        value.to_string()
    }
}

impl fmt::Display for InRunReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InRunReference::Median => write!(f, "median"),
            InRunReference::Injection(sample_id) => write!(f, "{}", sample_id),
        }
    }
}

/// In-run reference RT per standard, from a run's RT table.
///
/// Standards without any reading are left out. A designated reference
/// injection absent from the table is a [`QcError::JoinMiss`].
pub fn in_run_reference_rts(rt: &Table, reference: &InRunReference) -> QcResult<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    match reference {
        InRunReference::Median => {
            for (position, column) in rt.columns().iter().enumerate() {
                if position == rt.key_position() {
                    continue;
                }
                let values: Vec<f64> = rt
                    .rows()
                    .iter()
                    .filter_map(|row| row[position].as_ref().and_then(Cell::as_f64))
                    .collect();
                if let Some(m) = median(&values) {
                    out.insert(column.name.clone(), m);
                }
            }
        }
        InRunReference::Injection(sample_id) => {
            let row = find_sample_row(rt, sample_id).ok_or_else(|| QcError::JoinMiss {
                key: sample_id.clone(),
                table: rt.name().to_string(),
            })?;
            for (position, column) in rt.columns().iter().enumerate() {
                if position == rt.key_position() {
                    continue;
                }
                if let Some(value) = row[position].as_ref().and_then(Cell::as_f64) {
                    out.insert(column.name.clone(), value);
                }
            }
        }
    }
    Ok(out)
}

/// Warning and fail thresholds on absolute deltas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaTolerances {
    /// Library RT delta (min) above which a warning is raised
    pub delta_rt_warn: f64,
    /// Library RT delta (min) above which a fail reason is raised
    pub delta_rt_fail: f64,
    /// In-run RT delta (min) warning threshold
    pub in_run_delta_rt_warn: f64,
    /// In-run RT delta (min) fail threshold
    pub in_run_delta_rt_fail: f64,
    /// m/z error (ppm) warning threshold
    pub delta_mz_ppm_warn: f64,
    /// m/z error (ppm) fail threshold
    pub delta_mz_ppm_fail: f64,
}

impl Default for DeltaTolerances {
    fn default() -> Self {
        Self {
            delta_rt_warn: 0.1,
            delta_rt_fail: 0.2,
            in_run_delta_rt_warn: 0.05,
            in_run_delta_rt_fail: 0.1,
            delta_mz_ppm_warn: 5.0,
            delta_mz_ppm_fail: 10.0,
        }
    }
}

impl DeltaTolerances {
    /// Add warning and fail reasons to `record`
    pub fn flag(&self, record: &mut DeltaRecord, intensity_present: bool) {
        let checks = [
            (record.delta_rt_vs_library, self.delta_rt_warn, self.delta_rt_fail, Reason::DeltaRt),
            (
                record.delta_rt_vs_in_run,
                self.in_run_delta_rt_warn,
                self.in_run_delta_rt_fail,
                Reason::InRunDeltaRt,
            ),
            (record.delta_mz_ppm, self.delta_mz_ppm_warn, self.delta_mz_ppm_fail, Reason::DeltaMz),
        ];
        for (value, warn, fail, reason) in checks {
            let Some(value) = value else { continue };
            if value.abs() > fail {
                record.fails.insert(reason);
            } else if value.abs() > warn {
                record.warnings.insert(reason);
            }
        }
        if !intensity_present {
            record.fails.insert(Reason::MissingIntensity);
        }
    }
}

/// Delta configuration (`[delta]` in msqc.toml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaSettings {
    /// Source of the in-run reference RT
    pub in_run_reference: InRunReference,
    /// Half width of the library RT window (min)
    pub rt_window: f64,
    /// Warning and fail thresholds
    #[serde(flatten)]
    pub tolerances: DeltaTolerances,
}

impl Default for DeltaSettings {
    fn default() -> Self {
        Self {
            in_run_reference: InRunReference::Median,
            rt_window: DEFAULT_RT_WINDOW,
            tolerances: DeltaTolerances::default(),
        }
    }
}

/// Why a standard was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reason {
    /// Library RT delta out of tolerance
    #[serde(rename = "Delta RT")]
    DeltaRt,
    /// In-run RT delta out of tolerance
    #[serde(rename = "In-Run Delta RT")]
    InRunDeltaRt,
    /// m/z error out of tolerance
    #[serde(rename = "Delta m/z")]
    DeltaMz,
    /// No intensity reading
    #[serde(rename = "Missing Intensity")]
    MissingIntensity,
}

impl Reason {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::DeltaRt => "Delta RT",
            Reason::InRunDeltaRt => "In-Run Delta RT",
            Reason::DeltaMz => "Delta m/z",
            Reason::MissingIntensity => "Missing Intensity",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deltas of one standard in one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    /// Sample identifier
    pub sample_id: String,
    /// Standard or metabolite name
    pub standard: String,
    /// Measured RT − library RT
    pub delta_rt_vs_library: Option<f64>,
    /// Measured RT − in-run reference RT
    pub delta_rt_vs_in_run: Option<f64>,
    /// Measured m/z − library m/z
    pub delta_mz_vs_library: Option<f64>,
    /// m/z error in ppm
    pub delta_mz_ppm: Option<f64>,
    /// Warning reasons
    pub warnings: BTreeSet<Reason>,
    /// Fail reasons
    pub fails: BTreeSet<Reason>,
}

impl DeltaRecord {
    /// Empty record for a sample and standard
    pub fn new(sample_id: impl Into<String>, standard: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            standard: standard.into(),
            ..Default::default()
        }
    }
}

/// Computes deltas for one method, polarity and panel
#[derive(Debug, Clone)]
pub struct DeltaCalculator<'a> {
    catalog: &'a ReferenceCatalog,
    chromatography: Chromatography,
    polarity: Polarity,
    panel: Panel,
    in_run: BTreeMap<String, f64>,
    settings: DeltaSettings,
}

impl<'a> DeltaCalculator<'a> {
    /// Calculator with default settings and no in-run reference
    pub fn new(
        catalog: &'a ReferenceCatalog,
        chromatography: Chromatography,
        polarity: Polarity,
        panel: Panel,
    ) -> Self {
        Self {
            catalog,
            chromatography,
            polarity,
            panel,
            in_run: BTreeMap::new(),
            settings: DeltaSettings::default(),
        }
    }

    /// Use these settings
    pub fn with_settings(mut self, settings: DeltaSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use these in-run reference RTs
    pub fn with_in_run_reference(mut self, in_run: BTreeMap<String, f64>) -> Self {
        self.in_run = in_run;
        self
    }

    /// Settings in use
    pub fn settings(&self) -> &DeltaSettings {
        &self.settings
    }

    /// Polarity
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Panel
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    /// Library entry of a standard
    pub fn reference(&self, name: &str) -> QcResult<&'a LibraryEntry> {
        self.catalog
            .entry(self.chromatography, &self.panel, self.polarity, name)
    }

    /// Measured RT − library RT
    pub fn delta_rt(&self, name: &str, measured_rt: f64) -> QcResult<f64> {
        Ok(library_delta(measured_rt, self.reference(name)?.retention_time))
    }

    /// Measured m/z − library m/z
    pub fn delta_mz(&self, name: &str, measured_mz: f64) -> QcResult<f64> {
        Ok(library_delta(measured_mz, self.reference(name)?.precursor_mz))
    }

    /// ppm error of a library m/z delta
    pub fn delta_mz_ppm(&self, name: &str, delta_mz: f64) -> QcResult<f64> {
        let library = self.reference(name)?.precursor_mz;
        Ok(ppm_error(library + delta_mz, library))
    }

    /// Measured RT − in-run reference RT; `None` without a reference for `name`
    pub fn in_run_delta_rt(&self, name: &str, measured_rt: f64) -> Option<f64> {
        self.in_run.get(name).map(|reference| measured_rt - reference)
    }

    /// Library RT display window
    pub fn window(&self, name: &str) -> QcResult<(f64, f64)> {
        Ok(rt_window(self.reference(name)?.retention_time, self.settings.rt_window))
    }

    /// Apply the configured tolerances to a record
    pub fn flag(&self, record: &mut DeltaRecord, intensity_present: bool) {
        self.settings.tolerances.flag(record, intensity_present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableSchema;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_methionine_library_delta() {
        let catalog = ReferenceCatalog::builtin();
        let calc = DeltaCalculator::new(
            &catalog,
            Chromatography::Hilic,
            Polarity::Positive,
            Panel::InternalStandards,
        );

        assert!(close(calc.delta_rt("Methionine d8", 7.55).unwrap(), 0.071));
        let (low, high) = calc.window("Methionine d8").unwrap();
        assert!(close(low, 7.379));
        assert!(close(high, 7.579));
    }

    #[test]
    fn test_unknown_standard_is_reference_not_found() {
        let catalog = ReferenceCatalog::builtin();
        let calc = DeltaCalculator::new(
            &catalog,
            Chromatography::Hilic,
            Polarity::Negative,
            Panel::InternalStandards,
        );
        let err = calc.delta_rt("Methionine d8", 7.55).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ReferenceNotFound);
    }

    #[test]
    fn test_percent_change() {
        assert!(close(percent_change(150.0, 100.0), 50.0));
        assert!(close(percent_change(50.0, 100.0), 50.0));
        assert_eq!(percent_change(10.0, 0.0), 100.0);
        assert_eq!(percent_change(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_single_run_series_is_zero() {
        for window in BaselineWindow::ALL {
            assert_eq!(series_percent_change(&[1.0e6], 0, window), Some(0.0));
        }
        assert_eq!(series_percent_change(&[], 0, BaselineWindow::OtherRuns), None);
    }

    #[test]
    fn test_baseline_windows() {
        let values = [100.0, 200.0, 300.0];
        assert_eq!(baseline_mean(&values, 0, BaselineWindow::OtherRuns), Some(250.0));
        assert_eq!(baseline_mean(&values, 1, BaselineWindow::PriorRuns), Some(150.0));
        assert_eq!(baseline_mean(&values, 0, BaselineWindow::PriorRuns), Some(100.0));

        let change = series_percent_change(&values, 2, BaselineWindow::PriorRuns).unwrap();
        assert!(close(change, 50.0));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_in_run_reference() {
        let csv = "Sample,Methionine d8,Creatinine d3\nS_1,7.50,4.20\nS_2,7.60,\nS_3,7.55,4.30\n";
        let rt = Table::from_csv_reader(csv.as_bytes(), "rt", &TableSchema::measurement()).unwrap();

        let median = in_run_reference_rts(&rt, &InRunReference::Median).unwrap();
        assert!(close(median["Methionine d8"], 7.55));
        assert!(close(median["Creatinine d3"], 4.25));

        let injection = in_run_reference_rts(&rt, &InRunReference::Injection("S_2".to_string())).unwrap();
        assert!(close(injection["Methionine d8"], 7.60));
        assert!(!injection.contains_key("Creatinine d3"));

        let err = in_run_reference_rts(&rt, &InRunReference::Injection("S_9".to_string())).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::JoinMiss);
    }

    #[test]
    fn test_tolerance_flags() {
        let tolerances = DeltaTolerances::default();
        let mut record = DeltaRecord::new("S_1", "Methionine d8");
        record.delta_rt_vs_library = Some(0.15);
        record.delta_rt_vs_in_run = Some(-0.2);
        record.delta_mz_ppm = Some(1.0);

        tolerances.flag(&mut record, false);
        assert!(record.warnings.contains(&Reason::DeltaRt));
        assert!(record.fails.contains(&Reason::InRunDeltaRt));
        assert!(record.fails.contains(&Reason::MissingIntensity));
        assert!(!record.warnings.contains(&Reason::DeltaMz));
    }

    #[test]
    fn test_in_run_reference_parsing() {
        assert_eq!("median".parse::<InRunReference>(), Ok(InRunReference::Median));
        assert_eq!(
            "QC01_HILIC_Pos_1".parse::<InRunReference>(),
            Ok(InRunReference::Injection("QC01_HILIC_Pos_1".to_string()))
        );
        assert!("  ".parse::<InRunReference>().is_err());
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: DeltaSettings = toml::from_str(
            r#"
            in_run_reference = "QC01_HILIC_Pos_1"
            rt_window = 0.2
            delta_rt_fail = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(settings.in_run_reference, InRunReference::Injection("QC01_HILIC_Pos_1".to_string()));
        assert_eq!(settings.rt_window, 0.2);
        assert_eq!(settings.tolerances.delta_rt_fail, 0.3);
        assert_eq!(settings.tolerances.delta_rt_warn, 0.1);
    }
}
