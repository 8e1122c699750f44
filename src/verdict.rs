//! # QC Verdict Engine
//!
//! A sample fails QC when four or more of its internal standards have no
//! intensity reading. The threshold is fixed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::Polarity;
use crate::error::{QcError, QcResult};
use crate::matcher::find_sample_row;
use crate::table::{Cell, Table};

/// Missing-intensity count at which a sample fails
pub const MISSING_STANDARD_FAIL_THRESHOLD: usize = 4;

/// QC outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Fewer than four standards missing
    Pass,
    /// Four or more standards missing
    Fail,
}

impl Verdict {
    /// `"Pass"` or `"Fail"`
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
        }
    }

    /// Verdict for a missing-standard count
    pub fn from_missing_count(missing: usize) -> Self {
        if missing >= MISSING_STANDARD_FAIL_THRESHOLD {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one sample in one polarity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcVerdict {
    /// Sample identifier
    pub sample_id: String,
    /// Ionization mode
    pub polarity: Polarity,
    /// Outcome
    pub verdict: Verdict,
    /// Standards without an intensity reading
    pub missing_standard_count: usize,
}

/// Verdict from a sample's intensity readings, one per standard
pub fn evaluate(sample_id: &str, polarity: Polarity, intensities: &[Option<f64>]) -> QcVerdict {
    let missing = intensities.iter().filter(|v| v.is_none()).count();
    QcVerdict {
        sample_id: sample_id.to_string(),
        polarity,
        verdict: Verdict::from_missing_count(missing),
        missing_standard_count: missing,
    }
}

/// Verdict from a sample's row of an intensity table.
///
/// Every value column counts as one standard. A sample absent from the table
/// is a [`QcError::JoinMiss`].
pub fn evaluate_table(intensity: &Table, sample_id: &str, polarity: Polarity) -> QcResult<QcVerdict> {
    let row = find_sample_row(intensity, sample_id).ok_or_else(|| QcError::JoinMiss {
        key: sample_id.to_string(),
        table: intensity.name().to_string(),
    })?;
    let key = intensity.key_position();
    let readings: Vec<Option<f64>> = row
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key)
        .map(|(_, cell)| cell.as_ref().and_then(Cell::as_f64))
        .collect();
    Ok(evaluate(sample_id, polarity, &readings))
}

/// Combine per-polarity verdicts: any Fail fails. `None` when empty.
pub fn aggregate<'a>(verdicts: impl IntoIterator<Item = &'a QcVerdict>) -> Option<Verdict> {
    let mut overall = None;
    for verdict in verdicts {
        if verdict.verdict == Verdict::Fail {
            return Some(Verdict::Fail);
        }
        overall = Some(Verdict::Pass);
    }
    overall
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableSchema;

    fn readings(total: usize, missing: usize) -> Vec<Option<f64>> {
        (0..total)
            .map(|i| if i < missing { None } else { Some(1.0e6) })
            .collect()
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(evaluate("S_1", Polarity::Positive, &readings(18, 3)).verdict, Verdict::Pass);
        assert_eq!(evaluate("S_1", Polarity::Positive, &readings(18, 4)).verdict, Verdict::Fail);
        assert_eq!(evaluate("S_1", Polarity::Positive, &readings(18, 0)).verdict, Verdict::Pass);

        let verdict = evaluate("S_1", Polarity::Negative, &readings(10, 7));
        assert_eq!(verdict.missing_standard_count, 7);
        assert_eq!(verdict.verdict.to_string(), "Fail");
    }

    #[test]
    fn test_evaluate_table() {
        let csv = "Sample,A,B,C,D,E\nS_1,1,,,,5\nS_2,1,2,3,,\n";
        let table = Table::from_csv_reader(csv.as_bytes(), "intensity", &TableSchema::measurement()).unwrap();

        let s1 = evaluate_table(&table, "S_1", Polarity::Positive).unwrap();
        assert_eq!(s1.missing_standard_count, 3);
        assert_eq!(s1.verdict, Verdict::Pass);

        let err = evaluate_table(&table, "S_3", Polarity::Positive).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::JoinMiss);
    }

    #[test]
    fn test_aggregate() {
        let pass = evaluate("S_1", Polarity::Positive, &readings(18, 1));
        let fail = evaluate("S_1", Polarity::Negative, &readings(10, 5));

        assert_eq!(aggregate([&pass]), Some(Verdict::Pass));
        assert_eq!(aggregate([&pass, &fail]), Some(Verdict::Fail));
        assert_eq!(aggregate(std::iter::empty::<&QcVerdict>()), None);
    }

    #[test]
    fn test_verdict_serializes_as_word() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"Pass\"");
    }
}
