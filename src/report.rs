//! Human-readable QC reports, plain (`Display`) or colorized.

use std::fmt;

#[cfg(feature = "colorized_output")]
use console::style;
use serde_json::Value;

use crate::assembler::{BenchmarkReport, RunReport, SampleReport};
use crate::table::TransportTable;
use crate::verdict::Verdict;

/// Line status of one sample envelope
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineStatus {
    /// Pass without isolated failures
    Ok,
    /// Pass (or no verdict) with something missing
    Warning(String),
    /// QC failed
    Failed(String),
}

fn sample_status(sample: &SampleReport) -> LineStatus {
    match &sample.verdict {
        Some(v) if v.verdict == Verdict::Fail => LineStatus::Failed(format!(
            "{} standards missing",
            v.missing_standard_count
        )),
        Some(_) if sample.failures.is_empty() => LineStatus::Ok,
        Some(_) => LineStatus::Warning(format!("{} partial failures", sample.failures.len())),
        None => LineStatus::Warning("no verdict".to_string()),
    }
}

fn sample_label(sample: &SampleReport) -> String {
    let missing = sample
        .verdict
        .as_ref()
        .map(|v| format!(", {} missing", v.missing_standard_count))
        .unwrap_or_default();
    format!("{} ({}){}", sample.sample_id, sample.polarity, missing)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(v) if n.is_f64() => format!("{:.4}", v),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn write_table(f: &mut fmt::Formatter<'_>, table: &TransportTable) -> fmt::Result {
    let rows: Vec<Vec<String>> = table
        .data
        .iter()
        .map(|row| row.iter().map(value_text).collect())
        .collect();
    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|s| s.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    writeln!(f, "  {}", line(&table.columns).trim_end())?;
    for row in &rows {
        writeln!(f, "  {}", line(row).trim_end())?;
    }
    Ok(())
}

impl RunReport {
    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("msqc QC Report").bold().cyan()));
            output.push_str(&format!("{}\n", style("==============").cyan()));
            output.push_str(&format!(
                "{}: {} ({}, {}, {})\n\n",
                style("Run").bold(),
                self.run.run_id,
                self.run.chromatography,
                self.run.instrument_id,
                self.run.status
            ));

            for sample in &self.samples {
                let status = sample_status(sample);
                let (symbol, color_fn): (_, fn(&str) -> console::StyledObject<&str>) = match &status {
                    LineStatus::Ok => (OK, |s| style(s).green()),
                    LineStatus::Warning(_) => (WARN, |s| style(s).yellow()),
                    LineStatus::Failed(_) => (FAIL, |s| style(s).red()),
                };
                output.push_str(&format!("[{}] {}", symbol, color_fn(&sample_label(sample))));
                match &status {
                    LineStatus::Ok => output.push('\n'),
                    LineStatus::Warning(msg) => {
                        output.push_str(&format!(" - {}: {}\n", style("WARNING").yellow().bold(), msg));
                    }
                    LineStatus::Failed(msg) => {
                        output.push_str(&format!(" - {}: {}\n", style("FAILED").red().bold(), msg));
                    }
                }
            }

            let failures = self.all_failures();
            if !failures.is_empty() {
                output.push_str(&format!("\n{}\n", style("Isolated failures").bold()));
                for failure in failures {
                    output.push_str(&format!(
                        "  {} [{}] {}\n",
                        failure.subject,
                        style(failure.kind).yellow(),
                        failure.message
                    ));
                }
            }

            let summary = self.summary();
            output.push('\n');
            output.push_str(&format!(
                "{}: {} passed, {} failed, {} without verdict\n",
                style("Summary").bold(),
                style(summary.passed).green(),
                style(summary.failed).red(),
                style(summary.unknown).yellow()
            ));

            output.push('\n');
            if summary.failed > 0 {
                output.push_str(&format!("{}\n", style("QC FAILED").red().bold()));
            } else if summary.unknown > 0 {
                output.push_str(&format!("{}\n", style("QC INCOMPLETE").yellow().bold()));
            } else {
                output.push_str(&format!("{}\n", style("QC PASSED").green().bold()));
            }

            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "msqc QC Report")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Run: {} ({}, {}, {})",
            self.run.run_id, self.run.chromatography, self.run.instrument_id, self.run.status
        )?;
        writeln!(f)?;

        for sample in &self.samples {
            let status = sample_status(sample);
            let symbol = match &status {
                LineStatus::Ok => "✓",
                LineStatus::Warning(_) => "⚠",
                LineStatus::Failed(_) => "✗",
            };
            write!(f, "[{}] {}", symbol, sample_label(sample))?;
            match &status {
                LineStatus::Ok => writeln!(f)?,
                LineStatus::Warning(msg) => writeln!(f, " - WARNING: {}", msg)?,
                LineStatus::Failed(msg) => writeln!(f, " - FAILED: {}", msg)?,
            }
        }

        for benchmark in &self.biological_standards {
            writeln!(f)?;
            write!(f, "{}", benchmark)?;
        }

        let failures = self.all_failures();
        if !failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Isolated failures")?;
            for failure in failures {
                writeln!(f, "  {} [{}] {}", failure.subject, failure.kind, failure.message)?;
            }
        }

        let summary = self.summary();
        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} passed, {} failed, {} without verdict",
            summary.passed, summary.failed, summary.unknown
        )?;
        writeln!(f)?;
        if summary.failed > 0 {
            writeln!(f, "QC FAILED")?;
        } else if summary.unknown > 0 {
            writeln!(f, "QC INCOMPLETE")?;
        } else {
            writeln!(f, "QC PASSED")?;
        }
        Ok(())
    }
}

impl fmt::Display for SampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) in {}", self.sample_id, self.polarity, self.run_id)?;
        if let Some(position) = &self.position {
            writeln!(f, "Position: {}", position)?;
        }
        match &self.verdict {
            Some(v) => writeln!(f, "QC: {} ({} standards missing)", v.verdict, v.missing_standard_count)?,
            None => writeln!(f, "QC: -")?,
        }

        writeln!(f)?;
        if self.info.is_empty() {
            writeln!(f, "Sample information: none")?;
        } else {
            writeln!(f, "Sample information")?;
            write_table(f, &self.info)?;
        }

        writeln!(f)?;
        match &self.metrics {
            Some(metrics) => {
                writeln!(f, "Metrics")?;
                write_table(f, metrics)?;
            }
            None => writeln!(f, "Metrics: unavailable")?,
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            for failure in &self.failures {
                writeln!(f, "  {} [{}] {}", failure.subject, failure.kind, failure.message)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}, {})", self.standard, self.chromatography, self.polarity)?;
        let runs_with_data = self.runs.iter().filter(|r| r.metrics.is_some()).count();
        writeln!(f, "Runs: {} ({} with data)", self.runs.len(), runs_with_data)?;

        for (title, table) in [
            ("Intensity", &self.intensity),
            ("% Change vs Other Runs", &self.percent_change_other_runs),
            ("% Change vs Prior Runs", &self.percent_change_prior_runs),
        ] {
            if let Some(table) = table {
                writeln!(f, "{}", title)?;
                write_table(f, table)?;
            }
        }

        for failure in &self.failures {
            writeln!(f, "  {} [{}] {}", failure.subject, failure.kind, failure.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Chromatography, Polarity};
    use crate::error::{ErrorKind, FailureRecord};
    use crate::model::InstrumentRun;
    use crate::verdict::evaluate;

    fn sample(sample_id: &str, missing: usize, failures: Vec<FailureRecord>) -> SampleReport {
        let readings: Vec<Option<f64>> = (0..18).map(|i| if i < missing { None } else { Some(1.0) }).collect();
        SampleReport {
            run_id: "RUN_001".to_string(),
            sample_id: sample_id.to_string(),
            polarity: Polarity::Positive,
            position: None,
            order: None,
            info: TransportTable::default(),
            metrics: None,
            deltas: None,
            verdict: Some(evaluate(sample_id, Polarity::Positive, &readings)),
            failures,
        }
    }

    #[test]
    fn test_plain_report() {
        let failure = FailureRecord {
            subject: "RUN_001/istd_pos_precursor_mz".to_string(),
            kind: ErrorKind::ParseError,
            message: "bad row".to_string(),
        };
        let report = RunReport::new(
            InstrumentRun::new("RUN_001", "QE-1", Chromatography::Hilic),
            Default::default(),
            vec![sample("S_2", 0, Vec::new()), sample("S_1", 4, vec![failure])],
            Vec::new(),
            Vec::new(),
        );

        let text = report.to_string();
        assert!(text.contains("[✓] S_2 (pos), 0 missing"));
        assert!(text.contains("[✗] S_1 (pos), 4 missing - FAILED: 4 standards missing"));
        assert!(text.contains("[ParseError] bad row"));
        assert!(text.contains("Summary: 1 passed, 1 failed, 0 without verdict"));
        assert!(text.trim_end().ends_with("QC FAILED"));
    }

    #[test]
    fn test_sample_report_tables() {
        let mut report = sample("S_1", 1, Vec::new());
        report.metrics = Some(TransportTable {
            columns: vec!["Internal Standard".to_string(), "RT".to_string()],
            index: vec![0],
            data: vec![vec![Value::from("Methionine d8"), Value::from(7.55)]],
        });

        let text = report.to_string();
        assert!(text.contains("QC: Pass (1 standards missing)"));
        assert!(text.contains("Sample information: none"));
        assert!(text.contains("Methionine d8     | 7.5500"));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&Value::Null), "-");
        assert_eq!(value_text(&Value::from(3)), "3");
        assert_eq!(value_text(&Value::from("Pass")), "Pass");
    }
}
