use anyhow::{Context, Result};
use log::info;
use msqc::pipeline::QcPipeline;
use std::path::PathBuf;

/// Evaluate a run and print the report or its JSON envelope
pub fn run(pipeline: &QcPipeline, run_id: &str, json: bool, output: Option<PathBuf>) -> Result<()> {
    info!("msqc run evaluation");
    info!("===================");
    info!("Run: {}", run_id);

    let report = pipeline
        .evaluate_run(run_id)
        .with_context(|| format!("Failed to evaluate run {}", run_id))?;

    if let Some(path) = &output {
        let envelope = report.to_json().context("Failed to serialize run report")?;
        std::fs::write(path, envelope)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    if json {
        println!("{}", report.to_json().context("Failed to serialize run report")?);
    } else {
        #[cfg(feature = "colorized_output")]
        {
            println!("{}", report.format_colored());
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            println!("{}", report);
        }
    }

    // Exit with error code if any sample failed QC
    if report.summary().failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
