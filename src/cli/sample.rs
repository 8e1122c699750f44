use anyhow::{Context, Result};
use msqc::pipeline::QcPipeline;

/// Show one sample in every polarity it was acquired in
pub fn run(pipeline: &QcPipeline, run_id: &str, sample_id: &str, json: bool) -> Result<()> {
    let reports = pipeline
        .evaluate_sample(run_id, sample_id)
        .with_context(|| format!("Failed to evaluate sample {} of run {}", sample_id, run_id))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize sample reports")?
        );
        return Ok(());
    }

    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", report);
    }
    Ok(())
}
