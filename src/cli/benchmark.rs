use anyhow::{Context, Result};
use log::info;
use msqc::pipeline::QcPipeline;

/// Benchmark a biological standard over the given runs (all runs if `None`)
pub fn run(pipeline: &QcPipeline, standard: &str, runs: Option<Vec<String>>, json: bool) -> Result<()> {
    match &runs {
        Some(runs) => info!("Benchmarking {} over {} runs", standard, runs.len()),
        None => info!("Benchmarking {} over every run in the store", standard),
    }

    let reports = pipeline
        .benchmark(standard, runs.as_deref())
        .with_context(|| format!("Failed to benchmark {}", standard))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize benchmarks")?
        );
        return Ok(());
    }

    if reports.is_empty() {
        println!("No runs with {} data", standard);
    }
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", report);
    }
    Ok(())
}
