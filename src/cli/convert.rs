use anyhow::{Context, Result};
use log::{debug, info, warn};
use msqc::error::QcError;
use msqc::pipeline::run_requests;
use msqc::store::{gather, CancellationToken, DirectoryStore, TableStore};

/// Copy every table of a run from `source` into `target`
pub fn run(source: &DirectoryStore, target: &DirectoryStore, run_id: &str, workers: usize) -> Result<()> {
    info!("msqc convert");
    info!("============");
    info!("Run:    {}", run_id);
    info!("Source: {} ({:?})", source.root().display(), source.format());
    info!("Target: {} ({:?})", target.root().display(), target.format());

    let run = source
        .load_run(run_id)
        .with_context(|| format!("Failed to load run {}", run_id))?;
    let requests = run_requests(&run);
    let tables = gather(source, &requests, workers, &CancellationToken::new());

    target
        .save_run(&run)
        .with_context(|| format!("Failed to write run record of {}", run_id))?;

    let mut written = 0usize;
    let mut skipped = 0usize;
    for request in &requests {
        match tables.get(request) {
            Some(Ok(table)) => {
                let path = target
                    .write_table(run_id, &request.kind, table)
                    .with_context(|| format!("Failed to write {}", request))?;
                debug!("Wrote {}", path.display());
                written += 1;
            }
            Some(Err(QcError::SourceUnavailable { .. })) | None => {}
            Some(Err(err)) => {
                warn!("Skipping {}: {}", request, err);
                skipped += 1;
            }
        }
    }

    println!(
        "Converted {} tables of {} to {} ({} skipped)",
        written,
        run_id,
        target.root().display(),
        skipped
    );
    Ok(())
}
