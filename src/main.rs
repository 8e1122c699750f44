//! # msqc
//!
//! Command-line front end for LC-MS run quality control.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate every sample of a run
//! msqc --root runs run RUN_001
//!
//! # One sample, as JSON
//! msqc sample RUN_001 QC01_HILIC_Pos_5 --json
//!
//! # Urine benchmark over three runs
//! msqc benchmark Urine --runs RUN_001,RUN_002,RUN_003
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
