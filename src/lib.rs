//! # msqc - Quality Control for LC-MS Instrument Runs
//!
//! `msqc` turns the result tables of a mass spectrometry run into per-sample
//! QC verdicts, internal standard deltas and cross-run benchmarks of
//! biological standards.
//!
//! ## Key Features
//!
//! - **Two-tier verdict**: a sample fails QC when four or more of its internal
//!   standards have no intensity.
//!
//! - **Library deltas**: retention time and m/z deviations from an immutable
//!   reference catalog, plus in-run RT deltas against the median or a chosen
//!   injection.
//!
//! - **Fault isolation**: every table load and metric is a separate `Result`;
//!   a broken table becomes an absent marker and a failure record instead of
//!   aborting the run.
//!
//! - **Concurrent gather**: a run's tables are fetched on a bounded pool of
//!   worker threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use msqc::catalog::ReferenceCatalog;
//! use msqc::pipeline::{PipelineConfig, QcPipeline};
//! use msqc::store::{DirectoryStore, StoreFormat};
//!
//! let store = DirectoryStore::new("runs", StoreFormat::Csv);
//! let pipeline = QcPipeline::new(
//!     Arc::new(store),
//!     Arc::new(ReferenceCatalog::builtin()),
//!     PipelineConfig::default(),
//! );
//!
//! let report = pipeline.evaluate_run("RUN_001")?;
//! println!("{}", report);
//! for sample in &report.samples {
//!     if let Some(verdict) = &sample.verdict {
//!         println!("{} {}: {}", sample.sample_id, sample.polarity, verdict.verdict);
//!     }
//! }
//! # Ok::<(), msqc::error::QcError>(())
//! ```
//!
//! A store root holds one directory per run:
//! ```text
//! runs/RUN_001/
//! ├── run.json                       # Run record
//! ├── sequence.csv                   # Acquisition sequence
//! ├── metadata.csv                   # Sample metadata
//! ├── istd_pos_retention_time.csv    # Sample × internal standard results
//! └── bio_urine_neg_intensity.csv    # Run × metabolite results
//! ```
//!
//! ## Modules
//!
//! - [`table`]: typed tables with CSV, Parquet and JSON transport forms
//! - [`catalog`]: reference library of internal standards and metabolites
//! - [`store`]: table stores and the concurrent gather
//! - [`matcher`]: sample lookup in sequence and metadata tables
//! - [`metrics`], [`delta`], [`verdict`]: per-sample computations
//! - [`benchmark`]: biological standard series across runs
//! - [`assembler`], [`report`]: JSON envelopes and text reports
//! - [`pipeline`]: request orchestration

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod assembler;
pub mod benchmark;
pub mod catalog;
pub mod delta;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod table;
pub mod verdict;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::assembler::{BenchmarkReport, RunReport, SampleReport, VerdictSummary};
    pub use crate::catalog::{Chromatography, LibraryEntry, Panel, Polarity, ReferenceCatalog};
    pub use crate::delta::{BaselineWindow, DeltaCalculator, DeltaSettings, InRunReference};
    pub use crate::error::{ErrorKind, FailureRecord, QcError, QcResult};
    pub use crate::model::{InstrumentRun, RunStatus, Sample};
    pub use crate::pipeline::{PipelineConfig, QcPipeline};
    pub use crate::store::{DirectoryStore, MemoryStore, StoreFormat, TableRequest, TableStore};
    pub use crate::table::{Cell, Table, TransportTable};
    pub use crate::verdict::{QcVerdict, Verdict};
}
