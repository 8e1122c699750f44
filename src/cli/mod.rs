use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use msqc::catalog::Chromatography;
use msqc::pipeline::QcPipeline;
use msqc::store::{DirectoryStore, StoreFormat};
use std::path::PathBuf;
use std::sync::Arc;

mod benchmark;
mod catalog;
mod convert;
mod run;
mod sample;

mod config;

pub use config::Config;

/// msqc - QC verdicts and benchmarks for LC-MS instrument runs
#[derive(Parser)]
#[command(name = "msqc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Load settings from a TOML config file (defaults to ./msqc.toml if present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per run
    #[arg(long, value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Table file format of the store
    #[arg(long, value_enum, global = true)]
    format: Option<FormatArg>,

    /// Concurrent table fetches
    #[arg(short = 'j', long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

/// Store format flag.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    /// Comma separated values
    Csv,
    /// Apache Parquet
    Parquet,
}

impl From<FormatArg> for StoreFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => StoreFormat::Csv,
            FormatArg::Parquet => StoreFormat::Parquet,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every sample of a run
    Run {
        /// Run identifier
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Print the JSON envelope instead of the report
        #[arg(long)]
        json: bool,

        /// Write the JSON envelope to a file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show one sample's information, metrics and verdict
    Sample {
        /// Run identifier
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Sample identifier
        #[arg(value_name = "SAMPLE_ID")]
        sample_id: String,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Benchmark a biological standard across runs
    Benchmark {
        /// Biological standard name
        #[arg(value_name = "STANDARD")]
        standard: String,

        /// Runs to compare (comma separated); all runs in the store when omitted
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        runs: Option<Vec<String>>,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Print the reference catalog as a flat key/value map
    Catalog {
        /// Only this chromatography method
        #[arg(long)]
        chromatography: Option<Chromatography>,

        /// Print JSON instead of `key = value` lines
        #[arg(long)]
        json: bool,
    },

    /// Copy a run's tables into a Parquet store
    Convert {
        /// Run identifier
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Root of the Parquet store
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// Resolved settings shared by every command
struct Context {
    config: Config,
    root: PathBuf,
    format: StoreFormat,
    workers: Option<usize>,
}

impl Context {
    fn store(&self) -> DirectoryStore {
        DirectoryStore::new(self.root.clone(), self.format)
    }

    fn pipeline(&self) -> Result<QcPipeline> {
        let catalog = self.config.load_catalog()?;
        Ok(QcPipeline::new(
            Arc::new(self.store()),
            Arc::new(catalog),
            self.config.pipeline_config(self.workers),
        ))
    }
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::discover(cli.config.as_deref())?;
    let ctx = Context {
        root: config.store_root(cli.root),
        format: config.store_format(cli.format.map(StoreFormat::from)),
        workers: cli.workers,
        config,
    };

    match cli.command {
        Commands::Run {
            run_id,
            json,
            output,
        } => run::run(&ctx.pipeline()?, &run_id, json, output),
        Commands::Sample {
            run_id,
            sample_id,
            json,
        } => sample::run(&ctx.pipeline()?, &run_id, &sample_id, json),
        Commands::Benchmark {
            standard,
            runs,
            json,
        } => benchmark::run(&ctx.pipeline()?, &standard, runs, json),
        Commands::Catalog {
            chromatography,
            json,
        } => catalog::run(&ctx.config.load_catalog()?, chromatography, json),
        Commands::Convert { run_id, output } => convert::run(
            &ctx.store(),
            &DirectoryStore::new(output, StoreFormat::Parquet),
            &run_id,
            ctx.config.pipeline_config(ctx.workers).workers,
        ),
    }
}
