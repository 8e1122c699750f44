use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{TableKind, TableRequest, TableStore};
use crate::error::{QcError, QcResult};
use crate::model::InstrumentRun;
use crate::table::{Table, TableError};

/// Run record file inside each run directory
pub const RUN_FILE: &str = "run.json";

/// On-disk format of a [`DirectoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// Comma separated values
    #[default]
    Csv,
    /// Apache Parquet
    Parquet,
}

impl StoreFormat {
    /// File extension
    pub fn extension(&self) -> &'static str {
        match self {
            StoreFormat::Csv => "csv",
            StoreFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for StoreFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(StoreFormat::Csv),
            "parquet" => Ok(StoreFormat::Parquet),
            other => Err(format!("unknown store format: {}", other)),
        }
    }
}

/// Tables stored as files under `<root>/<run_id>/`.
///
/// ```text
/// <root>/<run_id>/run.json
/// <root>/<run_id>/sequence.csv
/// <root>/<run_id>/istd_pos_retention_time.csv
/// <root>/<run_id>/bio_urine_neg_intensity.csv
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    format: StoreFormat,
}

impl DirectoryStore {
    /// Store rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P, format: StoreFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File format
    pub fn format(&self) -> StoreFormat {
        self.format
    }

    /// Directory of one run
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Path of a requested table
    pub fn table_path(&self, request: &TableRequest) -> PathBuf {
        self.run_dir(&request.run_id).join(format!(
            "{}.{}",
            request.kind.file_stem(),
            self.format.extension()
        ))
    }

    /// Write one table of a run, creating the run directory if needed
    pub fn write_table(&self, run_id: &str, kind: &TableKind, table: &Table) -> Result<PathBuf, TableError> {
        fs::create_dir_all(self.run_dir(run_id))?;
        let path = self.table_path(&TableRequest::new(run_id, kind.clone()));
        match self.format {
            StoreFormat::Csv => table.write_csv(&path)?,
            StoreFormat::Parquet => table.write_parquet(&path)?,
        }
        Ok(path)
    }

    /// Write the run record
    pub fn save_run(&self, run: &InstrumentRun) -> Result<PathBuf, TableError> {
        fs::create_dir_all(self.run_dir(&run.run_id))?;
        let path = self.run_dir(&run.run_id).join(RUN_FILE);
        fs::write(&path, serde_json::to_string_pretty(run)?)?;
        Ok(path)
    }
}

impl TableStore for DirectoryStore {
    fn fetch(&self, request: &TableRequest) -> QcResult<Table> {
        let path = self.table_path(request);
        let name = request.table_name();
        if !path.is_file() {
            return Err(QcError::SourceUnavailable {
                table: name,
                reason: format!("{} not found", path.display()),
            });
        }

        debug!("Reading {}", path.display());
        let schema = request.kind.schema();
        let loaded = match self.format {
            StoreFormat::Csv => Table::from_csv_path(&path, &name, &schema),
            StoreFormat::Parquet => Table::read_parquet(&path).map(|t| t.with_name(name.clone())),
        };

        let table = loaded.map_err(|err| match err {
            TableError::IoError(io) => QcError::SourceUnavailable {
                table: name.clone(),
                reason: io.to_string(),
            },
            other => QcError::parse(name.clone(), &other),
        })?;

        schema.validate(&table).map_err(|err| QcError::SchemaMismatch {
            table: name,
            detail: err.to_string(),
        })?;
        Ok(table)
    }

    fn load_run(&self, run_id: &str) -> QcResult<InstrumentRun> {
        let path = self.run_dir(run_id).join(RUN_FILE);
        let table = format!("{}/{}", run_id, RUN_FILE);
        let content = fs::read_to_string(&path).map_err(|err| QcError::SourceUnavailable {
            table: table.clone(),
            reason: err.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|err| QcError::Parse {
            table,
            detail: err.to_string(),
        })
    }

    fn run_ids(&self) -> QcResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|err| QcError::SourceUnavailable {
            table: self.root.display().to_string(),
            reason: err.to_string(),
        })?;

        let mut run_ids: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.join(RUN_FILE).is_file())
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        run_ids.sort();
        Ok(run_ids)
    }
}
