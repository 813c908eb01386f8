// src/normalize/mod.rs
pub mod column;

use csv::{ByteRecord, ReaderBuilder, Terminator, WriterBuilder};
use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use thiserror::Error as ThisError;
use tracing::{info, warn};

pub use column::{header_name, is_index_artifact, normalize_column_name};

use crate::error::{Error, Result};
use crate::storage::Storage;

const RAW_SUFFIX: &str = ".csv";
const CLEAN_SUFFIX: &str = "_clean.csv";

/// What `normalize_table` did to one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSummary {
    /// Normalized names of the columns that were kept, in order.
    pub columns: Vec<String>,
    /// Normalized names of the index-artifact columns that were dropped.
    pub dropped: Vec<String>,
    pub rows: u64,
}

/// One raw file written out as a clean file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFile {
    pub source: String,
    pub destination: String,
    pub summary: TableSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub files: Vec<NormalizedFile>,
}

/// Why a table could not be normalized.
#[derive(ThisError, Debug)]
pub enum TableError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("record on line {line} has {found} fields, header has {expected}")]
    TooManyFields {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// `<name>.csv` -> `<name>_clean.csv`.
pub fn clean_file_name(raw_name: &str) -> String {
    let stem = raw_name.strip_suffix(RAW_SUFFIX).unwrap_or(raw_name);
    format!("{}{}", stem, CLEAN_SUFFIX)
}

/// Copy a CSV table from `input` to `output`, normalizing the header row and
/// leaving out index-artifact columns. Field bytes are copied untouched.
///
/// Records shorter than the header are padded with empty fields; records
/// longer than the header are rejected.
pub fn normalize_table<R: Read, W: Write>(
    input: R,
    output: W,
) -> std::result::Result<TableSummary, TableError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let headers = rdr.byte_headers()?.clone();
    let width = headers.len();

    let mut summary = TableSummary::default();
    // no header row at all: the clean file is left empty instead of failing the run
    if headers.is_empty() {
        return Ok(summary);
    }

    let mut keep = Vec::with_capacity(headers.len());
    for (idx, raw) in headers.iter().enumerate() {
        let name = header_name(&String::from_utf8_lossy(raw), idx);
        if is_index_artifact(&name) {
            summary.dropped.push(name);
        } else {
            keep.push(idx);
            summary.columns.push(name);
        }
    }

    let mut wtr = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(output);
    wtr.write_record(&summary.columns)?;

    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record)? {
        if record.len() > width {
            return Err(TableError::TooManyFields {
                line: record.position().map_or(summary.rows + 2, |p| p.line()),
                expected: width,
                found: record.len(),
            });
        }
        wtr.write_record(keep.iter().map(|&i| record.get(i).unwrap_or_default()))?;
        summary.rows += 1;
    }
    wtr.flush().map_err(csv::Error::from)?;

    Ok(summary)
}

/// Rewrites every `*.csv` in `raw_dir` into `clean_dir`.
pub struct Normalizer<S: Storage> {
    raw_dir: PathBuf,
    clean_dir: PathBuf,
    storage: S,
}

impl<S: Storage> Normalizer<S> {
    pub fn new(raw_dir: impl Into<PathBuf>, clean_dir: impl Into<PathBuf>, storage: S) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            clean_dir: clean_dir.into(),
            storage,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Normalize the raw directory in filename order. The first malformed file
    /// aborts the run; files written before it stay in place.
    #[tracing::instrument(level = "info", skip(self), fields(raw = %self.raw_dir.display(), clean = %self.clean_dir.display()))]
    pub fn run(&self) -> Result<NormalizeReport> {
        let start = Instant::now();
        self.storage
            .create_dir_all(&self.clean_dir)
            .map_err(Error::fs(&self.clean_dir))?;

        let mut names: Vec<String> = self
            .storage
            .list_files(&self.raw_dir)
            .map_err(Error::fs(&self.raw_dir))?
            .into_iter()
            .filter(|name| name.ends_with(RAW_SUFFIX))
            .collect();
        names.sort();

        let mut report = NormalizeReport::default();
        for name in names {
            let file = self.normalize_file(&name)?;
            info!(
                rows = file.summary.rows,
                dropped = ?file.summary.dropped,
                "[OK] {} → {}",
                file.source,
                file.destination
            );
            report.files.push(file);
        }

        info!(files = report.files.len(), elapsed = ?start.elapsed(), "normalization done");
        Ok(report)
    }

    fn normalize_file(&self, name: &str) -> Result<NormalizedFile> {
        let source = self.raw_dir.join(name);
        let destination = clean_file_name(name);
        let target = self.clean_dir.join(&destination);

        let input = self.storage.open(&source).map_err(Error::fs(&source))?;
        let mut buf = Vec::new();
        let summary = normalize_table(input, &mut buf).map_err(|err| classify(&source, err))?;
        if summary.columns.is_empty() && summary.dropped.is_empty() {
            warn!(file = %name, "no header row; writing empty clean file");
        }

        self.storage
            .write(&target, &buf)
            .map_err(Error::fs(&target))?;

        Ok(NormalizedFile {
            source: name.to_string(),
            destination,
            summary,
        })
    }
}

fn classify(path: &Path, err: TableError) -> Error {
    match err {
        TableError::Csv(err) if err.is_io_error() => Error::fs(path)(io::Error::from(err)),
        err => Error::Parse {
            path: path.to_path_buf(),
            source: err,
        },
    }
}
