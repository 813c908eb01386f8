use std::{
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::debug;

use super::session::Session;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Comma-delimited CSV where an unquoted empty field is NULL.
pub fn copy_statement(table: &str) -> String {
    format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, DELIMITER ',', NULL '')",
        table
    )
}

/// Stream the rows of the CSV at `path`, minus its header line, into `table`.
/// The rows are part of the session's transaction until it commits.
pub async fn load_csv_to_table<D, S>(
    session: &mut D,
    storage: &S,
    path: &Path,
    table: &str,
) -> Result<u64>
where
    D: Session,
    S: Storage + ?Sized,
{
    let file = storage.open(path).map_err(Error::fs(path))?;
    let mut reader = BufReader::new(file);

    let mut header = Vec::new();
    let skipped = reader
        .read_until(b'\n', &mut header)
        .map_err(Error::fs(path))?;
    debug!(path = %path.display(), header_bytes = skipped, "skipped header line");

    session
        .copy_in(&copy_statement(table), &mut reader)
        .await
        .map_err(|source| Error::Load {
            table: table.to_string(),
            path: path.to_path_buf(),
            source,
        })
}
