use std::{io, path::PathBuf};
use thiserror::Error;

use crate::normalize::TableError;

/// Coarse category of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileSystem,
    Parse,
    Connection,
    Load,
    Config,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("filesystem error at {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("COPY into {table} from {} failed: {source}", .path.display())]
    Load {
        table: String,
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileSystem { .. } => ErrorKind::FileSystem,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Load { .. } | Error::Commit(_) => ErrorKind::Load,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
        let path = path.into();
        move |source| Error::FileSystem { path, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
