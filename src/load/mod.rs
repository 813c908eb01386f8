// src/load/mod.rs
pub mod copy;
pub mod mapping;
pub mod session;

use sqlx::Connection;
use std::{path::PathBuf, time::Instant};
use tracing::info;

pub use copy::{copy_statement, load_csv_to_table};
pub use mapping::{default_mapping, parse_mapping, read_mapping, MappingEntry};
pub use session::{connect, PgSession, Session};

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub file: String,
    pub table: String,
    pub rows: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<LoadedFile>,
    /// Mapping entries whose clean file was not present.
    pub skipped: Vec<String>,
}

/// Copies the clean files named by a mapping into their tables, inside one
/// transaction that is committed only after every entry has been handled.
pub struct Loader<S: Storage> {
    entries: Vec<MappingEntry>,
    clean_dir: PathBuf,
    storage: S,
}

impl<S: Storage> Loader<S> {
    pub fn new(
        entries: Vec<MappingEntry>,
        clean_dir: impl Into<PathBuf>,
        storage: S,
    ) -> Result<Self> {
        for entry in &entries {
            mapping::validate_table_name(&entry.table)?;
        }
        Ok(Self {
            entries,
            clean_dir: clean_dir.into(),
            storage,
        })
    }

    /// Load every present file, skip the absent ones, then commit once.
    ///
    /// Any load error returns before the commit. The session is dropped
    /// uncommitted and nothing from this run reaches the database.
    pub async fn run<D: Session>(&self, mut session: D) -> Result<LoadReport> {
        let start = Instant::now();
        let mut report = LoadReport::default();

        for entry in &self.entries {
            let path = self.clean_dir.join(&entry.file);
            if !self.storage.exists(&path) {
                info!(file = %entry.file, "File {} not found, skipping", entry.file);
                report.skipped.push(entry.file.clone());
                continue;
            }

            info!(
                file = %entry.file,
                table = %entry.table,
                "Loading {} into {}",
                entry.file,
                entry.table
            );
            let rows = load_csv_to_table(&mut session, &self.storage, &path, &entry.table).await?;
            info!(table = %entry.table, rows, "copied");
            report.loaded.push(LoadedFile {
                file: entry.file.clone(),
                table: entry.table.clone(),
                rows,
            });
        }

        session.commit().await.map_err(Error::Commit)?;
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            elapsed = ?start.elapsed(),
            "committed"
        );
        Ok(report)
    }
}

/// Connect, run `loader` in a single transaction, and close the connection.
pub async fn load_into_postgres<S: Storage>(
    config: &DbConfig,
    loader: &Loader<S>,
) -> Result<LoadReport> {
    let mut conn = connect(config).await?;
    let report = {
        let session = PgSession::begin(&mut conn).await?;
        loader.run(session).await?
    };
    conn.close().await.map_err(Error::Connection)?;
    info!("All data loaded successfully!");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemStorage;
    use async_trait::async_trait;
    use std::io::BufRead;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Journal {
        copies: Vec<(String, String)>,
        commits: usize,
    }

    /// Records COPY statements and their input; fails for `missing` tables.
    struct FakeSession {
        journal: Arc<Mutex<Journal>>,
        missing: Vec<String>,
    }

    impl FakeSession {
        fn new(missing: &[&str]) -> (Self, Arc<Mutex<Journal>>) {
            let journal = Arc::new(Mutex::new(Journal::default()));
            let session = Self {
                journal: Arc::clone(&journal),
                missing: missing.iter().map(|t| t.to_string()).collect(),
            };
            (session, journal)
        }
    }

    #[async_trait]
    impl Session for FakeSession {
        async fn copy_in(
            &mut self,
            statement: &str,
            source: &mut (dyn BufRead + Send),
        ) -> std::result::Result<u64, sqlx::Error> {
            if let Some(table) = self
                .missing
                .iter()
                .find(|t| statement.starts_with(&format!("COPY {} ", t)))
            {
                return Err(sqlx::Error::Protocol(format!(
                    "relation \"{}\" does not exist",
                    table
                )));
            }
            let mut body = String::new();
            source.read_to_string(&mut body)?;
            let rows = body.lines().count() as u64;
            self.journal
                .lock()
                .unwrap()
                .copies
                .push((statement.to_string(), body));
            Ok(rows)
        }

        async fn commit(self) -> std::result::Result<(), sqlx::Error> {
            self.journal.lock().unwrap().commits += 1;
            Ok(())
        }
    }

    fn storage_with(files: &[(&str, &str)]) -> MemStorage {
        let mem = MemStorage::new();
        mem.create_dir_all(std::path::Path::new("data/clean")).unwrap();
        for (name, body) in files {
            mem.insert(format!("data/clean/{}", name), *body);
        }
        mem
    }

    #[tokio::test]
    async fn test_absent_file_is_skipped_and_still_commits() {
        let loader = Loader::new(
            vec![MappingEntry::new("departments_clean.csv", "project_budgeting.departments")],
            "data/clean",
            storage_with(&[]),
        )
        .unwrap();
        let (session, journal) = FakeSession::new(&[]);

        let report = loader.run(session).await.unwrap();
        assert_eq!(report.skipped, vec!["departments_clean.csv"]);
        assert!(report.loaded.is_empty());

        let journal = journal.lock().unwrap();
        assert!(journal.copies.is_empty());
        assert_eq!(journal.commits, 1);
    }

    #[tokio::test]
    async fn test_present_file_copies_rows_without_header() {
        let loader = Loader::new(
            vec![
                MappingEntry::new("employees_clean.csv", "project_budgeting.employees"),
                MappingEntry::new("projects_clean.csv", "project_budgeting.projects"),
            ],
            "data/clean",
            storage_with(&[("employees_clean.csv", "employee_id,name\n1,Ada\n2,\n")]),
        )
        .unwrap();
        let (session, journal) = FakeSession::new(&[]);

        let report = loader.run(session).await.unwrap();
        assert_eq!(
            report.loaded,
            vec![LoadedFile {
                file: "employees_clean.csv".into(),
                table: "project_budgeting.employees".into(),
                rows: 2,
            }]
        );
        assert_eq!(report.skipped, vec!["projects_clean.csv"]);

        let journal = journal.lock().unwrap();
        assert_eq!(
            journal.copies,
            vec![(
                "COPY project_budgeting.employees FROM STDIN WITH (FORMAT csv, DELIMITER ',', NULL '')"
                    .to_string(),
                "1,Ada\n2,\n".to_string()
            )]
        );
        assert_eq!(journal.commits, 1);
    }

    #[tokio::test]
    async fn test_missing_table_aborts_before_commit() {
        let loader = Loader::new(
            vec![
                MappingEntry::new("a_clean.csv", "staging.a"),
                MappingEntry::new("b_clean.csv", "staging.nope"),
                MappingEntry::new("c_clean.csv", "staging.c"),
            ],
            "data/clean",
            storage_with(&[
                ("a_clean.csv", "x\n1\n"),
                ("b_clean.csv", "x\n2\n"),
                ("c_clean.csv", "x\n3\n"),
            ]),
        )
        .unwrap();
        let (session, journal) = FakeSession::new(&["staging.nope"]);

        let err = loader.run(session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
        assert!(err.to_string().contains("staging.nope"));

        let journal = journal.lock().unwrap();
        assert_eq!(journal.copies.len(), 1);
        assert_eq!(journal.commits, 0);
    }

    #[tokio::test]
    async fn test_header_only_file_copies_nothing() {
        let loader = Loader::new(
            vec![MappingEntry::new("a_clean.csv", "a")],
            "data/clean",
            storage_with(&[("a_clean.csv", "x,y\n")]),
        )
        .unwrap();
        let (session, journal) = FakeSession::new(&[]);

        let report = loader.run(session).await.unwrap();
        assert_eq!(report.loaded[0].rows, 0);
        assert_eq!(journal.lock().unwrap().copies[0].1, "");
    }

    #[test]
    fn test_new_rejects_unsafe_table() {
        let result = Loader::new(
            vec![MappingEntry::new("a_clean.csv", "a; drop table b")],
            "data/clean",
            MemStorage::new(),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Config));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        let config = DbConfig {
            name: "budget".into(),
            user: "etl".into(),
            password: "secret".into(),
            host: "127.0.0.1".into(),
            port: 1,
            connect_timeout: std::time::Duration::from_secs(5),
        };
        let loader = Loader::new(default_mapping(), "data/clean", storage_with(&[])).unwrap();

        let err = load_into_postgres(&config, &loader).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            copy_statement("project_budgeting.head_shots"),
            "COPY project_budgeting.head_shots FROM STDIN WITH (FORMAT csv, DELIMITER ',', NULL '')"
        );
    }
}
