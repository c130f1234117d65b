//! Top-level control flow for a migration run.
//!
//! A run moves through
//! `Start -> Connected -> LedgerVerified -> PendingComputed -> Applied -> Done`
//! and lands in `Failed` from any step. The orchestrator owns the connection
//! for the whole run: it is closed explicitly on success and dropped on every
//! failure path.

use ordinal_common::{Error, Result};
use ordinal_config::MigrateConfig;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::executor::Executor;
use crate::ledger::{Ledger, LedgerEntry, LedgerStatus};
use crate::reporter::Reporter;
use crate::store::list_pending;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Start,
    Connected,
    LedgerVerified,
    PendingComputed,
    Applied,
    Done,
    Failed,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub ledger_created: bool,
    pub last_applied_before: u64,
    pub applied: Vec<u64>,
}

/// Ledger contents and pending files, without applying anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub table: String,
    pub ledger_exists: bool,
    pub applied: Vec<LedgerEntry>,
    pub pending: Vec<u64>,
}

pub struct Orchestrator<'r> {
    config: MigrateConfig,
    reporter: &'r dyn Reporter,
    phase: Phase,
}

impl<'r> Orchestrator<'r> {
    pub fn new(config: MigrateConfig, reporter: &'r dyn Reporter) -> Self {
        Self {
            config,
            reporter,
            phase: Phase::Start,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Apply every pending migration.
    pub fn run(&mut self) -> Result<RunReport> {
        let result = self.try_run();
        self.finish(result)
    }

    /// Report applied and pending migrations. Never creates the ledger.
    pub fn status(&mut self) -> Result<StatusReport> {
        let result = self.try_status();
        self.finish(result)
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.advance(Phase::Done),
            Err(e) => {
                self.advance(Phase::Failed);
                self.reporter.error(&e.to_string());
            }
        }
        result
    }

    fn try_run(&mut self) -> Result<RunReport> {
        let conn = self.connect()?;
        // On error `conn` is dropped here, which closes it.
        let report = self.migrate(&conn)?;
        close(conn)?;

        self.reporter.info(&format!(
            "done, {} migration(s) applied",
            report.applied.len()
        ));
        Ok(report)
    }

    fn migrate(&mut self, conn: &Connection) -> Result<RunReport> {
        let ledger = Ledger::new(conn, &self.config.table)?;
        let ledger_created = self.verify_ledger(&ledger)?;

        let last = ledger.last_applied()?;
        self.reporter
            .info(&format!("last migration applied: {last}"));

        let pending = list_pending(&self.config.folder, last)?;
        let ids: Vec<u64> = pending.iter().map(|f| f.id).collect();
        self.reporter.info(&format!("pending migrations: {ids:?}"));
        self.advance(Phase::PendingComputed);

        let applied = Executor::new(conn, &ledger, self.reporter)
            .split_mode(self.config.split)
            .transactional(self.config.transactional)
            .apply(&pending)?;
        self.advance(Phase::Applied);

        Ok(RunReport {
            ledger_created,
            last_applied_before: last,
            applied,
        })
    }

    fn verify_ledger(&mut self, ledger: &Ledger<'_>) -> Result<bool> {
        let table = ledger.table();
        let created = match ledger.ensure_created(self.config.create_table) {
            Ok(LedgerStatus::Found) => {
                self.reporter.info(&format!("table {table} found"));
                false
            }
            Ok(LedgerStatus::Created) => {
                self.reporter
                    .info(&format!("table {table} not found, created it"));
                true
            }
            Err(e) => {
                // With creation allowed the table was missing but `create` failed,
                // and the error already says so.
                if !self.config.create_table {
                    self.reporter.info(&format!("table {table} not found"));
                }
                return Err(e);
            }
        };
        self.advance(Phase::LedgerVerified);
        Ok(created)
    }

    fn try_status(&mut self) -> Result<StatusReport> {
        let conn = self.connect()?;
        let ledger = Ledger::new(&conn, &self.config.table)?;

        let ledger_exists = ledger.exists();
        let applied = if ledger_exists {
            ledger.entries()?
        } else {
            self.reporter
                .info(&format!("table {} not found", self.config.table));
            Vec::new()
        };
        self.advance(Phase::LedgerVerified);

        let last = applied.last().map(|e| e.id).unwrap_or(0);
        let pending = list_pending(&self.config.folder, last)?
            .into_iter()
            .map(|f| f.id)
            .collect();
        self.advance(Phase::PendingComputed);

        drop(ledger);
        close(conn)?;

        Ok(StatusReport {
            table: self.config.table.clone(),
            ledger_exists,
            applied,
            pending,
        })
    }

    fn connect(&mut self) -> Result<Connection> {
        self.reporter.info(&format!(
            "connecting to {}...",
            self.config.db.display()
        ));

        let conn = Connection::open(&self.config.db).map_err(|e| {
            Error::Connection(format!(
                "failed to open database {}: {e}",
                self.config.db.display()
            ))
        })?;

        // Reading the schema forces SQLite to check the file header.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| {
            Error::Connection(format!(
                "failed to ping database {}: {e}",
                self.config.db.display()
            ))
        })?;

        self.reporter.info("connected");
        self.advance(Phase::Connected);
        Ok(conn)
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "orchestrator phase");
        self.phase = next;
    }
}

fn close(conn: Connection) -> Result<()> {
    conn.close()
        .map_err(|(_, e)| Error::Connection(format!("failed to close database: {e}")))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use ordinal_config::SplitMode;

    use super::*;
    use crate::reporter::{RecordingReporter, Severity};

    fn config(db: &Path, folder: &Path, create_table: bool) -> MigrateConfig {
        MigrateConfig {
            db: db.to_path_buf(),
            folder: folder.to_path_buf(),
            table: "migrations".into(),
            create_table,
            split: SplitMode::Naive,
            transactional: false,
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        db: PathBuf,
        folder: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("migrations");
        std::fs::create_dir(&folder).unwrap();
        Fixture {
            db: dir.path().join("app.db"),
            folder,
            _dir: dir,
        }
    }

    #[test]
    fn run_creates_ledger_and_applies() {
        let fx = fixture();
        std::fs::write(fx.folder.join("1.sql"), "CREATE TABLE a (x INT);").unwrap();

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter);
        let report = orchestrator.run().unwrap();

        assert_eq!(orchestrator.phase(), Phase::Done);
        assert!(report.ledger_created);
        assert_eq!(report.last_applied_before, 0);
        assert_eq!(report.applied, vec![1]);

        let info = reporter.messages(Severity::Info);
        assert!(info[0].starts_with("connecting to"));
        assert_eq!(info[1], "connected");
        assert_eq!(info[2], "table migrations not found, created it");
        assert_eq!(info.last().unwrap(), "done, 1 migration(s) applied");
        assert!(reporter.messages(Severity::Error).is_empty());
    }

    #[test]
    fn missing_ledger_without_create_fails() {
        let fx = fixture();
        std::fs::write(fx.folder.join("1.sql"), "CREATE TABLE a (x INT);").unwrap();

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, false), &reporter);
        let err = orchestrator.run().unwrap_err();

        assert!(matches!(err, Error::Ledger(_)));
        assert_eq!(orchestrator.phase(), Phase::Failed);
        let errors = reporter.messages(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("table migrations"));

        let conn = Connection::open(&fx.db).unwrap();
        let tables: i64 = conn
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn missing_ledger_without_create_reports_not_found() {
        let fx = fixture();

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, false), &reporter);
        assert!(orchestrator.run().is_err());

        let info = reporter.messages(Severity::Info);
        assert!(info.contains(&"table migrations not found".to_string()));
    }

    #[test]
    fn failed_creation_does_not_report_not_found() {
        let fx = fixture();
        {
            let conn = Connection::open(&fx.db).unwrap();
            conn.execute_batch("CREATE TABLE t (x INT); CREATE INDEX migrations ON t (x);")
                .unwrap();
        }

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter);
        let err = orchestrator.run().unwrap_err();

        assert!(matches!(err, Error::Ledger(_)));
        assert!(err.to_string().contains("failed to create table migrations"));
        assert!(
            !reporter
                .messages(Severity::Info)
                .iter()
                .any(|m| m.contains("not found"))
        );
        assert_eq!(reporter.messages(Severity::Error).len(), 1);
    }

    #[test]
    fn unreachable_database_is_connection_error() {
        let fx = fixture();
        let db = fx.folder.join("no/such/dir/app.db");

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&db, &fx.folder, true), &reporter);
        let err = orchestrator.run().unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(orchestrator.phase(), Phase::Failed);
    }

    #[test]
    fn non_database_file_fails_ping() {
        let fx = fixture();
        std::fs::write(&fx.db, "this is not a sqlite database\n".repeat(16)).unwrap();

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter);
        assert!(matches!(orchestrator.run(), Err(Error::Connection(_))));
    }

    #[test]
    fn bad_filename_aborts_before_execution() {
        let fx = fixture();
        std::fs::write(fx.folder.join("1.sql"), "CREATE TABLE a (x INT);").unwrap();
        std::fs::write(fx.folder.join("README.md"), "docs").unwrap();

        let reporter = RecordingReporter::new();
        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter);
        let err = orchestrator.run().unwrap_err();
        assert!(err.is_config());

        let conn = Connection::open(&fx.db).unwrap();
        let ledger = Ledger::new(&conn, "migrations").unwrap();
        assert_eq!(ledger.last_applied().unwrap(), 0);
    }

    #[test]
    fn status_lists_applied_and_pending() {
        let fx = fixture();
        std::fs::write(fx.folder.join("1.sql"), "CREATE TABLE a (x INT);").unwrap();

        let reporter = RecordingReporter::new();
        Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter)
            .run()
            .unwrap();
        std::fs::write(fx.folder.join("2.sql"), "CREATE TABLE b (x INT);").unwrap();

        let mut orchestrator = Orchestrator::new(config(&fx.db, &fx.folder, false), &reporter);
        let status = orchestrator.status().unwrap();
        assert!(status.ledger_exists);
        assert_eq!(status.applied.len(), 1);
        assert_eq!(status.applied[0].id, 1);
        assert_eq!(status.pending, vec![2]);
        assert_eq!(orchestrator.phase(), Phase::Done);
    }

    #[test]
    fn status_does_not_create_ledger() {
        let fx = fixture();
        std::fs::write(fx.folder.join("1.sql"), "CREATE TABLE a (x INT);").unwrap();

        let reporter = RecordingReporter::new();
        let status = Orchestrator::new(config(&fx.db, &fx.folder, true), &reporter)
            .status()
            .unwrap();
        assert!(!status.ledger_exists);
        assert_eq!(status.pending, vec![1]);

        let conn = Connection::open(&fx.db).unwrap();
        assert!(!Ledger::new(&conn, "migrations").unwrap().exists());
    }
}
