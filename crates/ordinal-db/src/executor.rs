use chrono::Utc;
use ordinal_common::{Error, Result};
use ordinal_config::SplitMode;
use rusqlite::Connection;
use tracing::debug;

use crate::ledger::Ledger;
use crate::reporter::Reporter;
use crate::splitter::split_statements;
use crate::store::MigrationFile;

/// Runs migration files against a connection and records each one in the
/// ledger.
///
/// Files are processed one at a time in ascending id order. The first failing
/// statement or ledger insert aborts the run. Unless `transactional` is set,
/// statements that already ran for the failing file stay applied.
pub struct Executor<'a> {
    conn: &'a Connection,
    ledger: &'a Ledger<'a>,
    reporter: &'a dyn Reporter,
    split: SplitMode,
    transactional: bool,
}

impl<'a> Executor<'a> {
    pub fn new(conn: &'a Connection, ledger: &'a Ledger<'a>, reporter: &'a dyn Reporter) -> Self {
        Self {
            conn,
            ledger,
            reporter,
            split: SplitMode::Naive,
            transactional: false,
        }
    }

    pub fn split_mode(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    /// Wrap each file's statements and its ledger row in one transaction.
    pub fn transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// Apply `files` in order and return the ids that were applied.
    pub fn apply(&self, files: &[MigrationFile]) -> Result<Vec<u64>> {
        if let Some(pair) = files.windows(2).find(|w| w[0].id >= w[1].id) {
            return Err(Error::Config(format!(
                "migrations out of order: {} before {}",
                pair[0].id, pair[1].id
            )));
        }

        let mut applied = Vec::with_capacity(files.len());
        for file in files {
            self.reporter
                .info(&format!("executing migration {}", file.id));

            let statements = if self.transactional {
                self.apply_in_transaction(file)?
            } else {
                self.apply_file(file)?
            };

            self.reporter.info(&format!(
                "migration {} applied ({statements} statements)",
                file.id
            ));
            applied.push(file.id);
        }
        Ok(applied)
    }

    fn apply_in_transaction(&self, file: &MigrationFile) -> Result<usize> {
        let tx = self.conn.unchecked_transaction().map_err(|e| {
            Error::execution(file.id, format!("failed to begin transaction: {e}"))
        })?;

        // Dropping `tx` on the error path rolls the file back.
        let statements = self.apply_file(file)?;

        tx.commit()
            .map_err(|e| Error::execution(file.id, format!("failed to commit: {e}")))?;
        Ok(statements)
    }

    fn apply_file(&self, file: &MigrationFile) -> Result<usize> {
        let sql = file.read_sql()?;
        let statements = split_statements(&sql, self.split);

        for (n, statement) in statements.iter().enumerate() {
            debug!(migration = file.id, "executing {statement}");
            self.conn.execute_batch(statement).map_err(|e| {
                Error::execution(file.id, format!("statement {} failed: {e}", n + 1))
            })?;
        }

        self.ledger.record_applied(file.id, Utc::now())?;
        Ok(statements.len())
    }
}
