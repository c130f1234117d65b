use chrono::{DateTime, Utc};
use ordinal_common::{Error, Result};
use ordinal_config::model::validate_table_name;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

/// Format used for the `applied` column.
const APPLIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One applied migration as recorded in the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub applied_at: DateTime<Utc>,
}

/// Outcome of [`Ledger::ensure_created`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Found,
    Created,
}

/// The table recording which migrations have been applied.
///
/// Schema: `id INTEGER NOT NULL PRIMARY KEY, applied DATETIME NOT NULL`.
pub struct Ledger<'c> {
    conn: &'c Connection,
    table: String,
}

impl<'c> Ledger<'c> {
    pub fn new(conn: &'c Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the ledger table exists. Looks the name up in `sqlite_master`
    /// (case-insensitively, like SQLite resolves names). When the catalog has
    /// no match or cannot be queried, selects from the table directly, so temp
    /// tables and views count too. Any error from that select means "absent".
    pub fn exists(&self) -> bool {
        let lookup = self.conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master \
             WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![self.table],
            |row| row.get::<_, bool>(0),
        );

        match lookup {
            Ok(found) => found || self.is_selectable(),
            Err(e) => {
                debug!("catalog lookup for {} failed ({e}), selecting directly", self.table);
                self.is_selectable()
            }
        }
    }

    fn is_selectable(&self) -> bool {
        self.conn
            .prepare(&format!("SELECT 1 FROM \"{}\" LIMIT 1", self.table))
            .and_then(|mut stmt| stmt.exists([]))
            .is_ok()
    }

    /// Create the ledger table. Fails if it already exists.
    pub fn create(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE \"{}\" (
                    id INTEGER NOT NULL PRIMARY KEY,
                    applied DATETIME NOT NULL
                );",
                self.table
            ))
            .map_err(|e| {
                Error::Ledger(format!("failed to create table {}: {e}", self.table))
            })?;

        info!("created ledger table {}", self.table);
        Ok(())
    }

    /// Make sure the table exists, creating it only when `allow_create` is set.
    pub fn ensure_created(&self, allow_create: bool) -> Result<LedgerStatus> {
        if self.exists() {
            return Ok(LedgerStatus::Found);
        }
        if !allow_create {
            return Err(Error::Ledger(format!(
                "table {} doesn't exist and creating it is disabled (pass -c to create it)",
                self.table
            )));
        }
        self.create()?;
        Ok(LedgerStatus::Created)
    }

    /// Highest applied id, or 0 when the ledger is empty.
    pub fn last_applied(&self) -> Result<u64> {
        let last: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT id FROM \"{}\" ORDER BY id DESC LIMIT 1", self.table),
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                Error::Ledger(format!(
                    "failed to read last migration from {}: {e}",
                    self.table
                ))
            })?;

        match last {
            None => Ok(0),
            Some(id) => u64::try_from(id).map_err(|_| {
                Error::Ledger(format!("table {} holds negative id {id}", self.table))
            }),
        }
    }

    /// Append a row for `id`. Call only once the migration's statements have
    /// succeeded.
    pub fn record_applied(&self, id: u64, applied_at: DateTime<Utc>) -> Result<()> {
        let row_id = i64::try_from(id)
            .map_err(|_| Error::execution(id, "id does not fit in an INTEGER column"))?;

        self.conn
            .execute(
                &format!("INSERT INTO \"{}\" (id, applied) VALUES (?1, ?2)", self.table),
                params![row_id, applied_at.format(APPLIED_FORMAT).to_string()],
            )
            .map_err(|e| {
                Error::execution(id, format!("failed to record in {}: {e}", self.table))
            })?;
        Ok(())
    }

    /// Every ledger row, ascending by id.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT id, applied FROM \"{}\" ORDER BY id ASC",
                self.table
            ))
            .map_err(|e| Error::Ledger(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| Error::Ledger(format!("failed to query {}: {e}", self.table)))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, applied) =
                row.map_err(|e| Error::Ledger(format!("failed to read ledger row: {e}")))?;
            entries.push(LedgerEntry {
                id: u64::try_from(id)
                    .map_err(|_| Error::Ledger(format!("negative ledger id {id}")))?,
                applied_at: parse_applied(&applied)?,
            });
        }
        Ok(entries)
    }
}

fn parse_applied(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, APPLIED_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Ledger(format!("unreadable applied timestamp '{s}': {e}")))
}
