// used for persistence
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::Result;
use crate::record::RecordKind;

/// Where a [`Persistor`] keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// Durable copy of the record store. Each record is kept as its text form
/// under its key, and rebuilt through the normal construction path on
/// restore.
pub struct Persistor {
    connection: Connection,
}

impl Persistor {
    pub fn new(mode: &PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        connection.execute_batch(
            "
            create table if not exists Record (
                Record_Key text not null,
                Record_Kind text not null,
                Record_Body text not null,
                constraint unique_and_referenceable_Record_Key primary key (
                    Record_Key
                )
            ) STRICT;
            ",
        )?;
        Ok(Self { connection })
    }
    pub fn store(&self, key: &str, kind: RecordKind, body: &str) -> Result<()> {
        self.connection.execute(
            "insert or replace into Record (Record_Key, Record_Kind, Record_Body) values (?1, ?2, ?3)",
            params![key, kind.name(), body],
        )?;
        debug!(%key, %kind, "persisted record");
        Ok(())
    }
    pub fn forget(&self, key: &str) -> Result<()> {
        self.connection
            .execute("delete from Record where Record_Key = ?1", params![key])?;
        debug!(%key, "forgot record");
        Ok(())
    }
    pub fn body(&self, key: &str) -> Result<Option<String>> {
        let body = self
            .connection
            .query_row("select Record_Body from Record where Record_Key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(body)
    }
    /// Every stored `(key, body)` pair.
    pub fn records(&self) -> Result<Vec<(String, String)>> {
        let mut statement = self
            .connection
            .prepare("select Record_Key, Record_Body from Record order by Record_Key")?;
        let rows = statement.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row("select count(*) from Record", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
