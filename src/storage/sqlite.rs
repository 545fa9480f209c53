//! SQLite metadata backend

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{MetadataStore, PackageMetadata};
use crate::error::Result;
use crate::storage::migrations;

/// `package.db` in the key directory.
pub struct SqliteStore {
    conn: Connection,
    schema_version: u32,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn,
            schema_version,
        })
    }

    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Remove the record for `hash`, if any.
    pub fn delete(&self, hash: &str) -> Result<()> {
        self.conn.execute("DELETE FROM package WHERE hash = ?", [hash])?;
        Ok(())
    }

    /// Refuse every later write on this connection.
    #[cfg(test)]
    pub(crate) fn set_read_only(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(())
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM package", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl MetadataStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, hash: &str) -> Result<Option<PackageMetadata>> {
        let record = self
            .conn
            .query_row(
                "SELECT hash, name, author, homepage, email, description, class, tags, \
                 installation, version, copyright FROM package WHERE hash = ?",
                [hash],
                metadata_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn put(&self, hash: &str, metadata: &PackageMetadata) -> Result<()> {
        self.conn.execute(
            "REPLACE INTO package (hash, name, author, homepage, email, description, class, \
             tags, installation, version, copyright) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                hash,
                metadata.name,
                metadata.author,
                metadata.homepage,
                metadata.email,
                metadata.description,
                metadata.class,
                metadata.tags,
                metadata.installation,
                metadata.version,
                metadata.copyright,
            ],
        )?;
        Ok(())
    }
}

fn metadata_from_row(row: &Row<'_>) -> rusqlite::Result<PackageMetadata> {
    Ok(PackageMetadata {
        hash: row.get(0)?,
        name: row.get(1)?,
        author: row.get(2)?,
        homepage: row.get(3)?,
        email: row.get(4)?,
        description: row.get(5)?,
        class: row.get(6)?,
        tags: row.get(7)?,
        installation: row.get(8)?,
        version: row.get(9)?,
        copyright: row.get(10)?,
    })
}
