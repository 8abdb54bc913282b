//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. A single monotonically
//! increasing version number in `sys_schema_version` tracks what has been
//! applied, so repeated startup runs (including concurrent ones after a
//! crash) are idempotent.

use anyhow::Result;
use duckdb::Connection;

use crate::migrations::{target_version, MIGRATIONS};

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Schema version before this run
    pub from_version: i64,
    /// Schema version after this run
    pub to_version: i64,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    /// Create a new migration service with a database connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run all pending migrations
    ///
    /// This is the main entry point. It:
    /// 1. Bootstraps the sys_schema_version marker if absent
    /// 2. Compares the stored version to the target version
    /// 3. Applies each newer migration in order, bumping the marker per step
    pub fn run_pending(&self) -> Result<MigrationResult> {
        self.ensure_version_table()?;

        let from_version = self.current_version()?;
        let mut applied = Vec::new();

        for (version, name, sql) in MIGRATIONS.iter() {
            if *version > from_version {
                self.conn.execute_batch(sql)?;
                self.set_version(*version)?;
                applied.push(name.to_string());
            }
        }

        Ok(MigrationResult {
            applied,
            from_version,
            to_version: self.current_version()?,
        })
    }

    /// Get the currently stored schema version
    pub fn current_version(&self) -> Result<i64> {
        let version: i64 =
            self.conn
                .query_row("SELECT version FROM sys_schema_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Get names of migrations newer than the stored version
    pub fn get_pending(&self) -> Result<Vec<String>> {
        self.ensure_version_table()?;
        let current = self.current_version()?;
        Ok(MIGRATIONS
            .iter()
            .filter(|(version, _, _)| *version > current)
            .map(|(_, name, _)| name.to_string())
            .collect())
    }

    fn ensure_version_table(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sys_schema_version (version BIGINT NOT NULL);",
        )?;
        let rows: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sys_schema_version", [], |row| row.get(0))?;
        if rows == 0 {
            self.conn
                .execute("INSERT INTO sys_schema_version (version) VALUES (0)", [])?;
        }
        Ok(())
    }

    fn set_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute("UPDATE sys_schema_version SET version = ?", [version])?;
        Ok(())
    }
}
