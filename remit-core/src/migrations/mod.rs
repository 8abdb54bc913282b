//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary at build time using include_str!.
//! Each migration is a tuple of (version, name, sql_content). A single
//! integer in `sys_schema_version` gates execution: a step runs at most once,
//! when the stored version is below its version number, and every statement
//! is idempotent (create-if-absent) so an interrupted run can be replayed.
//!
//! IMPORTANT: When adding a new migration:
//! 1. Create the SQL file: NNN_description.sql
//! 2. Add an entry here with the next version number

/// All migrations, embedded at compile time.
/// Format: (version, filename, sql_content)
pub const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    (2, "002_sync_bookkeeping.sql", include_str!("002_sync_bookkeeping.sql")),
];

/// The schema version a fully migrated database reports
pub fn target_version() -> i64 {
    MIGRATIONS.last().map(|(v, _, _)| *v).unwrap_or(0)
}
