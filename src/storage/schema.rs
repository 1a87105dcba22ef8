//! `SQLite` schema definitions for lgatlas.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the regions table.
pub const CREATE_REGIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS regions (
    name TEXT PRIMARY KEY,
    geometry TEXT NOT NULL,
    source TEXT NOT NULL,
    fetched_at TEXT NOT NULL
)
";

/// SQL statement to create the observations table.
///
/// One row per region, indicator and year. Re-fetches overwrite the value.
pub const CREATE_OBSERVATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region TEXT NOT NULL,
    indicator TEXT NOT NULL,
    year INTEGER NOT NULL,
    value REAL NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(region, indicator, year)
)
";

/// SQL statement to create an index for indicator-and-year queries.
pub const CREATE_OBSERVATION_LOOKUP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_indicator_year ON observations(indicator, year)
";

/// SQL statement to create an index on region for profile queries.
pub const CREATE_OBSERVATION_REGION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_observations_region ON observations(region)
";

/// SQL statement to create the snapshots table.
///
/// The unique hash deduplicates byte-identical re-fetches.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    fetched_at TEXT NOT NULL,
    source TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    record_count INTEGER NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_REGIONS_TABLE,
    CREATE_OBSERVATIONS_TABLE,
    CREATE_OBSERVATION_LOOKUP_INDEX,
    CREATE_OBSERVATION_REGION_INDEX,
    CREATE_SNAPSHOTS_TABLE,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_regions_table_contains_required_columns() {
        assert!(CREATE_REGIONS_TABLE.contains("name TEXT PRIMARY KEY"));
        assert!(CREATE_REGIONS_TABLE.contains("geometry TEXT NOT NULL"));
        assert!(CREATE_REGIONS_TABLE.contains("source TEXT NOT NULL"));
        assert!(CREATE_REGIONS_TABLE.contains("fetched_at TEXT NOT NULL"));
    }

    #[test]
    fn test_create_observations_table_contains_required_columns() {
        assert!(CREATE_OBSERVATIONS_TABLE.contains("region TEXT NOT NULL"));
        assert!(CREATE_OBSERVATIONS_TABLE.contains("indicator TEXT NOT NULL"));
        assert!(CREATE_OBSERVATIONS_TABLE.contains("year INTEGER NOT NULL"));
        assert!(CREATE_OBSERVATIONS_TABLE.contains("value REAL NOT NULL"));
        assert!(CREATE_OBSERVATIONS_TABLE.contains("UNIQUE(region, indicator, year)"));
    }

    #[test]
    fn test_create_snapshots_table_deduplicates() {
        assert!(CREATE_SNAPSHOTS_TABLE.contains("content_hash TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
