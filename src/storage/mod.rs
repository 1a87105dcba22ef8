//! Storage layer for lgatlas.
//!
//! This module provides `SQLite`-based persistent storage for region
//! boundaries, indicator observations and fetch snapshots, so the dashboard
//! can be rebuilt without touching the portals again.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::MultiPolygon;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::boundary::RegionBoundary;
use crate::error::{Error, Result};
use crate::indicator::{DatasetSnapshot, Indicator, Observation};

/// Storage engine for the atlas.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Boundary caching keyed by normalized region name
/// - Observation upserts where the latest fetch wins
/// - Snapshot records deduplicated by content hash
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        // Initialize schema
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Regions ===

    /// Store a batch of region boundaries, replacing any with the same name.
    ///
    /// Returns the number of boundaries stored.
    ///
    /// # Errors
    ///
    /// Returns an error if geometry serialization or the database operation fails.
    pub fn store_boundaries(&mut self, boundaries: &[RegionBoundary]) -> Result<usize> {
        let fetched_at = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT OR REPLACE INTO regions (name, geometry, source, fetched_at)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )?;
            for boundary in boundaries {
                let geometry = geometry_to_text(&boundary.geometry)?;
                stmt.execute(params![
                    boundary.name,
                    geometry,
                    boundary.source,
                    fetched_at
                ])?;
            }
        }
        tx.commit()?;

        debug!("Stored {} region boundaries", boundaries.len());
        Ok(boundaries.len())
    }

    /// Load all region boundaries, ordered by name.
    ///
    /// Rows with unreadable geometry are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn boundaries(&self) -> Result<Vec<RegionBoundary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, geometry, source FROM regions ORDER BY name")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut boundaries = Vec::with_capacity(rows.len());
        for (name, geometry_text, source) in rows {
            match text_to_geometry(&geometry_text) {
                Ok(geometry) => boundaries.push(RegionBoundary {
                    name,
                    geometry,
                    source,
                }),
                Err(e) => warn!("skipping region '{name}' with unreadable geometry: {e}"),
            }
        }
        Ok(boundaries)
    }

    /// List all region names, ordered alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn region_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM regions ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Count stored region boundaries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn region_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM regions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Check whether a region with the given normalized name is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn has_region(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM regions WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // === Snapshots ===

    /// Record a fetch snapshot.
    ///
    /// Returns the assigned ID, or `None` if a snapshot with the same
    /// content hash already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_snapshot(&self, snapshot: &DatasetSnapshot) -> Result<Option<i64>> {
        if self.snapshot_exists(&snapshot.content_hash)? {
            debug!(
                "Skipping duplicate snapshot with hash {}",
                &snapshot.content_hash[..16]
            );
            return Ok(None);
        }

        self.conn.execute(
            r"
            INSERT INTO snapshots (fetched_at, source, content_hash, record_count)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                snapshot.fetched_at.to_rfc3339(),
                snapshot.source,
                snapshot.content_hash,
                i64::try_from(snapshot.record_count).unwrap_or(i64::MAX),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Recorded snapshot with id {}", id);
        Ok(Some(id))
    }

    /// Check if a snapshot with the given hash already exists.
    fn snapshot_exists(&self, hash: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE content_hash = ?1",
            [hash],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Count recorded snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn snapshot_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Prune snapshots to keep only the most recent N records.
    ///
    /// A keep count of zero retains everything. Returns the number of
    /// snapshots deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_snapshots(&self, keep_count: usize) -> Result<usize> {
        if keep_count == 0 {
            return Ok(0);
        }

        let keep_i64 = i64::try_from(keep_count).unwrap_or(i64::MAX);
        let affected = self.conn.execute(
            r"
            DELETE FROM snapshots WHERE id NOT IN (
                SELECT id FROM snapshots ORDER BY fetched_at DESC LIMIT ?1
            )
            ",
            [keep_i64],
        )?;

        if affected > 0 {
            info!("Pruned {} snapshots to keep {} recent", affected, keep_count);
        }
        Ok(affected)
    }

    /// Time of the most recent fetch, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn last_fetch(&self) -> Result<Option<DateTime<Utc>>> {
        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT fetched_at FROM snapshots ORDER BY fetched_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    // === Observations ===

    /// Store a batch of observations, overwriting any with the same
    /// region, indicator and year.
    ///
    /// Returns the number of observations written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_observations(&mut self, observations: &[Observation]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO observations (region, indicator, year, value)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(region, indicator, year) DO UPDATE SET value = excluded.value
                ",
            )?;
            for observation in observations {
                stmt.execute(params![
                    observation.region,
                    observation.indicator.as_str(),
                    observation.year,
                    observation.value,
                ])?;
            }
        }
        tx.commit()?;

        debug!("Upserted {} observations", observations.len());
        Ok(observations.len())
    }

    /// Count stored observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn observation_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get observations for one indicator and year, ordered by region.
    ///
    /// When `regions` is set, only observations for those normalized names
    /// are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn observations(
        &self,
        indicator: Indicator,
        year: i32,
        regions: Option<&[String]>,
    ) -> Result<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT region, value FROM observations
            WHERE indicator = ?1 AND year = ?2
            ORDER BY region
            ",
        )?;

        let rows = stmt
            .query_map(params![indicator.as_str(), year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let observations = rows
            .into_iter()
            .filter(|(region, _)| regions.map_or(true, |names| names.contains(region)))
            .map(|(region, value)| Observation::new(region, indicator, year, value))
            .collect();
        Ok(observations)
    }

    /// Get every indicator value for one region and year.
    ///
    /// Rows with an unknown indicator key are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn region_profile(&self, region: &str, year: i32) -> Result<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT indicator, value FROM observations
            WHERE region = ?1 AND year = ?2
            ORDER BY indicator
            ",
        )?;

        let rows = stmt
            .query_map(params![region, year], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut profile = Vec::with_capacity(rows.len());
        for (indicator_str, value) in rows {
            match Indicator::from_str(&indicator_str) {
                Ok(indicator) => profile.push(Observation::new(region, indicator, year, value)),
                Err(_) => warn!("skipping unknown indicator '{indicator_str}' in store"),
            }
        }
        Ok(profile)
    }

    /// All years with stored observations, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn years(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM observations ORDER BY year")?;
        let years = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(years)
    }

    /// The most recent year with stored observations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_year(&self) -> Result<Option<i32>> {
        let year: Option<i32> =
            self.conn
                .query_row("SELECT MAX(year) FROM observations", [], |row| row.get(0))?;
        Ok(year)
    }

    // === Maintenance ===

    /// Delete all stored regions, observations and snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM observations", [])?;
        self.conn.execute("DELETE FROM regions", [])?;
        self.conn.execute("DELETE FROM snapshots", [])?;
        info!("Cleared all stored data");
        Ok(())
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let regions = self.region_count()?;
        let observations = self.observation_count()?;
        let snapshots = self.snapshot_count()?;
        let years = self.years()?;
        let last_fetch = self.last_fetch()?;

        // Get database file size
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            regions,
            observations,
            snapshots,
            first_year: years.first().copied(),
            last_year: years.last().copied(),
            last_fetch,
            db_size_bytes,
        })
    }
}

/// Serialize a geometry to GeoJSON text for storage.
fn geometry_to_text(geometry: &MultiPolygon<f64>) -> Result<String> {
    let geometry = geojson::Geometry::new(geojson::Value::from(geometry));
    Ok(serde_json::to_string(&geometry)?)
}

/// Parse a stored GeoJSON geometry back into a typed multipolygon.
fn text_to_geometry(text: &str) -> Result<MultiPolygon<f64>> {
    let geometry: geojson::Geometry = serde_json::from_str(text)?;
    MultiPolygon::try_from(geometry.value).map_err(Error::from)
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored region boundaries.
    pub regions: i64,
    /// Number of stored observations.
    pub observations: i64,
    /// Number of recorded snapshots.
    pub snapshots: i64,
    /// Earliest observation year.
    pub first_year: Option<i32>,
    /// Latest observation year.
    pub last_year: Option<i32>,
    /// Time of the most recent fetch.
    pub last_fetch: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
