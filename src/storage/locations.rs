//! Durable geocode-result cache table.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::GeocodeResult;
use crate::storage;

/// The `locations` table: one resolved lookup (or tombstone) per stop id.
///
/// Writes go through `GeocodeCache`; this type only carries the SQL.
pub struct LocationStore {
    conn: Connection,
    commits: usize,
}

impl LocationStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(storage::open_batched(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(storage::open_batched_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        storage::ensure_locations_table(&conn)?;
        Ok(Self { conn, commits: 0 })
    }

    pub fn get(&self, id: i64) -> Result<Option<GeocodeResult>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, query_text, resolved_at, found, place_type, lat, lon
                 FROM locations WHERE id = ?1",
                params![id],
                map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert-or-replace the whole row for this id.
    pub fn put(&self, result: &GeocodeResult) -> Result<()> {
        self.conn.execute(
            "REPLACE INTO locations (id, name, query_text, resolved_at, found, place_type, lat, lon)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.id,
                result.display_name,
                result.query_text,
                result.resolved_at.to_rfc3339(),
                result.found,
                result.place_type,
                result.lat,
                result.lon,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_tombstones(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM locations WHERE found = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Land the current batch on disk.
    pub fn commit(&mut self) -> Result<()> {
        storage::commit_and_begin(&self.conn)?;
        self.commits += 1;
        Ok(())
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<GeocodeResult> {
    let resolved_at: String = row.get(3)?;
    let resolved_at = DateTime::parse_from_rfc3339(&resolved_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(GeocodeResult {
        id: row.get(0)?,
        display_name: row.get(1)?,
        query_text: row.get(2)?,
        resolved_at,
        found: row.get(4)?,
        place_type: row.get(5)?,
        lat: row.get(6)?,
        lon: row.get(7)?,
    })
}
