//! SQLite-backed persistence with explicit commit boundaries.
//!
//! Each logical store holds one connection for the process lifetime and runs
//! one deferred transaction at a time: writes accumulate until `commit`, which
//! makes the batch durable and opens the next one. A crash therefore loses at
//! most one uncommitted batch, never already-committed rows.
//!
//! ## Database Layout
//!
//! ```text
//! {data_dir}/
//! ├── places.db       places(id, name, has_coords, lat, lon)
//! ├── locations.db    locations(id, name, query_text, resolved_at,
//! │                             found, place_type, lat, lon)
//! └── login_data.json credential pair, owned by services::credentials
//! ```

pub mod locations;
pub mod places;

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

// Re-export for convenience
pub use locations::LocationStore;
pub use places::PlaceStore;

/// Open a connection and start the first write batch.
pub fn open_batched(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    begin(&conn)?;
    Ok(conn)
}

/// In-memory variant for tests.
pub fn open_batched_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    begin(&conn)?;
    Ok(conn)
}

/// Make the current batch durable and open the next one.
pub fn commit_and_begin(conn: &Connection) -> Result<()> {
    conn.execute_batch("COMMIT; BEGIN DEFERRED")?;
    Ok(())
}

fn begin(conn: &Connection) -> Result<()> {
    conn.execute_batch("BEGIN DEFERRED")?;
    Ok(())
}

/// Create the place catalog table if this is a fresh database.
pub fn ensure_places_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS places (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            has_coords INTEGER NOT NULL,
            lat REAL,
            lon REAL
        )",
    )?;
    Ok(())
}

/// Create the geocode cache table if this is a fresh database.
pub fn ensure_locations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            query_text TEXT NOT NULL,
            resolved_at TEXT,
            found INTEGER NOT NULL,
            place_type TEXT,
            lat REAL,
            lon REAL
        )",
    )?;
    Ok(())
}
