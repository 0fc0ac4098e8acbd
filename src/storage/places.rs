//! Durable place catalog.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::PlaceRecord;
use crate::storage;

/// The `places` table: one whole-row-replaced record per stop id.
pub struct PlaceStore {
    conn: Connection,
    commits: usize,
}

impl PlaceStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(storage::open_batched(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(storage::open_batched_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        storage::ensure_places_table(&conn)?;
        Ok(Self { conn, commits: 0 })
    }

    /// Insert-or-replace the whole row for this id.
    pub fn upsert(&self, place: &PlaceRecord) -> Result<()> {
        self.conn.execute(
            "REPLACE INTO places (id, name, has_coords, lat, lon) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![place.id, place.name, place.has_coords, place.lat, place.lon],
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Option<PlaceRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, has_coords, lat, lon FROM places WHERE id = ?1",
                params![id],
                |row| {
                    Ok(PlaceRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        has_coords: row.get(2)?,
                        lat: row.get(3)?,
                        lon: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_with_coords(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM places WHERE has_coords = 1",
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn place(id: i64, name: &str) -> PlaceRecord {
        PlaceRecord {
            id,
            name: name.to_string(),
            has_coords: true,
            lat: 46.0,
            lon: 14.5,
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = PlaceStore::in_memory().unwrap();
        let record = place(1, "Bled");
        store.upsert(&record).unwrap();
        assert_eq!(store.get(1).unwrap(), Some(record));
        assert_eq!(store.get(2).unwrap(), None);
    }

    #[test]
    fn upsert_replaces_the_whole_row() {
        let store = PlaceStore::in_memory().unwrap();
        store.upsert(&place(1, "Bled")).unwrap();

        let replacement = PlaceRecord {
            id: 1,
            name: "Bled jezero".to_string(),
            has_coords: false,
            lat: 0.0,
            lon: 0.0,
        };
        store.upsert(&replacement).unwrap();

        assert_eq!(store.get(1).unwrap(), Some(replacement));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn committed_rows_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.db");

        let mut store = PlaceStore::open(&path).unwrap();
        store.upsert(&place(1, "Bled")).unwrap();
        store.commit().unwrap();
        drop(store);

        let reopened = PlaceStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn uncommitted_rows_are_lost_on_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("places.db");

        let mut store = PlaceStore::open(&path).unwrap();
        store.upsert(&place(1, "Bled")).unwrap();
        store.commit().unwrap();
        store.upsert(&place(2, "Kranj")).unwrap();
        drop(store); // batch never committed

        let reopened = PlaceStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert_eq!(reopened.get(2).unwrap(), None);
    }

    #[test]
    fn coordinate_counts_split_on_has_coords() {
        let store = PlaceStore::in_memory().unwrap();
        store.upsert(&place(1, "Bled")).unwrap();
        store
            .upsert(&PlaceRecord {
                id: 2,
                name: "Nowhere".to_string(),
                has_coords: false,
                lat: 0.0,
                lon: 0.0,
            })
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.count_with_coords().unwrap(), 1);
    }
}
