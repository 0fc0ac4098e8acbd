//! Derived place and geocode records.

use chrono::{DateTime, Utc};

use crate::models::StopRecord;

/// A resolved (or negatively cached) geocode lookup.
///
/// A record with `found == false` is a tombstone: the lookup ran and matched
/// nothing, and the id must not be queried again.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub id: i64,
    pub display_name: String,
    pub query_text: String,
    pub resolved_at: DateTime<Utc>,
    pub found: bool,
    pub place_type: String,
    pub lat: f64,
    pub lon: f64,
}

impl GeocodeResult {
    /// Negative-cache entry for a query that matched nothing.
    pub fn tombstone(id: i64, query_text: &str) -> Self {
        Self {
            id,
            display_name: "-".to_string(),
            query_text: query_text.to_string(),
            resolved_at: Utc::now(),
            found: false,
            place_type: "bus_stop".to_string(),
            lat: 0.0,
            lon: 0.0,
        }
    }
}

/// A row of the durable place catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRecord {
    pub id: i64,
    pub name: String,
    pub has_coords: bool,
    pub lat: f64,
    pub lon: f64,
}

impl PlaceRecord {
    /// Combine a catalog stop with its geocode result.
    pub fn derive(stop: &StopRecord, resolved: &GeocodeResult) -> Self {
        Self {
            id: stop.id,
            name: stop.name.clone(),
            has_coords: resolved.found,
            lat: resolved.lat,
            lon: resolved.lon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_has_no_coordinates() {
        let tombstone = GeocodeResult::tombstone(9, "Nowhere, Slovenia");
        assert!(!tombstone.found);
        assert_eq!(tombstone.display_name, "-");
        assert_eq!((tombstone.lat, tombstone.lon), (0.0, 0.0));
    }

    #[test]
    fn derive_copies_coordinates_from_found_result() {
        let stop = StopRecord {
            id: 42,
            name: "Bled".to_string(),
        };
        let resolved = GeocodeResult {
            id: 42,
            display_name: "Bled, Radovljica, Slovenia".to_string(),
            query_text: "Bled, Slovenia".to_string(),
            resolved_at: Utc::now(),
            found: true,
            place_type: "town".to_string(),
            lat: 46.37,
            lon: 14.11,
        };
        let place = PlaceRecord::derive(&stop, &resolved);
        assert!(place.has_coords);
        assert_eq!(place.name, "Bled");
        assert_eq!(place.lat, 46.37);
    }

    #[test]
    fn derive_from_tombstone_marks_missing_coords() {
        let stop = StopRecord {
            id: 9,
            name: "Nowhere".to_string(),
        };
        let place = PlaceRecord::derive(&stop, &GeocodeResult::tombstone(9, "Nowhere, Slovenia"));
        assert!(!place.has_coords);
    }
}
