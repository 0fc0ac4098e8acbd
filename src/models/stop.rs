//! Stop catalog wire types.
//!
//! The timetable service answers catalog requests with a single-element JSON
//! array. That element carries either `DepartureStations` or a numeric `Error`
//! code, and is inconsistent about whether numbers arrive as strings.

use serde::Deserialize;

use crate::error::{AppError, Result};

/// A single stop as enumerated by the timetable service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRecord {
    /// Stable external identifier
    pub id: i64,
    /// Stop name as published by the service
    pub name: String,
}

/// A numeric field that may arrive as a JSON number or a quoted string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(i64),
    Text(String),
}

impl WireNumber {
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            WireNumber::Number(n) => Ok(*n),
            WireNumber::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::validation(format!("non-numeric field value '{s}'"))),
        }
    }
}

/// First element of the catalog response array.
#[derive(Debug, Deserialize)]
pub struct CatalogEnvelope {
    #[serde(rename = "Error", default)]
    error: Option<WireNumber>,

    #[serde(rename = "DepartureStations", default)]
    departure_stations: Option<Vec<RawStop>>,
}

#[derive(Debug, Deserialize)]
struct RawStop {
    #[serde(rename = "JPOS_IJPP")]
    id: WireNumber,

    #[serde(rename = "POS_NAZ")]
    name: String,
}

impl CatalogEnvelope {
    /// Embedded error code; absent means success.
    pub fn error_code(&self) -> Result<i64> {
        match &self.error {
            Some(code) => code.as_i64(),
            None => Ok(0),
        }
    }

    /// Convert the station list into stop records.
    pub fn into_stops(self) -> Result<Vec<StopRecord>> {
        let stations = self.departure_stations.ok_or_else(|| {
            AppError::validation("catalog response carries no DepartureStations")
        })?;
        stations
            .into_iter()
            .map(|raw| {
                Ok(StopRecord {
                    id: raw.id.as_i64()?,
                    name: raw.name,
                })
            })
            .collect()
    }
}

/// Parse a raw catalog response body.
pub fn parse_catalog(body: &str) -> Result<CatalogEnvelope> {
    let mut envelopes: Vec<CatalogEnvelope> = serde_json::from_str(body)?;
    if envelopes.is_empty() {
        return Err(AppError::validation("empty catalog response array"));
    }
    Ok(envelopes.remove(0))
}
