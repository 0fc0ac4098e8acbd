// src/services/geocode.rs

//! Nominatim lookups behind a persistent, rate-limited cache.
//!
//! Every stop id is looked up against the provider at most once, ever: hits
//! come straight from the `locations` table, and misses are persisted before
//! they are returned, queries that match nothing included.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{GeocodeResult, GeocoderConfig};
use crate::storage::LocationStore;
use crate::utils::truncate_label;

/// A single match returned by the geocoding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeMatch {
    pub display_name: String,
    #[serde(rename = "type")]
    pub place_type: String,
    pub lat: String,
    pub lon: String,
}

/// The provider boundary: one free-text query, at most one match.
#[async_trait]
pub trait Geocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeMatch>>;
}

/// Nominatim search API client.
pub struct NominatimGeocoder {
    http: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, query: &str) -> Result<Option<GeocodeMatch>> {
        let matches: Vec<GeocodeMatch> = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(matches.into_iter().next())
    }
}

/// Persistent geocode cache over an external provider.
///
/// Owns all access to the `locations` table.
pub struct GeocodeCache {
    store: LocationStore,
    geocoder: Box<dyn Geocoder + Send + Sync>,
    cooldown: Duration,
}

impl GeocodeCache {
    pub fn open(
        path: &Path,
        geocoder: Box<dyn Geocoder + Send + Sync>,
        cooldown: Duration,
    ) -> Result<Self> {
        Ok(Self {
            store: LocationStore::open(path)?,
            geocoder,
            cooldown,
        })
    }

    #[cfg(test)]
    pub fn in_memory(geocoder: Box<dyn Geocoder + Send + Sync>, cooldown: Duration) -> Result<Self> {
        Ok(Self {
            store: LocationStore::in_memory()?,
            geocoder,
            cooldown,
        })
    }

    /// Resolve a stop id to its geocode result.
    ///
    /// Cache hits return the stored row untouched. A miss pauses for the
    /// cooldown, queries the provider exactly once, and persists the outcome.
    /// When nothing matches, `allow_miss` decides between a tombstone and a
    /// `NotFound` error; either way no second provider query will ever run
    /// for a tombstoned id.
    pub async fn resolve(&mut self, id: i64, query: &str, allow_miss: bool) -> Result<GeocodeResult> {
        if let Some(hit) = self.store.get(id)? {
            log::debug!("Cache hit for stop {id}");
            return Ok(hit);
        }

        // Unconditional per-miss pause so the provider never sees more than
        // one request per interval, tombstones included.
        tokio::time::sleep(self.cooldown).await;

        match self.geocoder.lookup(query).await? {
            Some(found) => {
                let result = GeocodeResult {
                    id,
                    display_name: found.display_name,
                    query_text: query.to_string(),
                    resolved_at: Utc::now(),
                    found: true,
                    place_type: found.place_type,
                    lat: parse_coord(&found.lat)?,
                    lon: parse_coord(&found.lon)?,
                };
                self.store.put(&result)?;
                log::info!("New location cached for '{}'", truncate_label(query, 18));
                Ok(result)
            }
            None if allow_miss => {
                let result = GeocodeResult::tombstone(id, query);
                self.store.put(&result)?;
                log::info!("No coordinates found for '{}'", truncate_label(query, 18));
                Ok(result)
            }
            None => Err(AppError::NotFound {
                query: query.to_string(),
            }),
        }
    }

    /// Land the current batch on disk.
    pub fn commit(&mut self) -> Result<()> {
        self.store.commit()
    }

    pub fn commit_count(&self) -> usize {
        self.store.commit_count()
    }
}

fn parse_coord(raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| AppError::validation(format!("bad coordinate '{raw}' from geocoder")))
}
