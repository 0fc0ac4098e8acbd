//! Remote-service integration.
//!
//! - `credentials`: cached credential pair and landing-page extraction
//! - `client`: timetable API client with bounded retry policies
//! - `geocode`: Nominatim lookups behind a persistent cache

pub mod client;
pub mod credentials;
pub mod geocode;

pub use client::ApiClient;
pub use credentials::{Credential, CredentialFile, CredentialState};
pub use geocode::{GeocodeCache, GeocodeMatch, Geocoder, NominatimGeocoder};
