//! Data models for the synchronizer.
//!
//! - `config`: Application configuration (TOML)
//! - `stop`: Stop catalog wire types
//! - `place`: Derived place and geocode records

pub mod config;
pub mod place;
pub mod stop;

pub use config::{ApiConfig, Config, GeocoderConfig, StorageConfig, SyncConfig};
pub use place::{GeocodeResult, PlaceRecord};
pub use stop::StopRecord;
