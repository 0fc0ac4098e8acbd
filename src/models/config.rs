//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timetable API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Geocoding provider settings
    #[serde(default)]
    pub geocoder: GeocoderConfig,

    /// Durable storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pipeline behavior
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.geocoder.user_agent.trim().is_empty() {
            return Err(AppError::validation("geocoder.user_agent is empty"));
        }
        if self.sync.commit_every == 0 {
            return Err(AppError::validation("sync.commit_every must be > 0"));
        }
        if self.sync.progress_every == 0 {
            return Err(AppError::validation("sync.progress_every must be > 0"));
        }
        for (name, value) in [
            ("api.stations_url", &self.api.stations_url),
            ("api.landing_url", &self.api.landing_url),
            ("geocoder.endpoint", &self.geocoder.endpoint),
        ] {
            Url::parse(value)
                .map_err(|e| AppError::validation(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            geocoder: GeocoderConfig::default(),
            storage: StorageConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Timetable API endpoints and request behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Departure stations endpoint
    #[serde(default = "defaults::stations_url")]
    pub stations_url: String,

    /// Public landing page carrying the embedded credential pair
    #[serde(default = "defaults::landing_url")]
    pub landing_url: String,

    /// Stop name used to probe whether cached credentials still work
    #[serde(default = "defaults::probe_query")]
    pub probe_query: String,

    /// Extra attempts after a connect timeout
    #[serde(default = "defaults::transport_retries")]
    pub transport_retries: u32,

    /// Extra attempts after a 4xx status (each preceded by a credential refresh)
    #[serde(default = "defaults::auth_retries")]
    pub auth_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            stations_url: defaults::stations_url(),
            landing_url: defaults::landing_url(),
            probe_query: defaults::probe_query(),
            transport_retries: defaults::transport_retries(),
            auth_retries: defaults::auth_retries(),
        }
    }
}

/// Geocoding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Search endpoint
    #[serde(default = "defaults::geocoder_endpoint")]
    pub endpoint: String,

    /// User-Agent sent to the provider (Nominatim requires one)
    #[serde(default = "defaults::geocoder_user_agent")]
    pub user_agent: String,

    /// Pause before every provider lookup, in seconds
    #[serde(default = "defaults::cooldown")]
    pub cooldown_secs: u64,

    /// Suffix appended to stop names to anchor queries to the region
    #[serde(default = "defaults::query_suffix")]
    pub query_suffix: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::geocoder_endpoint(),
            user_agent: defaults::geocoder_user_agent(),
            cooldown_secs: defaults::cooldown(),
            query_suffix: defaults::query_suffix(),
        }
    }
}

/// Durable storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the databases and the credential file
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Place catalog database file name
    #[serde(default = "defaults::places_db")]
    pub places_db: String,

    /// Geocode cache database file name
    #[serde(default = "defaults::locations_db")]
    pub locations_db: String,

    /// Cached credential pair file name
    #[serde(default = "defaults::credentials_file")]
    pub credentials_file: String,
}

impl StorageConfig {
    pub fn places_path(&self) -> PathBuf {
        self.data_dir.join(&self.places_db)
    }

    pub fn locations_path(&self) -> PathBuf {
        self.data_dir.join(&self.locations_db)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_file)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            places_db: defaults::places_db(),
            locations_db: defaults::locations_db(),
            credentials_file: defaults::credentials_file(),
        }
    }
}

/// Pipeline behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Commit durable writes after this many processed stops
    #[serde(default = "defaults::commit_every")]
    pub commit_every: usize,

    /// Log a progress line after this many processed stops
    #[serde(default = "defaults::progress_every")]
    pub progress_every: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commit_every: defaults::commit_every(),
            progress_every: defaults::progress_every(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; stopsync/1.0)".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn stations_url() -> String {
        "https://prometws.alpetour.si/WS_ArrivaSLO_TimeTable_DepartureStations.aspx".into()
    }
    pub fn landing_url() -> String {
        "https://arriva.si".into()
    }
    pub fn probe_query() -> String {
        "Radovljica".into()
    }
    pub fn transport_retries() -> u32 {
        3
    }
    pub fn auth_retries() -> u32 {
        2
    }

    // Geocoder defaults
    pub fn geocoder_endpoint() -> String {
        "https://nominatim.openstreetmap.org/search".into()
    }
    pub fn geocoder_user_agent() -> String {
        "bus-stop-locator".into()
    }
    pub fn cooldown() -> u64 {
        1
    }
    pub fn query_suffix() -> String {
        ", Slovenia".into()
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("cache")
    }
    pub fn places_db() -> String {
        "places.db".into()
    }
    pub fn locations_db() -> String {
        "locations.db".into()
    }
    pub fn credentials_file() -> String {
        "login_data.json".into()
    }

    // Sync defaults
    pub fn commit_every() -> usize {
        400
    }
    pub fn progress_every() -> usize {
        50
    }
}
