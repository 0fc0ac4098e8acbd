// src/services/client.rs

//! Timetable API client with bounded retry policies.
//!
//! Two failure classes get retried, each under its own budget:
//! - connect timeouts: retried immediately, no backoff;
//! - 4xx statuses: the credential pair is refreshed before the retry, so the
//!   retried request never carries the token the service just rejected.
//!
//! Anything that outlives its budget is fatal and unwinds to the pipeline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method};

use crate::error::{AppError, Result};
use crate::models::stop::parse_catalog;
use crate::models::{Config, StopRecord};
use crate::services::credentials::{Credential, CredentialFile, CredentialState, parse_api_data};

/// The timetable service answers in Latin-1 no matter what the request asks.
const RESPONSE_CHARSET: &str = "ISO-8859-1";

/// Client for the timetable API, owning the single active credential pair.
pub struct ApiClient {
    http: Client,
    config: Arc<Config>,
    store: CredentialFile,
    credential: Option<Credential>,
}

impl ApiClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.api.user_agent)
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;
        let store = CredentialFile::new(config.storage.credentials_path());
        Ok(Self {
            http,
            config,
            store,
            credential: None,
        })
    }

    /// The credential currently in use, if any.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Classify the cached credential without touching client state.
    ///
    /// One probe request, one answer. Retry behavior belongs to `send`, not
    /// here.
    pub async fn check_cached(&self) -> Result<CredentialState> {
        let Some(credential) = self.store.load() else {
            return Ok(CredentialState::Absent);
        };
        if self.probe(&credential).await? {
            Ok(CredentialState::Valid(credential))
        } else {
            Ok(CredentialState::Invalid)
        }
    }

    /// Establish a working credential: cached pair if the service still takes
    /// it, a fresh one from the landing page otherwise.
    pub async fn authenticate(&mut self) -> Result<()> {
        match self.check_cached().await? {
            CredentialState::Valid(credential) => {
                log::info!("Using cached credentials from {}", self.store.path().display());
                self.credential = Some(credential);
                Ok(())
            }
            CredentialState::Invalid => {
                log::info!("Cached credentials rejected by the service");
                self.refresh().await
            }
            CredentialState::Absent => {
                log::info!("No cached credentials at {}", self.store.path().display());
                self.refresh().await
            }
        }
    }

    /// Pull a fresh credential pair off the public landing page, persist it,
    /// and make it the active pair.
    pub async fn refresh(&mut self) -> Result<()> {
        let landing_url = self.config.api.landing_url.clone();
        log::info!("Fetching new credentials from {landing_url}");

        let body = self.get_with_transport_retry(&landing_url).await?;
        let credential = parse_api_data(&body)?;
        self.store.save(&credential)?;
        log::info!(
            "Credentials refreshed (issued {}) and written to {}",
            credential.issued_at,
            self.store.path().display()
        );
        self.credential = Some(credential);
        Ok(())
    }

    /// One logical request under both retry policies, returning the decoded
    /// body.
    ///
    /// The active credential is injected into the query on every attempt, so
    /// an auth-triggered retry automatically carries the refreshed pair. The
    /// transport budget restarts after each auth retry; both budgets are
    /// finite.
    pub async fn send(
        &mut self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<String> {
        let mut transport_left = self.config.api.transport_retries;
        let mut auth_left = self.config.api.auth_retries;

        loop {
            let mut query = params.to_vec();
            if let Some(credential) = &self.credential {
                query.push(("cTOKEN".to_string(), credential.token.clone()));
                query.push(("cTIMESTAMP".to_string(), credential.issued_at.clone()));
            }

            let response = match self
                .http
                .request(method.clone(), url)
                .query(&query)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if is_transient(&e) => {
                    if transport_left == 0 {
                        return Err(AppError::exhausted(url, format!("transport failure: {e}")));
                    }
                    transport_left -= 1;
                    log::warn!("Transport failure on {url}, retrying: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if response.status().is_client_error() {
                let status = response.status();
                if auth_left == 0 {
                    return Err(AppError::exhausted(
                        url,
                        format!("status {status} after credential refreshes"),
                    ));
                }
                auth_left -= 1;
                log::warn!("Got {status} from {url}, refreshing credentials");
                self.refresh().await?;
                transport_left = self.config.api.transport_retries;
                continue;
            }

            return Ok(response.text_with_charset(RESPONSE_CHARSET).await?);
        }
    }

    /// Fetch the stop catalog. An empty query enumerates every stop.
    pub async fn fetch_stops(&mut self, query: &str) -> Result<Vec<StopRecord>> {
        let url = self.config.api.stations_url.clone();
        let params = vec![
            ("JSON".to_string(), "1".to_string()),
            ("SearchType".to_string(), "2".to_string()),
            ("POS_NAZ".to_string(), query.to_string()),
        ];

        let body = self.send(Method::GET, &url, &params).await?;
        let envelope = parse_catalog(&body)?;
        let code = envelope.error_code()?;
        if code != 0 {
            return Err(AppError::validation(format!(
                "catalog request rejected with error code {code}"
            )));
        }
        envelope.into_stops()
    }

    /// Probe the catalog endpoint with the given credential.
    ///
    /// The validity oracle is the embedded error code, not the HTTP status;
    /// a rejected or unparseable answer just reads as "invalid".
    async fn probe(&self, credential: &Credential) -> Result<bool> {
        let params = [
            ("JSON", "1"),
            ("SearchType", "2"),
            ("cTOKEN", credential.token.as_str()),
            ("cTIMESTAMP", credential.issued_at.as_str()),
            ("POS_NAZ", self.config.api.probe_query.as_str()),
        ];
        let response = self
            .http
            .get(&self.config.api.stations_url)
            .query(&params)
            .send()
            .await?;
        if response.status().is_client_error() {
            return Ok(false);
        }

        let body = response.text_with_charset(RESPONSE_CHARSET).await?;
        let valid = parse_catalog(&body)
            .and_then(|envelope| envelope.error_code())
            .map(|code| code == 0)
            .unwrap_or(false);
        log::debug!("Credential probe result: valid={valid}");
        Ok(valid)
    }

    /// GET with the transport policy only. Used for the landing page, where a
    /// 4xx cannot be cured by refreshing the very credential being fetched.
    async fn get_with_transport_retry(&self, url: &str) -> Result<String> {
        let mut transport_left = self.config.api.transport_retries;
        loop {
            match self.http.get(url).send().await {
                Ok(response) => return Ok(response.error_for_status()?.text().await?),
                Err(e) if is_transient(&e) => {
                    if transport_left == 0 {
                        return Err(AppError::exhausted(url, format!("transport failure: {e}")));
                    }
                    transport_left -= 1;
                    log::warn!("Transport failure on {url}, retrying: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use httpmock::Method::GET;
    use httpmock::MockServer;
    use tempfile::TempDir;

    const LANDING_PAGE: &str =
        r#"<html><script>var apiData = {"datetime":"T","cTimeStamp":"X"};</script></html>"#;

    fn test_config(server: &MockServer, data_dir: &std::path::Path) -> Arc<Config> {
        let mut config = Config::default();
        config.api.stations_url = server.url("/stations");
        config.api.landing_url = server.url("/landing");
        config.api.timeout_secs = 2;
        config.storage.data_dir = data_dir.to_path_buf();
        Arc::new(config)
    }

    #[tokio::test]
    async fn client_error_triggers_two_refreshes_then_fails() {
        let server = MockServer::start();
        let stations = server.mock(|when, then| {
            when.method(GET).path("/stations");
            then.status(403);
        });
        let landing = server.mock(|when, then| {
            when.method(GET).path("/landing");
            then.status(200).body(LANDING_PAGE);
        });

        let tmp = TempDir::new().unwrap();
        let config = test_config(&server, tmp.path());
        let mut client = ApiClient::new(Arc::clone(&config)).unwrap();

        let url = config.api.stations_url.clone();
        let err = client.send(Method::GET, &url, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::RequestExhausted { .. }));
        stations.assert_hits(3);
        landing.assert_hits(2);
    }

    #[tokio::test]
    async fn refresh_persists_the_extracted_pair() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/landing");
            then.status(200).body(LANDING_PAGE);
        });

        let tmp = TempDir::new().unwrap();
        let config = test_config(&server, tmp.path());
        let mut client = ApiClient::new(Arc::clone(&config)).unwrap();

        client.refresh().await.unwrap();

        let stored = CredentialFile::new(config.storage.credentials_path())
            .load()
            .unwrap();
        assert_eq!(stored.issued_at, "T");
        assert_eq!(stored.token, "X");
        assert_eq!(client.credential(), Some(&stored));

        let raw = std::fs::read_to_string(config.storage.credentials_path()).unwrap();
        assert_eq!(raw, r#"["T","X"]"#);
    }

    #[tokio::test]
    async fn valid_cached_credentials_skip_the_landing_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/stations");
            then.status(200)
                .body(r#"[{"Error":"0","DepartureStations":[]}]"#);
        });
        let landing = server.mock(|when, then| {
            when.method(GET).path("/landing");
            then.status(200).body(LANDING_PAGE);
        });

        let tmp = TempDir::new().unwrap();
        let config = test_config(&server, tmp.path());
        let cached = Credential {
            issued_at: "old-T".to_string(),
            token: "old-X".to_string(),
        };
        CredentialFile::new(config.storage.credentials_path())
            .save(&cached)
            .unwrap();

        let mut client = ApiClient::new(config).unwrap();
        client.authenticate().await.unwrap();

        assert_eq!(client.credential(), Some(&cached));
        landing.assert_hits(0);
    }

    #[tokio::test]
    async fn rejected_cached_credentials_fall_back_to_refresh() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/stations");
            then.status(200).body(r#"[{"Error":"99"}]"#);
        });
        let landing = server.mock(|when, then| {
            when.method(GET).path("/landing");
            then.status(200).body(LANDING_PAGE);
        });

        let tmp = TempDir::new().unwrap();
        let config = test_config(&server, tmp.path());
        CredentialFile::new(config.storage.credentials_path())
            .save(&Credential {
                issued_at: "stale-T".to_string(),
                token: "stale-X".to_string(),
            })
            .unwrap();

        let mut client = ApiClient::new(config).unwrap();
        client.authenticate().await.unwrap();

        landing.assert_hits(1);
        assert_eq!(client.credential().unwrap().token, "X");
    }

    #[tokio::test]
    async fn fetch_stops_parses_the_catalog() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/stations")
                .query_param("POS_NAZ", "Bled");
            then.status(200).body(
                r#"[{"DepartureStations":[{"JPOS_IJPP":"77","POS_NAZ":"Bled union"}]}]"#,
            );
        });

        let tmp = TempDir::new().unwrap();
        let config = test_config(&server, tmp.path());
        let mut client = ApiClient::new(config).unwrap();

        let stops = client.fetch_stops("Bled").await.unwrap();
        assert_eq!(
            stops,
            vec![StopRecord {
                id: 77,
                name: "Bled union".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn timeouts_stop_after_four_attempts() {
        // A listener that accepts and then goes silent forces the client's
        // read timeout on every attempt.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let accept_hits = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_hits.fetch_add(1, Ordering::SeqCst);
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_secs(30));
                    drop(stream);
                });
            }
        });

        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.api.timeout_secs = 1;
        config.api.stations_url = format!("http://{addr}/stations");
        config.storage.data_dir = tmp.path().to_path_buf();

        let mut client = ApiClient::new(Arc::new(config)).unwrap();
        let url = format!("http://{addr}/stations");
        let err = client.send(Method::GET, &url, &[]).await.unwrap_err();

        assert!(matches!(err, AppError::RequestExhausted { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }
}
