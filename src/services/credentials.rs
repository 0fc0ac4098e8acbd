// src/services/credentials.rs

//! Credential lifecycle: cached pair, probe classification, landing-page
//! extraction.
//!
//! The timetable API authorizes requests with a `{timestamp, token}` pair the
//! provider embeds in a script literal on its public landing page. The pair is
//! cached on disk between runs; a missing or unreadable cache simply means a
//! fresh pair must be fetched.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};

/// The session-scoped credential pair for the timetable API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Timestamp string issued alongside the token (`cTIMESTAMP`)
    pub issued_at: String,
    /// Opaque session token (`cTOKEN`)
    pub token: String,
}

/// Outcome of checking the cached credential against the live service.
#[derive(Debug)]
pub enum CredentialState {
    /// The cached pair still authorizes requests.
    Valid(Credential),
    /// A cached pair exists but the service rejects it.
    Invalid,
    /// No usable cached pair on disk.
    Absent,
}

/// Durable storage for the credential pair, serialized as `[timestamp, token]`.
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last-persisted pair. A missing or malformed file reads as
    /// `None`; that is the refresh trigger, not an error.
    pub fn load(&self) -> Option<Credential> {
        let text = fs::read_to_string(&self.path).ok()?;
        let (issued_at, token): (String, String) = serde_json::from_str(&text).ok()?;
        Some(Credential { issued_at, token })
    }

    /// Persist the pair, creating parent directories as needed.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(&[&credential.issued_at, &credential.token])?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiData {
    datetime: String,
    #[serde(rename = "cTimeStamp")]
    c_time_stamp: String,
}

/// Extract the credential pair from the landing page.
///
/// The page carries a `var apiData = {...};` assignment inside one of its
/// script elements. A page without it means the provider changed its format
/// and the extraction code needs updating, so this fails hard.
pub fn parse_api_data(html: &str) -> Result<Credential> {
    let script_sel = Selector::parse("script")
        .map_err(|e| AppError::validation(format!("selector 'script': {e:?}")))?;
    let literal_re = Regex::new(r"(?s)apiData\s*=\s*(\{.*?\})\s*;")
        .map_err(|e| AppError::validation(format!("apiData pattern: {e}")))?;

    let document = Html::parse_document(html);
    for script in document.select(&script_sel) {
        let text: String = script.text().collect();
        if let Some(found) = extract_pair(&literal_re, &text)? {
            return Ok(found);
        }
    }

    // Some mirrors serve the assignment outside a proper script element.
    if let Some(found) = extract_pair(&literal_re, html)? {
        return Ok(found);
    }

    Err(AppError::contract(
        "no apiData assignment found on the credential page",
    ))
}

fn extract_pair(literal_re: &Regex, text: &str) -> Result<Option<Credential>> {
    let Some(captures) = literal_re.captures(text) else {
        return Ok(None);
    };
    let data: ApiData = serde_json::from_str(&captures[1])
        .map_err(|e| AppError::contract(format!("apiData literal does not parse: {e}")))?;
    Ok(Some(Credential {
        issued_at: data.datetime,
        token: data.c_time_stamp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = concat!(
        "<html><head><script>var x = 1;</script>",
        r#"<script>var apiData = {"datetime":"2024-05-01 10:00","cTimeStamp":"tok-123"};</script>"#,
        "</head><body></body></html>",
    );

    #[test]
    fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let file = CredentialFile::new(tmp.path().join("login_data.json"));
        let credential = Credential {
            issued_at: "T".to_string(),
            token: "X".to_string(),
        };

        file.save(&credential).unwrap();
        assert_eq!(file.load(), Some(credential));
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let file = CredentialFile::new(tmp.path().join("nested/dir/login_data.json"));
        file.save(&Credential {
            issued_at: "T".to_string(),
            token: "X".to_string(),
        })
        .unwrap();
        assert!(file.path().exists());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let file = CredentialFile::new(tmp.path().join("absent.json"));
        assert_eq!(file.load(), None);
    }

    #[test]
    fn malformed_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("login_data.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CredentialFile::new(&path).load(), None);

        // Wrong shape is just as unusable as garbage.
        std::fs::write(&path, r#"{"token":"x"}"#).unwrap();
        assert_eq!(CredentialFile::new(&path).load(), None);
    }

    #[test]
    fn parses_embedded_literal() {
        let credential = parse_api_data(PAGE).unwrap();
        assert_eq!(credential.issued_at, "2024-05-01 10:00");
        assert_eq!(credential.token, "tok-123");
    }

    #[test]
    fn missing_literal_is_a_contract_break() {
        let err = parse_api_data("<html><head></head><body>plain page</body></html>").unwrap_err();
        assert!(matches!(err, AppError::CredentialContract(_)));
    }

    #[test]
    fn unparseable_literal_is_a_contract_break() {
        let page = "<script>var apiData = {datetime: broken};</script>";
        let err = parse_api_data(page).unwrap_err();
        assert!(matches!(err, AppError::CredentialContract(_)));
    }
}
