//! Mirrors plates to a fixed-name cloud spreadsheet document.
//!
//! The transport is abstracted behind [`RemoteApi`] so the store can be
//! driven against an in-memory double in tests; [`HttpRemoteApi`] is the
//! production implementation, speaking JSON to the document service with a
//! bearer token loaded from an external credentials file.

use std::path::Path;

use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::error::{ElisaError, Result};
use crate::grid;
use crate::io::{PlateReader, PlateWriter};
use crate::model::Plate;

/// One plate's rendered section in the remote document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSection {
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

/// Transport used to reach the remote document. Authentication and document
/// discovery live behind this seam; the store only deals in sections.
pub trait RemoteApi {
    /// Replaces the section with the same title, or appends it.
    fn put_section(&mut self, section: &RemoteSection) -> Result<()>;

    /// Lists every section currently stored in the document.
    fn list_sections(&mut self) -> Result<Vec<RemoteSection>>;
}

/// Token loaded from the caller-supplied credentials file. Provisioning the
/// file itself (service account, key rotation) is outside the tool.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub token: String,
}

/// Reads API credentials from a JSON file.
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// HTTP implementation of [`RemoteApi`] against a document service.
pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
    document: String,
    token: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(
        base_url: impl Into<String>,
        document: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            document: document.into(),
            token,
        }
    }

    fn sheets_url(&self) -> String {
        format!(
            "{}/documents/{}/sheets",
            self.base_url.trim_end_matches('/'),
            self.document
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteApi for HttpRemoteApi {
    fn put_section(&mut self, section: &RemoteSection) -> Result<()> {
        let request = self.authorize(self.client.put(self.sheets_url()).json(section));
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ElisaError::Remote(format!(
                "document '{}' rejected section '{}': {status}",
                self.document, section.title
            )));
        }
        Ok(())
    }

    fn list_sections(&mut self) -> Result<Vec<RemoteSection>> {
        let request = self.authorize(self.client.get(self.sheets_url()));
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ElisaError::Remote(format!(
                "document '{}' could not be listed: {status}",
                self.document
            )));
        }
        Ok(response.json()?)
    }
}

/// Remote mirror of the plate store.
pub struct RemoteStore<A> {
    api: A,
}

impl<A: RemoteApi> RemoteStore<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

impl<A: RemoteApi> PlateWriter for RemoteStore<A> {
    #[instrument(level = "debug", skip_all, fields(plate = %plate.name()))]
    fn save(&mut self, plate: &Plate) -> Result<()> {
        let section = grid::plate_section(plate);
        self.api.put_section(&RemoteSection {
            title: section.sheet_name,
            rows: section.rows,
        })
    }
}

impl<A: RemoteApi> PlateReader for RemoteStore<A> {
    /// Reads every section back into plates. A section that does not parse
    /// into a well-formed plate is skipped with a warning rather than
    /// failing the whole fetch.
    #[instrument(level = "debug", skip_all)]
    fn fetch_all(&mut self) -> Result<Vec<Plate>> {
        let sections = self.api.list_sections()?;
        let mut plates = Vec::with_capacity(sections.len());
        for section in sections {
            match parse_remote_section(&section) {
                Ok(plate) => plates.push(plate),
                Err(error) => warn!(
                    section = %section.title,
                    error = %error,
                    "skipping unreadable remote section"
                ),
            }
        }
        Ok(plates)
    }
}

fn parse_remote_section(section: &RemoteSection) -> Result<Plate> {
    let plate = grid::parse_section(&section.rows)
        .map_err(|error| ElisaError::RemoteRead(error.to_string()))?;
    plate
        .validate()
        .map_err(|error| ElisaError::RemoteRead(error.to_string()))?;
    Ok(plate)
}
