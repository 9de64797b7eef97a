//! Remote transport seam
//!
//! The [`Remote`] trait is the only place the sync engine touches the network.
//! [`HttpRemote`] speaks the server's wire protocol; tests substitute an
//! in-memory fake.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::{CommitAccepted, CommitRequest, ConflictBody, GrailResponse, GrailSettings};

/// Result of fetching a grail.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Found(GrailResponse),
    /// No dataset record exists for this address
    Missing,
}

/// Result of writing a grail.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Accepted(CommitAccepted),
    /// The server's token advanced past the one we sent
    Rejected(ConflictBody),
}

/// Transport used by the sync engine.
///
/// Implementations surface protocol-level outcomes (missing, rejected) as
/// values; `Err` is reserved for transport and server failures.
#[async_trait]
pub trait Remote {
    async fn fetch_grail(&self, address: &str) -> Result<FetchOutcome>;

    async fn put_grail(&self, address: &str, request: &CommitRequest) -> Result<WriteOutcome>;

    async fn fetch_settings(&self, address: &str) -> Result<GrailSettings>;

    async fn put_settings(&self, address: &str, settings: &GrailSettings) -> Result<()>;
}

/// HTTP implementation of [`Remote`].
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn grail_url(&self, address: &str) -> String {
        format!("{}/api/v1/grail/{}", self.base_url, address)
    }

    fn settings_url(&self, address: &str) -> String {
        format!("{}/api/v1/settings/{}", self.base_url, address)
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn fetch_grail(&self, address: &str) -> Result<FetchOutcome> {
        let response = self.client.get(self.grail_url(address)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(FetchOutcome::Found(response.json().await?)),
            StatusCode::NOT_FOUND => Ok(FetchOutcome::Missing),
            status => Err(anyhow!("grail fetch failed with status {}", status)),
        }
    }

    async fn put_grail(&self, address: &str, request: &CommitRequest) -> Result<WriteOutcome> {
        let response = self
            .client
            .put(self.grail_url(address))
            .json(request)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(WriteOutcome::Accepted(response.json().await?)),
            StatusCode::CONFLICT => Ok(WriteOutcome::Rejected(response.json().await?)),
            status => Err(anyhow!("grail write failed with status {}", status)),
        }
    }

    async fn fetch_settings(&self, address: &str) -> Result<GrailSettings> {
        let response = self.client.get(self.settings_url(address)).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "settings fetch failed with status {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn put_settings(&self, address: &str, settings: &GrailSettings) -> Result<()> {
        let response = self
            .client
            .put(self.settings_url(address))
            .json(settings)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "settings write failed with status {}",
                response.status()
            ));
        }
        Ok(())
    }
}
