//! Boundary to the beacon node: sync status, proposer duties, and the head
//! event stream that drives the relay's slot processing.

use crate::types::{BlsPublicKey, Epoch, Slot, ValidatorIndex};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("beacon node returned status {0}")]
    UnexpectedStatus(u16),
    #[error("invalid beacon endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed event stream: {0}")]
    EventStream(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncStatus {
    #[serde(with = "crate::serde::as_str")]
    pub head_slot: Slot,
    pub is_syncing: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProposerDuty {
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
    #[serde(with = "crate::serde::as_str")]
    pub validator_index: ValidatorIndex,
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
}

#[async_trait]
pub trait BeaconClient: Send + Sync {
    async fn sync_status(&self) -> Result<SyncStatus, Error>;

    async fn get_proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Error>;

    /// Feeds head slots into `sink` until the receiving side goes away.
    /// Implementations are expected to survive transient stream failures.
    async fn subscribe_head_events(&self, sink: mpsc::Sender<Slot>) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Url,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Deserialize)]
struct HeadEvent {
    #[serde(with = "crate::serde::as_str")]
    slot: Slot,
}

impl Client {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint, http: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        self.endpoint.join(path).map_err(Error::from)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.http.get(self.url(path)?).send().await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }
        let body: ApiResponse<T> = response.json().await?;
        Ok(body.data)
    }

    async fn stream_head_events(&self, sink: &mpsc::Sender<Slot>) -> Result<(), Error> {
        let response = self
            .http
            .get(self.url("/eth/v1/events?topics=head")?)
            .header("accept", "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk?));
            while let Some(boundary) = buffer.find("\n\n") {
                let event: String = buffer.drain(..boundary + 2).collect();
                if let Some(slot) = parse_head_event(&event)? {
                    if sink.send(slot).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
        Err(Error::EventStream("head event stream ended".to_string()))
    }
}

fn parse_head_event(event: &str) -> Result<Option<Slot>, Error> {
    let mut is_head = false;
    let mut data = None;
    for line in event.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            is_head = name.trim() == "head";
        } else if let Some(payload) = line.strip_prefix("data:") {
            data = Some(payload.trim());
        }
    }
    match data {
        Some(payload) if is_head => {
            let head: HeadEvent = serde_json::from_str(payload)
                .map_err(|err| Error::EventStream(err.to_string()))?;
            Ok(Some(head.slot))
        }
        _ => Ok(None),
    }
}

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[async_trait]
impl BeaconClient for Client {
    async fn sync_status(&self) -> Result<SyncStatus, Error> {
        self.get("/eth/v1/node/syncing").await
    }

    async fn get_proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Error> {
        self.get(&format!("/eth/v1/validator/duties/proposer/{epoch}")).await
    }

    async fn subscribe_head_events(&self, sink: mpsc::Sender<Slot>) -> Result<(), Error> {
        loop {
            if let Err(err) = self.stream_head_events(&sink).await {
                warn!(%err, "head event stream failed, reconnecting");
            }
            if sink.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}
