//! HTTP surface of the relay: the proposer-facing builder API, the
//! builder-facing relay API, and the optional metrics endpoint.

use crate::{
    auction_store::BidKey,
    error::Error,
    metrics::{self, ApiMethod},
    relay::Relay,
    types::{
        BlsPublicKey, Hash32, ProposerSchedule, RawSignedValidatorRegistration,
        SignedBidSubmission, SignedBlindedBeaconBlock, Slot,
    },
};
use axum::{
    body::Bytes,
    extract::{Json, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Instant,
};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

// Proposer API (builder-specs)
const PATH_STATUS: &str = "/eth/v1/builder/status";
const PATH_REGISTER_VALIDATOR: &str = "/eth/v1/builder/validators";
const PATH_GET_HEADER: &str = "/eth/v1/builder/header/:slot/:parent_hash/:pubkey";
const PATH_GET_PAYLOAD: &str = "/eth/v1/builder/blinded_blocks";

// Block builder API
const PATH_BUILDER_GET_VALIDATORS: &str = "/relay/v1/builder/validators";
const PATH_SUBMIT_NEW_BLOCK: &str = "/relay/v1/builder/blocks";

async fn handle_root(State(relay): State<Relay>) -> Html<String> {
    Html(relay.status_page())
}

async fn handle_status_check() -> impl IntoResponse {
    metrics::inc_api_request(ApiMethod::Status);
    StatusCode::OK
}

async fn handle_register_validator(
    State(relay): State<Relay>,
    body: Bytes,
) -> Result<StatusCode, Error> {
    metrics::inc_api_request(ApiMethod::RegisterValidator);
    let start = Instant::now();

    let registrations: Vec<RawSignedValidatorRegistration> =
        serde_json::from_slice(&body).map_err(|err| Error::InvalidJson(err.to_string()))?;

    let report = relay.register_validators(registrations).await;
    info!(
        received = report.received,
        queued = report.queued,
        last_changed = ?report.last_changed,
        error = ?report.last_error,
        elapsed = ?start.elapsed(),
        "validator registrations done"
    );

    match report.last_error {
        Some(err) => Err(err.into()),
        None => Ok(StatusCode::OK),
    }
}

async fn handle_get_header(
    State(relay): State<Relay>,
    Path((slot, parent_hash, public_key)): Path<(String, String, String)>,
) -> Result<Response, Error> {
    metrics::inc_api_request(ApiMethod::GetHeader);
    info!(%slot, %parent_hash, %public_key, "getHeader");

    let slot: Slot = slot.parse().map_err(|_| Error::InvalidSlot)?;
    if public_key.len() != 98 {
        return Err(Error::InvalidPublicKey);
    }
    if parent_hash.len() != 66 {
        return Err(Error::InvalidHash);
    }
    let proposer_public_key: BlsPublicKey =
        public_key.parse().map_err(|_| Error::InvalidPublicKey)?;
    let parent_hash: Hash32 = parent_hash.parse().map_err(|_| Error::InvalidHash)?;

    let key = BidKey { slot, parent_hash, proposer_public_key };
    match relay.fetch_best_bid(key).await {
        Some(bid) => Ok(Json(bid).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn handle_get_payload(State(relay): State<Relay>, body: Bytes) -> Result<Response, Error> {
    metrics::inc_api_request(ApiMethod::GetPayload);

    let signed_block: SignedBlindedBeaconBlock =
        serde_json::from_slice(&body).map_err(|err| Error::InvalidJson(err.to_string()))?;
    let payload = relay.open_bid(&signed_block)?;
    Ok(Json(payload).into_response())
}

async fn handle_builder_get_validators(
    State(relay): State<Relay>,
) -> Json<Vec<ProposerSchedule>> {
    metrics::inc_api_request(ApiMethod::GetValidators);
    Json(relay.proposer_schedule())
}

async fn handle_submit_new_block(
    State(relay): State<Relay>,
    body: Bytes,
) -> Result<StatusCode, Error> {
    metrics::inc_api_request(ApiMethod::SubmitBlock);

    let submission: SignedBidSubmission =
        serde_json::from_slice(&body).map_err(|err| Error::InvalidJson(err.to_string()))?;
    relay.submit_bid(submission);
    Ok(StatusCode::OK)
}

async fn handle_metrics() -> Response {
    let encoder = prometheus::TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(body) => body.into_response(),
        Err(err) => {
            error!(%err, "could not encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub struct Server {
    host: Ipv4Addr,
    port: u16,
    relay: Relay,
    proposer_api: bool,
    builder_api: bool,
    metrics_api: bool,
}

impl Server {
    pub fn new(
        host: Ipv4Addr,
        port: u16,
        relay: Relay,
        proposer_api: bool,
        builder_api: bool,
        metrics_api: bool,
    ) -> Self {
        Self { host, port, relay, proposer_api, builder_api, metrics_api }
    }

    fn router(&self) -> Router {
        let mut router = Router::new().route("/", get(handle_root));

        if self.proposer_api {
            router = router
                .route(PATH_STATUS, get(handle_status_check))
                .route(PATH_REGISTER_VALIDATOR, post(handle_register_validator))
                .route(PATH_GET_HEADER, get(handle_get_header))
                .route(PATH_GET_PAYLOAD, post(handle_get_payload));
        }

        if self.builder_api {
            router = router
                .route(PATH_BUILDER_GET_VALIDATORS, get(handle_builder_get_validators))
                .route(PATH_SUBMIT_NEW_BLOCK, post(handle_submit_new_block));
        }

        if self.metrics_api {
            router = router.route("/metrics", get(handle_metrics));
        }

        router.with_state(self.relay.clone())
    }

    /// Binds the listen address and spawns the server onto its own task,
    /// returning the bound address alongside the task handle.
    pub async fn spawn(self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let router = self.router();
        let listener = TcpListener::bind(SocketAddr::from((self.host, self.port))).await?;
        let address = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            info!("listening at {address}...");
            if let Err(err) = axum::serve(listener, router).await {
                error!(%err, "error while listening for incoming")
            }
        });
        Ok((address, handle))
    }
}
