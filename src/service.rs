//! Wires the relay together and runs it: sync check, worker pool,
//! known-validator refresh, head tracking, and the HTTP server.

use crate::{
    beacon::{self, BeaconClient},
    config::Config,
    datastore::{self, Datastore},
    registrar,
    relay::Relay,
    server::Server,
    signing::{self, fork_version_from_hex, SecretKey},
    types::Slot,
    SECONDS_PER_SLOT, SLOTS_PER_EPOCH,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, info, warn};

const DURATION_PER_EPOCH: Duration = Duration::from_secs(SLOTS_PER_EPOCH * SECONDS_PER_SLOT);

// sized for bursts of head events while a refresh is in flight
const HEAD_EVENT_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum Error {
    #[error("beacon node is syncing")]
    BeaconNodeSyncing,
    #[error(transparent)]
    Beacon(#[from] beacon::Error),
    #[error(transparent)]
    Datastore(#[from] datastore::Error),
    #[error(transparent)]
    Signing(#[from] signing::Error),
    #[error(transparent)]
    Registrar(#[from] registrar::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Service {
    config: Config,
    beacon: Arc<dyn BeaconClient>,
    datastore: Arc<dyn Datastore>,
}

impl Service {
    pub fn new(config: Config, beacon: Arc<dyn BeaconClient>, datastore: Arc<dyn Datastore>) -> Self {
        Self { config, beacon, datastore }
    }

    /// Brings the relay up and returns once the HTTP server is accepting
    /// connections. Startup aborts on a syncing beacon node or a failing
    /// collaborator; once up, background loops log-and-continue instead.
    pub async fn spawn(self) -> Result<ServiceHandle, Error> {
        let sync_status = self.beacon.sync_status().await?;
        if sync_status.is_syncing {
            return Err(Error::BeaconNodeSyncing);
        }

        let secret_key = if self.config.secret_key.is_empty() {
            warn!("no secret key configured, generating an ephemeral one");
            SecretKey::random(&mut rand::thread_rng())
        } else {
            SecretKey::from_hex(&self.config.secret_key)?
        };
        let genesis_fork_version = fork_version_from_hex(&self.config.genesis_fork_version)?;

        let allow_zero_value_blocks = std::env::var("DEBUG_ALLOW_ZERO_VALUE_BLOCKS")
            .is_ok_and(|value| !value.is_empty());
        if allow_zero_value_blocks {
            warn!("DEBUG_ALLOW_ZERO_VALUE_BLOCKS: accepting blocks with zero value");
        }

        let relay = Relay::new(
            secret_key,
            genesis_fork_version,
            self.beacon.clone(),
            self.datastore.clone(),
            self.config.register_validator_workers,
            self.config.get_header_wait_time(),
            allow_zero_value_blocks,
        );
        info!(public_key = %relay.public_key(), "using BLS key");
        if !self.config.get_header_wait_time().is_zero() {
            info!(wait_time = ?self.config.get_header_wait_time(), "getHeader delay configured");
        }

        relay.start_registration_workers()?;

        let count = self.datastore.refresh_known_validators().await?;
        if count == 0 {
            warn!(count, "updated known validators, but have not received any");
        } else {
            info!(count, "updated known validators");
        }
        relay.set_registered_validators(count);

        let datastore = self.datastore.clone();
        let known_validator_refresher = tokio::spawn(async move {
            // the set was just primed, so wait first
            loop {
                tokio::time::sleep(DURATION_PER_EPOCH / 2).await;
                match datastore.refresh_known_validators().await {
                    Ok(0) => warn!("updated known validators, but have not received any"),
                    Ok(count) => info!(count, "updated known validators"),
                    Err(err) => error!(%err, "error refreshing known validators"),
                }
            }
        });

        relay.process_new_slot(sync_status.head_slot);

        let (head_tx, mut head_rx) = mpsc::channel::<Slot>(HEAD_EVENT_BUFFER);
        let beacon = self.beacon.clone();
        let head_subscriber = tokio::spawn(async move {
            if let Err(err) = beacon.subscribe_head_events(head_tx).await {
                error!(%err, "head event subscription terminated");
            }
        });
        let head_relay = relay.clone();
        let head_consumer = tokio::spawn(async move {
            while let Some(head_slot) = head_rx.recv().await {
                head_relay.process_new_slot(head_slot);
            }
        });

        let server = Server::new(
            self.config.host,
            self.config.port,
            relay.clone(),
            self.config.proposer_api,
            self.config.builder_api,
            self.config.metrics_api,
        );
        let (local_addr, server) = server.spawn().await?;

        Ok(ServiceHandle {
            local_addr,
            relay,
            server,
            head_subscriber,
            head_consumer,
            known_validator_refresher,
        })
    }
}

/// Handles to the spawned service tasks.
///
/// This struct is created by [`Service::spawn`].
pub struct ServiceHandle {
    pub local_addr: SocketAddr,
    pub relay: Relay,
    server: JoinHandle<()>,
    head_subscriber: JoinHandle<()>,
    head_consumer: JoinHandle<()>,
    known_validator_refresher: JoinHandle<()>,
}

impl ServiceHandle {
    /// Runs until the HTTP server or the head consumer stops.
    pub async fn join(mut self) -> Result<(), tokio::task::JoinError> {
        let result = tokio::select! {
            result = &mut self.server => result,
            result = &mut self.head_consumer => result,
        };
        self.abort();
        result
    }

    /// Tears the background tasks down.
    pub fn abort(&self) {
        self.server.abort();
        self.head_subscriber.abort();
        self.head_consumer.abort();
        self.known_validator_refresher.abort();
    }
}
