//! Mock collaborators for tests: a scriptable beacon client and a datastore
//! wrapper that counts writes.

use crate::{
    beacon::{BeaconClient, Error as BeaconError, ProposerDuty, SyncStatus},
    datastore::{Datastore, Error as DatastoreError, MemoryDatastore},
    types::{BlsPublicKey, Epoch, SignedValidatorRegistration, Slot},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Beacon client serving canned responses. Head events are pushed by the
/// test through `push_head_slot`.
#[derive(Default)]
pub struct StaticBeaconClient {
    head_slot: Slot,
    duties: Mutex<Vec<ProposerDuty>>,
    duty_requests: AtomicUsize,
    head_sink: Mutex<Option<mpsc::Sender<Slot>>>,
}

impl StaticBeaconClient {
    pub fn new(head_slot: Slot) -> Self {
        Self { head_slot, ..Default::default() }
    }

    pub fn set_duties(&self, duties: Vec<ProposerDuty>) {
        *self.duties.lock() = duties;
    }

    pub fn duty_requests(&self) -> usize {
        self.duty_requests.load(Ordering::SeqCst)
    }

    /// Emits a head event, waiting for the subscription to come up first.
    pub async fn push_head_slot(&self, slot: Slot) {
        for _ in 0..100 {
            let sink = self.head_sink.lock().clone();
            if let Some(sink) = sink {
                sink.send(slot).await.expect("head sink closed");
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("head subscription not started");
    }
}

#[async_trait]
impl BeaconClient for StaticBeaconClient {
    async fn sync_status(&self) -> Result<SyncStatus, BeaconError> {
        Ok(SyncStatus { head_slot: self.head_slot, is_syncing: false })
    }

    async fn get_proposer_duties(&self, _epoch: Epoch) -> Result<Vec<ProposerDuty>, BeaconError> {
        self.duty_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.duties.lock().clone())
    }

    async fn subscribe_head_events(&self, sink: mpsc::Sender<Slot>) -> Result<(), BeaconError> {
        // hold on to the sender so the test can feed slots in
        *self.head_sink.lock() = Some(sink);
        Ok(())
    }
}

/// In-memory datastore that counts `set_validator_registration` calls.
#[derive(Default)]
pub struct CountingDatastore {
    inner: MemoryDatastore,
    set_registration_calls: AtomicUsize,
}

impl CountingDatastore {
    pub fn add_known_validator(&self, public_key: BlsPublicKey) {
        self.inner.add_known_validator(public_key);
    }

    pub fn set_registration_calls(&self) -> usize {
        self.set_registration_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Datastore for CountingDatastore {
    async fn is_known_validator(&self, public_key: &BlsPublicKey) -> Result<bool, DatastoreError> {
        self.inner.is_known_validator(public_key).await
    }

    async fn refresh_known_validators(&self) -> Result<usize, DatastoreError> {
        self.inner.refresh_known_validators().await
    }

    async fn get_validator_registration(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistration>, DatastoreError> {
        self.inner.get_validator_registration(public_key).await
    }

    async fn get_validator_registration_timestamp(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<u64>, DatastoreError> {
        self.inner.get_validator_registration_timestamp(public_key).await
    }

    async fn set_validator_registration(
        &self,
        registration: SignedValidatorRegistration,
    ) -> Result<(), DatastoreError> {
        self.set_registration_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.set_validator_registration(registration).await
    }
}
