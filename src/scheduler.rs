//! Per-epoch proposer duty resolution: fetches the duty list from the beacon
//! node and joins it with the stored registrations.

use crate::{
    beacon::{BeaconClient, Error as BeaconError},
    datastore::{Datastore, Error as DatastoreError},
    types::{BlsPublicKey, Epoch, ProposerSchedule, Slot},
};
use futures::future::join_all;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Beacon(#[from] BeaconError),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}

pub struct ProposerScheduler {
    beacon: Arc<dyn BeaconClient>,
    datastore: Arc<dyn Datastore>,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    // high-water mark so each epoch is resolved at most once
    refreshed_epoch: Option<Epoch>,
    schedule: Vec<ProposerSchedule>,
    proposers_by_slot: HashMap<Slot, BlsPublicKey>,
}

impl ProposerScheduler {
    pub fn new(beacon: Arc<dyn BeaconClient>, datastore: Arc<dyn Datastore>) -> Self {
        Self { beacon, datastore, state: RwLock::new(State::default()) }
    }

    /// Resolves duties for `epoch` unless an equal or newer epoch was already
    /// resolved. A failed refresh leaves the previously published schedule in
    /// force; a partial one would mislead builders.
    pub async fn on_epoch(&self, epoch: Epoch) -> Result<(), Error> {
        {
            let state = self.state.read();
            if state.refreshed_epoch.is_some_and(|refreshed| epoch <= refreshed) {
                return Ok(());
            }
        }

        debug!(epoch, "updating proposer duties");
        let duties = self.beacon.get_proposer_duties(epoch).await?;

        let lookups = duties
            .iter()
            .map(|duty| self.datastore.get_validator_registration(&duty.public_key));
        let registrations = join_all(lookups).await;

        let mut schedule = Vec::new();
        for (duty, registration) in duties.iter().zip(registrations) {
            if let Some(entry) = registration? {
                schedule.push(ProposerSchedule { slot: duty.slot, entry });
            }
        }

        let mut state = self.state.write();
        state.refreshed_epoch = Some(epoch);
        state.proposers_by_slot =
            duties.into_iter().map(|duty| (duty.slot, duty.public_key)).collect();
        info!(epoch, duties = schedule.len(), "proposer duties updated");
        state.schedule = schedule;
        Ok(())
    }

    /// The currently published duty list, joined with registrations.
    pub fn proposer_schedule(&self) -> Vec<ProposerSchedule> {
        self.state.read().schedule.clone()
    }

    /// The proposer assigned to `slot`, whether registered with us or not.
    pub fn get_proposer_for(&self, slot: Slot) -> Option<BlsPublicKey> {
        self.state.read().proposers_by_slot.get(&slot).copied()
    }
}
