//! Boundary to the registration datastore: the known-validator set and the
//! persisted validator registrations keyed by proposer public key.

use crate::types::{BlsPublicKey, SignedValidatorRegistration};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Datastore: Send + Sync {
    async fn is_known_validator(&self, public_key: &BlsPublicKey) -> Result<bool, Error>;

    /// Reloads the known-validator set from its source, returning the new
    /// count.
    async fn refresh_known_validators(&self) -> Result<usize, Error>;

    async fn get_validator_registration(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistration>, Error>;

    async fn get_validator_registration_timestamp(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<u64>, Error>;

    async fn set_validator_registration(
        &self,
        registration: SignedValidatorRegistration,
    ) -> Result<(), Error>;
}

/// Registration storage backed by process memory. Holds the relay over until
/// a persistent backend is wired in, and doubles as the datastore used in
/// tests.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    known_validators: HashSet<BlsPublicKey>,
    registrations: HashMap<BlsPublicKey, SignedValidatorRegistration>,
}

impl MemoryDatastore {
    pub fn add_known_validator(&self, public_key: BlsPublicKey) {
        self.state.write().known_validators.insert(public_key);
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn is_known_validator(&self, public_key: &BlsPublicKey) -> Result<bool, Error> {
        Ok(self.state.read().known_validators.contains(public_key))
    }

    async fn refresh_known_validators(&self) -> Result<usize, Error> {
        Ok(self.state.read().known_validators.len())
    }

    async fn get_validator_registration(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<SignedValidatorRegistration>, Error> {
        Ok(self.state.read().registrations.get(public_key).cloned())
    }

    async fn get_validator_registration_timestamp(
        &self,
        public_key: &BlsPublicKey,
    ) -> Result<Option<u64>, Error> {
        Ok(self.state.read().registrations.get(public_key).map(|r| r.message.timestamp))
    }

    async fn set_validator_registration(
        &self,
        registration: SignedValidatorRegistration,
    ) -> Result<(), Error> {
        let public_key = registration.message.public_key;
        self.state.write().registrations.insert(public_key, registration);
        Ok(())
    }
}
