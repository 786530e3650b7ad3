//! Validator registration pipeline. A cheap synchronous front stage filters
//! each entry of a batch, then hands it to a pool of workers that do the
//! expensive part: BLS signature verification and persistence.

use crate::{
    datastore::Datastore,
    metrics,
    signing::verify_signed_message,
    types::{
        BlsPublicKey, BlsSignature, Domain, RawSignedValidatorRegistration,
        SignedValidatorRegistration, ValidatorRegistration,
    },
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

pub const REGISTRATION_QUEUE_CAPACITY: usize = 5000;

/// Registrations may not be stamped further into the future than this.
const MAX_TIMESTAMP_AHEAD_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validator registration workers already started")]
    WorkersAlreadyStarted,
}

/// Per-entry rejection reasons surfaced to the caller. The batch keeps
/// processing past them; only the last one makes it into the response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    #[error("invalid pubkey length")]
    InvalidPublicKeyLength,
    #[error("invalid signature length")]
    InvalidSignatureLength,
    #[error("timestamp too far in the future")]
    FutureTimestamp,
    #[error("not a known validator: {0}")]
    UnknownValidator(BlsPublicKey),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub received: usize,
    pub queued: usize,
    pub last_changed: Option<BlsPublicKey>,
    pub last_error: Option<RegistrationError>,
}

pub struct ValidatorRegistrar {
    datastore: Arc<dyn Datastore>,
    builder_domain: Domain,
    worker_count: usize,
    sender: mpsc::Sender<SignedValidatorRegistration>,
    receiver: parking_lot::Mutex<Option<mpsc::Receiver<SignedValidatorRegistration>>>,
}

impl ValidatorRegistrar {
    pub fn new(datastore: Arc<dyn Datastore>, builder_domain: Domain, worker_count: usize) -> Self {
        let worker_count = if worker_count == 0 { num_cpus::get() } else { worker_count };
        let (sender, receiver) = mpsc::channel(REGISTRATION_QUEUE_CAPACITY);
        Self {
            datastore,
            builder_domain,
            worker_count,
            sender,
            receiver: parking_lot::Mutex::new(Some(receiver)),
        }
    }

    /// Starts the worker pool draining the registration queue. Can only be
    /// invoked once.
    pub fn start_workers(&self) -> Result<(), Error> {
        let receiver = self.receiver.lock().take().ok_or(Error::WorkersAlreadyStarted)?;
        info!(count = self.worker_count, "starting validator registration workers");
        let receiver = Arc::new(Mutex::new(receiver));
        for worker in 0..self.worker_count {
            let receiver = receiver.clone();
            let datastore = self.datastore.clone();
            let domain = self.builder_domain;
            tokio::spawn(run_worker(worker, receiver, datastore, domain));
        }
        Ok(())
    }

    /// Front stage: validates each entry in order and queues the survivors.
    /// A full queue exerts backpressure on the caller instead of dropping.
    pub async fn handle_batch(&self, entries: Vec<RawSignedValidatorRegistration>) -> BatchReport {
        let now = unix_timestamp();
        let mut report = BatchReport { received: entries.len(), ..Default::default() };
        for entry in entries {
            match self.process_entry(entry, now).await {
                Ok(Some(registration)) => {
                    let public_key = registration.message.public_key;
                    if self.sender.send(registration).await.is_err() {
                        error!(%public_key, "registration queue closed, entry dropped");
                        continue;
                    }
                    metrics::inc_registration("queued");
                    report.queued += 1;
                    report.last_changed = Some(public_key);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(%err, "rejecting validator registration");
                    metrics::inc_registration("rejected");
                    report.last_error = Some(err);
                }
            }
        }
        report
    }

    async fn process_entry(
        &self,
        entry: RawSignedValidatorRegistration,
        now: u64,
    ) -> Result<Option<SignedValidatorRegistration>, RegistrationError> {
        let Some(message) = entry.message else {
            warn!("registration without message");
            return Ok(None);
        };

        if message.public_key.len() != 48 {
            return Err(RegistrationError::InvalidPublicKeyLength);
        }
        let public_key = BlsPublicKey::try_from(message.public_key.as_ref())
            .map_err(|_| RegistrationError::InvalidPublicKeyLength)?;

        if entry.signature.len() != 96 {
            return Err(RegistrationError::InvalidSignatureLength);
        }
        let signature = BlsSignature::try_from(entry.signature.as_ref())
            .map_err(|_| RegistrationError::InvalidSignatureLength)?;

        if message.timestamp > now + MAX_TIMESTAMP_AHEAD_SECS {
            return Err(RegistrationError::FutureTimestamp);
        }

        match self.datastore.is_known_validator(&public_key).await {
            Ok(true) => {}
            Ok(false) => return Err(RegistrationError::UnknownValidator(public_key)),
            Err(err) => {
                warn!(%err, %public_key, "could not check known-validator set");
                return Err(RegistrationError::UnknownValidator(public_key));
            }
        }

        let previous = match self.datastore.get_validator_registration_timestamp(&public_key).await
        {
            Ok(timestamp) => timestamp,
            Err(err) => {
                info!(%err, %public_key, "error getting last registration timestamp");
                None
            }
        };
        // already up to date, nothing to do
        if previous.is_some_and(|timestamp| timestamp >= message.timestamp) {
            return Ok(None);
        }

        Ok(Some(SignedValidatorRegistration {
            message: ValidatorRegistration {
                fee_recipient: message.fee_recipient,
                gas_limit: message.gas_limit,
                timestamp: message.timestamp,
                public_key,
            },
            signature,
        }))
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<SignedValidatorRegistration>>>,
    datastore: Arc<dyn Datastore>,
    domain: Domain,
) {
    loop {
        let registration = { receiver.lock().await.recv().await };
        let Some(registration) = registration else { break };

        let public_key = registration.message.public_key;
        if let Err(err) = verify_signed_message(
            &registration.message,
            &registration.signature,
            &public_key,
            domain,
        ) {
            warn!(%err, %public_key, worker, "failed to verify registration signature");
            metrics::inc_registration("verification_failed");
            continue;
        }
        metrics::inc_registration("verified");

        if let Err(err) = datastore.set_validator_registration(registration).await {
            error!(%err, %public_key, "error updating validator registration");
        }
    }
    debug!(worker, "registration worker exiting");
}

fn unix_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}
