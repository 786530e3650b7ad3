//! The relay core: tracks the chain head, ranks builder bids per auction
//! lane, signs the winning header, and releases payloads for signed blinded
//! blocks.

use crate::{
    auction_store::{AuctionStore, BidKey, BlockKey, SubmitOutcome},
    beacon::BeaconClient,
    datastore::Datastore,
    error::Error,
    metrics,
    registrar::{self, BatchReport, ValidatorRegistrar},
    scheduler::{self, ProposerScheduler},
    signing::{
        compute_builder_domain, compute_proposer_domain, sign_message, verify_signed_message,
        SecretKey,
    },
    types::{
        BlsPublicKey, BuilderBid, Domain, Epoch, Fork, ForkVersion, GetHeaderResponse,
        GetPayloadResponse, ProposerSchedule, RawSignedValidatorRegistration, SignedBidSubmission,
        SignedBlindedBeaconBlock, SignedBuilderBid, Slot,
    },
    SLOTS_PER_EPOCH,
};
use alloy_primitives::{hex, U256};
use parking_lot::RwLock;
use std::{ops::Deref, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

// Bids older than the horizon are dropped whenever the head crosses an
// interval boundary.
const EVICTION_INTERVAL: Slot = 10;
const EVICTION_HORIZON: Slot = 10;

#[derive(Clone)]
pub struct Relay(Arc<Inner>);

impl Deref for Relay {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct Inner {
    public_key: BlsPublicKey,
    secret_key: SecretKey,
    genesis_fork_version: ForkVersion,
    builder_domain: Domain,
    proposer_domain: Domain,
    get_header_wait_time: Duration,
    allow_zero_value_blocks: bool,
    store: AuctionStore,
    registrar: ValidatorRegistrar,
    scheduler: ProposerScheduler,
    status_page: RwLock<String>,
}

impl Relay {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        secret_key: SecretKey,
        genesis_fork_version: ForkVersion,
        beacon: Arc<dyn BeaconClient>,
        datastore: Arc<dyn Datastore>,
        worker_count: usize,
        get_header_wait_time: Duration,
        allow_zero_value_blocks: bool,
    ) -> Self {
        let public_key = secret_key.public_key();
        let builder_domain = compute_builder_domain(genesis_fork_version);
        let proposer_domain = compute_proposer_domain(genesis_fork_version);
        let registrar = ValidatorRegistrar::new(datastore.clone(), builder_domain, worker_count);
        let scheduler = ProposerScheduler::new(beacon, datastore);

        let inner = Inner {
            public_key,
            secret_key,
            genesis_fork_version,
            builder_domain,
            proposer_domain,
            get_header_wait_time,
            allow_zero_value_blocks,
            store: AuctionStore::default(),
            registrar,
            scheduler,
            status_page: RwLock::new(String::new()),
        };
        inner.set_registered_validators(0);
        Self(Arc::new(inner))
    }

    /// Processes a new head slot: evicts expired bids on interval boundaries
    /// and kicks off a duty refresh for the slot's epoch in the background.
    pub fn process_new_slot(&self, head_slot: Slot) {
        let epoch = head_slot / SLOTS_PER_EPOCH;
        info!(
            slot = head_slot,
            epoch,
            slot_last_in_epoch = (epoch + 1) * SLOTS_PER_EPOCH - 1,
            "updated head slot"
        );

        if head_slot % EVICTION_INTERVAL == 0 {
            let stats = self.store.evict_before(head_slot.saturating_sub(EVICTION_HORIZON));
            metrics::EVICTED_BIDS_COUNTER.inc_by(stats.removed as u64);
            info!(removed = stats.removed, remaining = stats.remaining, "evicted stale bids");
        }

        let relay = self.clone();
        tokio::spawn(async move {
            if let Err(err) = relay.update_proposer_duties(epoch).await {
                error!(%err, epoch, "failed to update proposer duties");
            }
        });
    }
}

impl Inner {
    pub fn public_key(&self) -> BlsPublicKey {
        self.public_key
    }

    pub fn builder_domain(&self) -> Domain {
        self.builder_domain
    }

    pub fn start_registration_workers(&self) -> Result<(), registrar::Error> {
        self.registrar.start_workers()
    }

    pub async fn register_validators(
        &self,
        entries: Vec<RawSignedValidatorRegistration>,
    ) -> BatchReport {
        self.registrar.handle_batch(entries).await
    }

    /// Serves the best known bid for the auction lane, optionally waiting a
    /// configured amount of time for late submissions first.
    pub async fn fetch_best_bid(&self, key: BidKey) -> Option<GetHeaderResponse> {
        if !self.get_header_wait_time.is_zero() {
            tokio::time::sleep(self.get_header_wait_time).await;
        }
        self.store.get_bid(&key)
    }

    /// Releases the payload matching a signed blinded block. The proposer's
    /// signature is verified whenever the duty list knows who proposes the
    /// slot; without that knowledge the block hash lookup is all we have.
    pub fn open_bid(
        &self,
        signed_block: &SignedBlindedBeaconBlock,
    ) -> Result<GetPayloadResponse, Error> {
        let message = &signed_block.message;
        let block_hash = message.body.execution_payload_header.block_hash;

        match self.scheduler.get_proposer_for(message.slot) {
            Some(proposer) => verify_signed_message(
                message,
                &signed_block.signature,
                &proposer,
                self.proposer_domain,
            )
            .map_err(|err| {
                warn!(
                    %err,
                    slot = message.slot,
                    %proposer,
                    "rejecting blinded block with bad signature"
                );
                Error::InvalidSignature
            })?,
            None => {
                warn!(slot = message.slot, "proposer unknown for slot, skipping signature check")
            }
        }

        let key = BlockKey { slot: message.slot, block_hash };
        match self.store.get_payload(&key) {
            Some(payload) => {
                info!(slot = message.slot, %block_hash, "delivered the execution payload");
                Ok(payload)
            }
            None => {
                error!(slot = message.slot, %block_hash, "don't have the execution payload");
                Err(Error::UnknownPayload)
            }
        }
    }

    /// Ingests a builder's block submission. Zero-value and dominated bids
    /// are dropped without comment; a winning bid is signed under the
    /// builder domain and published together with its payload.
    pub fn submit_bid(&self, submission: SignedBidSubmission) {
        let message = &submission.message;
        let bid_key = BidKey {
            slot: message.slot,
            parent_hash: message.parent_hash,
            proposer_public_key: message.proposer_public_key,
        };

        if !self.allow_zero_value_blocks && message.value == U256::ZERO {
            debug!(slot = message.slot, "ignoring zero-value block submission");
            metrics::inc_bid_submission("zero_value");
            return;
        }

        // skip the signing work when the lane already holds a better bid
        if let Some(best) = self.store.best_bid_value(&bid_key) {
            if message.value <= best {
                debug!(slot = message.slot, value = %message.value, %best, "bid is dominated");
                metrics::inc_bid_submission("dominated");
                return;
            }
        }

        let bid = BuilderBid {
            header: submission.execution_payload.to_header(),
            value: message.value,
            public_key: self.public_key,
        };
        let signature = sign_message(&bid, &self.secret_key, self.builder_domain);
        let header_response = GetHeaderResponse {
            version: Fork::Bellatrix,
            data: SignedBuilderBid { message: bid, signature },
        };

        let block_key = BlockKey { slot: message.slot, block_hash: message.block_hash };
        let slot = message.slot;
        let builder_public_key = message.builder_public_key;
        let parent_hash = message.parent_hash;
        let proposer_public_key = message.proposer_public_key;
        let block_hash = message.block_hash;
        let value = message.value;
        let transactions = submission.execution_payload.transactions.len();
        let payload_response =
            GetPayloadResponse { version: Fork::Bellatrix, data: submission.execution_payload };

        match self.store.try_submit(bid_key, block_key, header_response, payload_response) {
            SubmitOutcome::Accepted => {
                metrics::inc_bid_submission("accepted");
                info!(
                    slot,
                    %builder_public_key,
                    %parent_hash,
                    %proposer_public_key,
                    %block_hash,
                    %value,
                    transactions,
                    "received a new block from builder"
                );
            }
            SubmitOutcome::Rejected => metrics::inc_bid_submission("dominated"),
        }
    }

    pub async fn update_proposer_duties(&self, epoch: Epoch) -> Result<(), scheduler::Error> {
        self.scheduler.on_epoch(epoch).await
    }

    pub fn proposer_schedule(&self) -> Vec<ProposerSchedule> {
        self.scheduler.proposer_schedule()
    }

    pub fn status_page(&self) -> String {
        self.status_page.read().clone()
    }

    pub fn set_registered_validators(&self, count: usize) {
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>relay-rs</title></head>\n<body>\n\
             <h1>relay-rs</h1>\n<ul>\n\
             <li>Pubkey: {}</li>\n\
             <li>Registered validators: {}</li>\n\
             <li>Genesis fork version: {}</li>\n\
             <li>Builder signing domain: {}</li>\n\
             </ul>\n</body>\n</html>\n",
            self.public_key,
            count,
            hex::encode_prefixed(self.genesis_fork_version),
            hex::encode_prefixed(self.builder_domain),
        );
        *self.status_page.write() = page;
    }
}
