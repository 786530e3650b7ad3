use alloy_primitives::U256;
use relay_rs::{
    beacon::ProposerDuty,
    datastore::Datastore,
    signing::{compute_builder_domain, compute_proposer_domain, sign_message, SecretKey},
    test_utils::{CountingDatastore, StaticBeaconClient},
    types::{
        BidTrace, BlindedBeaconBlock, BlindedBeaconBlockBody, ExecutionPayload,
        ExecutionPayloadHeader, GetHeaderResponse, GetPayloadResponse, Hash32, ProposerSchedule,
        SignedBidSubmission, SignedBlindedBeaconBlock, SignedValidatorRegistration, Slot,
        ValidatorRegistration,
    },
    Config, Service, ServiceHandle,
};
use serde_json::json;
use std::{
    net::Ipv4Addr,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const GENESIS_FORK_VERSION: [u8; 4] = [0u8; 4];

fn get_time() -> u64 {
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    duration.as_secs()
}

struct TestRelay {
    handle: ServiceHandle,
    beacon: Arc<StaticBeaconClient>,
    datastore: Arc<CountingDatastore>,
    http: reqwest::Client,
}

impl TestRelay {
    async fn spawn(head_slot: Slot, duties: Vec<ProposerDuty>) -> Self {
        let beacon = Arc::new(StaticBeaconClient::new(head_slot));
        beacon.set_duties(duties);
        let datastore = Arc::new(CountingDatastore::default());

        let config = Config { host: Ipv4Addr::LOCALHOST, port: 0, ..Default::default() };
        let handle = Service::new(config, beacon.clone(), datastore.clone())
            .spawn()
            .await
            .expect("service starts");

        Self { handle, beacon, datastore, http: reqwest::Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.handle.local_addr, path)
    }

    async fn submit_block(&self, submission: &SignedBidSubmission) -> reqwest::StatusCode {
        self.http
            .post(self.url("/relay/v1/builder/blocks"))
            .json(submission)
            .send()
            .await
            .unwrap()
            .status()
    }

    async fn get_header(&self, slot: Slot, parent_hash: &str, pubkey: &str) -> reqwest::Response {
        self.http
            .get(self.url(&format!("/eth/v1/builder/header/{slot}/{parent_hash}/{pubkey}")))
            .send()
            .await
            .unwrap()
    }

    async fn get_payload(&self, signed_block: &SignedBlindedBeaconBlock) -> reqwest::Response {
        self.http
            .post(self.url("/eth/v1/builder/blinded_blocks"))
            .json(signed_block)
            .send()
            .await
            .unwrap()
    }
}

fn submission(
    slot: Slot,
    parent_hash: Hash32,
    proposer: &SecretKey,
    block_hash: Hash32,
    value: u64,
) -> SignedBidSubmission {
    SignedBidSubmission {
        message: BidTrace {
            slot,
            parent_hash,
            block_hash,
            proposer_public_key: proposer.public_key(),
            value: U256::from(value),
            ..Default::default()
        },
        execution_payload: ExecutionPayload {
            parent_hash,
            block_hash,
            block_number: slot,
            ..Default::default()
        },
        signature: Default::default(),
    }
}

fn blinded_block(
    slot: Slot,
    header: ExecutionPayloadHeader,
    proposer: Option<&SecretKey>,
) -> SignedBlindedBeaconBlock {
    let message = BlindedBeaconBlock {
        slot,
        body: BlindedBeaconBlockBody { execution_payload_header: header },
        ..Default::default()
    };
    let signature = match proposer {
        Some(key) => sign_message(&message, key, compute_proposer_domain(GENESIS_FORK_VERSION)),
        None => Default::default(),
    };
    SignedBlindedBeaconBlock { message, signature }
}

fn signed_registration(key: &SecretKey, timestamp: u64) -> SignedValidatorRegistration {
    let message = ValidatorRegistration {
        gas_limit: 30_000_000,
        timestamp,
        public_key: key.public_key(),
        ..Default::default()
    };
    let signature = sign_message(&message, key, compute_builder_domain(GENESIS_FORK_VERSION));
    SignedValidatorRegistration { message, signature }
}

#[tokio::test]
async fn test_status_and_root_page() {
    let relay = TestRelay::spawn(0, vec![]).await;

    let status = relay.http.get(relay.url("/eth/v1/builder/status")).send().await.unwrap();
    assert_eq!(status.status(), reqwest::StatusCode::OK);

    let root = relay.http.get(relay.url("/")).send().await.unwrap();
    assert_eq!(root.status(), reqwest::StatusCode::OK);
    let page = root.text().await.unwrap();
    assert!(page.contains("Builder signing domain"));

    relay.handle.abort();
}

#[tokio::test]
async fn test_bid_flow_end_to_end() {
    let relay = TestRelay::spawn(95, vec![]).await;
    let mut rng = rand::thread_rng();
    let proposer = SecretKey::random(&mut rng);
    let parent_hash = Hash32::repeat_byte(0xaa);

    // two competing submissions, the higher value wins
    let bid_a = submission(100, parent_hash, &proposer, Hash32::repeat_byte(0xcc), 10);
    let bid_b = submission(100, parent_hash, &proposer, Hash32::repeat_byte(0xdd), 20);
    assert_eq!(relay.submit_block(&bid_a).await, reqwest::StatusCode::OK);
    assert_eq!(relay.submit_block(&bid_b).await, reqwest::StatusCode::OK);

    // lookups are case-insensitive on the hex path segments
    let parent_upper = format!("0x{}", "AA".repeat(32));
    let pubkey_upper = format!("{}", proposer.public_key()).to_uppercase().replace("0X", "0x");
    let response = relay.get_header(100, &parent_upper, &pubkey_upper).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let header: GetHeaderResponse = response.json().await.unwrap();
    assert_eq!(header.data.message.value, U256::from(20));
    assert_eq!(header.data.message.header.block_hash, Hash32::repeat_byte(0xdd));

    // a dominated submission succeeds silently and changes nothing
    let bid_c = submission(100, parent_hash, &proposer, Hash32::repeat_byte(0xee), 15);
    assert_eq!(relay.submit_block(&bid_c).await, reqwest::StatusCode::OK);
    let response =
        relay.get_header(100, &format!("{parent_hash}"), &format!("{}", proposer.public_key())).await;
    let header: GetHeaderResponse = response.json().await.unwrap();
    assert_eq!(header.data.message.value, U256::from(20));

    // the payload behind the winning header is released...
    let response =
        relay.get_payload(&blinded_block(100, header.data.message.header.clone(), None)).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let payload: GetPayloadResponse = response.json().await.unwrap();
    assert_eq!(payload.data.block_hash, Hash32::repeat_byte(0xdd));

    // ...while the overwritten bid's payload is gone
    let mut stale_header = header.data.message.header.clone();
    stale_header.block_hash = Hash32::repeat_byte(0xcc);
    let response = relay.get_payload(&blinded_block(100, stale_header, None)).await;
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    // zero-value submissions are dropped: empty lane stays empty
    let zero = submission(101, parent_hash, &proposer, Hash32::repeat_byte(0x0f), 0);
    assert_eq!(relay.submit_block(&zero).await, reqwest::StatusCode::OK);
    let response =
        relay.get_header(101, &format!("{parent_hash}"), &format!("{}", proposer.public_key())).await;
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    relay.handle.abort();
}

#[tokio::test]
async fn test_get_header_validates_parameters() {
    let relay = TestRelay::spawn(0, vec![]).await;
    let parent = format!("0x{}", "aa".repeat(32));
    let pubkey = format!("0x{}", "bb".repeat(48));

    let bad_slot =
        relay.http.get(relay.url(&format!("/eth/v1/builder/header/nope/{parent}/{pubkey}")));
    assert_eq!(bad_slot.send().await.unwrap().status(), reqwest::StatusCode::BAD_REQUEST);

    let bad_pubkey = relay.get_header(1, &parent, "0x1234").await;
    assert_eq!(bad_pubkey.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = bad_pubkey.json().await.unwrap();
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], "invalid pubkey");

    let bad_parent = relay.get_header(1, "0xabcd", &pubkey).await;
    assert_eq!(bad_parent.status(), reqwest::StatusCode::BAD_REQUEST);

    relay.handle.abort();
}

#[tokio::test]
async fn test_eviction_after_head_advances() {
    let relay = TestRelay::spawn(95, vec![]).await;
    let mut rng = rand::thread_rng();
    let proposer = SecretKey::random(&mut rng);
    let parent_hash = Hash32::repeat_byte(0xaa);
    let pubkey = format!("{}", proposer.public_key());
    let parent = format!("{parent_hash}");

    let bid = submission(90, parent_hash, &proposer, Hash32::repeat_byte(0xcc), 10);
    assert_eq!(relay.submit_block(&bid).await, reqwest::StatusCode::OK);
    assert_eq!(relay.get_header(90, &parent, &pubkey).await.status(), reqwest::StatusCode::OK);

    relay.beacon.push_head_slot(110).await;

    let mut evicted = false;
    for _ in 0..200 {
        if relay.get_header(90, &parent, &pubkey).await.status()
            == reqwest::StatusCode::NO_CONTENT
        {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(evicted, "bid at slot 90 survived head advancing to 110");

    relay.handle.abort();
}

#[tokio::test]
async fn test_validator_registration_batch() {
    let relay = TestRelay::spawn(0, vec![]).await;
    let mut rng = rand::thread_rng();
    let key = SecretKey::random(&mut rng);
    relay.datastore.add_known_validator(key.public_key());

    let now = get_time();
    // r1: pubkey of the wrong length; r2: timestamp too far ahead; r3: valid
    let r1 = json!({
        "message": {
            "fee_recipient": "0x0000000000000000000000000000000000000000",
            "gas_limit": "30000000",
            "timestamp": now.to_string(),
            "pubkey": format!("0x{}", "bb".repeat(40)),
        },
        "signature": format!("0x{}", "00".repeat(96)),
    });
    let r2 = serde_json::to_value(signed_registration(&key, now + 3600)).unwrap();
    let r3 = serde_json::to_value(signed_registration(&key, now)).unwrap();

    let response = relay
        .http
        .post(relay.url("/eth/v1/builder/validators"))
        .json(&json!([r1, r2, r3]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    // the response carries the last error reason of the batch
    assert_eq!(body["message"], "timestamp too far in the future");

    // only r3 reached the workers and was persisted after verification
    let mut persisted = 0;
    for _ in 0..200 {
        persisted = relay.datastore.set_registration_calls();
        if persisted == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(persisted, 1);

    let stored = relay.datastore.get_validator_registration(&key.public_key()).await.unwrap();
    assert_eq!(stored.unwrap().message.timestamp, now);

    // an identical resubmission is already up to date and stays unqueued
    let response = relay
        .http
        .post(relay.url("/eth/v1/builder/validators"))
        .json(&json!([r3]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.datastore.set_registration_calls(), 1);

    relay.handle.abort();
}

#[tokio::test]
async fn test_duty_list_joins_registrations() {
    let mut rng = rand::thread_rng();
    let registered = SecretKey::random(&mut rng);
    let unregistered = SecretKey::random(&mut rng);

    let beacon = Arc::new(StaticBeaconClient::new(32));
    beacon.set_duties(vec![
        ProposerDuty { public_key: registered.public_key(), validator_index: 1, slot: 33 },
        ProposerDuty { public_key: unregistered.public_key(), validator_index: 2, slot: 34 },
    ]);
    let datastore = Arc::new(CountingDatastore::default());
    datastore
        .set_validator_registration(signed_registration(&registered, get_time()))
        .await
        .unwrap();

    let config = Config { host: Ipv4Addr::LOCALHOST, port: 0, ..Default::default() };
    let handle =
        Service::new(config, beacon.clone(), datastore.clone()).spawn().await.unwrap();
    let http = reqwest::Client::new();
    let url = format!("http://{}/relay/v1/builder/validators", handle.local_addr);

    // startup already kicked off the refresh for the head's epoch
    let mut schedule: Vec<ProposerSchedule> = vec![];
    for _ in 0..200 {
        schedule = http.get(&url).send().await.unwrap().json().await.unwrap();
        if !schedule.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // only the registered proposer makes the published list
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].slot, 33);
    assert_eq!(schedule[0].entry.message.public_key, registered.public_key());

    // further head slots of the same epoch do not trigger more duty fetches
    beacon.push_head_slot(33).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(beacon.duty_requests(), 1);

    handle.abort();
}

#[tokio::test]
async fn test_get_payload_verifies_proposer_signature_when_duty_known() {
    let mut rng = rand::thread_rng();
    let proposer = SecretKey::random(&mut rng);
    let duties =
        vec![ProposerDuty { public_key: proposer.public_key(), validator_index: 1, slot: 100 }];

    let relay = TestRelay::spawn(96, duties).await;
    let parent_hash = Hash32::repeat_byte(0xaa);
    let bid = submission(100, parent_hash, &proposer, Hash32::repeat_byte(0xdd), 20);
    assert_eq!(relay.submit_block(&bid).await, reqwest::StatusCode::OK);

    // make sure the duty refresh for slot 100's epoch has landed
    relay.handle.relay.update_proposer_duties(100 / relay_rs::SLOTS_PER_EPOCH).await.unwrap();

    let response = relay
        .get_header(100, &format!("{parent_hash}"), &format!("{}", proposer.public_key()))
        .await;
    let header: GetHeaderResponse = response.json().await.unwrap();

    // a block signed by someone else is refused
    let forged_key = SecretKey::random(&mut rng);
    let forged = blinded_block(100, header.data.message.header.clone(), Some(&forged_key));
    let response = relay.get_payload(&forged).await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    // the proposer's own signature opens the bid
    let genuine = blinded_block(100, header.data.message.header.clone(), Some(&proposer));
    let response = relay.get_payload(&genuine).await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    relay.handle.abort();
}
