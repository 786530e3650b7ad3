use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec, Opts};

const NAMESPACE: &str = "relay";
const SUBSYSTEM: &str = "api";

const API_METHOD_LABEL: &str = "method";
const OUTCOME_LABEL: &str = "outcome";

lazy_static! {
    pub static ref API_REQUESTS_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("requests_total", "total number of relay API requests")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[API_METHOD_LABEL]
    )
    .unwrap();
    pub static ref BID_SUBMISSIONS_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("bid_submissions_total", "builder block submissions by outcome")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[OUTCOME_LABEL]
    )
    .unwrap();
    pub static ref REGISTRATIONS_COUNTER: IntCounterVec = register_int_counter_vec!(
        Opts::new("validator_registrations_total", "validator registrations by outcome")
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
        &[OUTCOME_LABEL]
    )
    .unwrap();
    pub static ref EVICTED_BIDS_COUNTER: IntCounter = register_int_counter!(Opts::new(
        "evicted_bids_total",
        "bids and payloads evicted after their slot passed"
    )
    .namespace(NAMESPACE)
    .subsystem(SUBSYSTEM))
    .unwrap();
}

#[derive(Copy, Clone, Debug)]
pub enum ApiMethod {
    Status,
    RegisterValidator,
    GetHeader,
    GetPayload,
    GetValidators,
    SubmitBlock,
}

impl ApiMethod {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::RegisterValidator => "register_validator",
            Self::GetHeader => "get_header",
            Self::GetPayload => "get_payload",
            Self::GetValidators => "get_validators",
            Self::SubmitBlock => "submit_block",
        }
    }
}

pub fn inc_api_request(method: ApiMethod) {
    API_REQUESTS_COUNTER.with_label_values(&[method.as_str()]).inc();
}

pub fn inc_bid_submission(outcome: &str) {
    BID_SUBMISSIONS_COUNTER.with_label_values(&[outcome]).inc();
}

pub fn inc_registration(outcome: &str) {
    REGISTRATIONS_COUNTER.with_label_values(&[outcome]).inc();
}
