use crate::types::{primitives::Slot, registration::SignedValidatorRegistration};
use serde::{Deserialize, Serialize};

/// One entry of the duty list served to builders: a proposal slot joined with
/// the proposer's stored registration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposerSchedule {
    #[serde(with = "crate::serde::as_str")]
    pub slot: Slot,
    pub entry: SignedValidatorRegistration,
}
