use crate::types::primitives::{BlsPublicKey, BlsSignature, ExecutionAddress};
use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

#[derive(Debug, Default, Clone, PartialEq, TreeHash, Serialize, Deserialize)]
pub struct ValidatorRegistration {
    pub fee_recipient: ExecutionAddress,
    #[serde(with = "crate::serde::as_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde::as_str")]
    pub timestamp: u64,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedValidatorRegistration {
    pub message: ValidatorRegistration,
    pub signature: BlsSignature,
}

// Lenient wire forms for the registration endpoint: the key and signature are
// decoded as raw hex so that a malformed entry flags its own error reason
// while the rest of the batch keeps flowing through the front stage.

#[derive(Debug, Clone, Deserialize)]
pub struct RawValidatorRegistration {
    pub fee_recipient: ExecutionAddress,
    #[serde(with = "crate::serde::as_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde::as_str")]
    pub timestamp: u64,
    #[serde(rename = "pubkey")]
    pub public_key: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSignedValidatorRegistration {
    #[serde(default)]
    pub message: Option<RawValidatorRegistration>,
    pub signature: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn registration_matches_builder_specs_wire_format() {
        let json = r#"{
            "message": {
                "fee_recipient": "0xabcf8e0d4e9587369b2301d0790347320302cc09",
                "gas_limit": "30000000",
                "timestamp": "1652369368",
                "pubkey": "0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a"
            },
            "signature": "0x1b66ac1fb663c9bc59509846d6ec05345bd908eda73e670af888da41af171505cc411d61252fb6cb3fa0017b679f8bb2305b26a285fa2737f175668d0dff91cc1b66ac1fb663c9bc59509846d6ec05345bd908eda73e670af888da41af171505"
        }"#;

        let signed: SignedValidatorRegistration = serde_json::from_str(json).unwrap();
        assert_eq!(signed.message.gas_limit, 30_000_000);
        assert_eq!(signed.message.timestamp, 1_652_369_368);
        assert_eq!(
            signed.message.fee_recipient,
            ExecutionAddress::from_str("0xabcf8e0d4e9587369b2301d0790347320302cc09").unwrap()
        );

        let encoded = serde_json::to_value(&signed).unwrap();
        assert_eq!(encoded["message"]["gas_limit"], "30000000");
        assert!(encoded["message"]["pubkey"].as_str().unwrap().starts_with("0x845bd072"));
    }

    #[test]
    fn raw_registration_accepts_bad_lengths_and_missing_message() {
        let json = r#"[
            {"message": {"fee_recipient": "0xabcf8e0d4e9587369b2301d0790347320302cc09",
                         "gas_limit": "1", "timestamp": "1", "pubkey": "0x0102"},
             "signature": "0x0304"},
            {"signature": "0x0506"}
        ]"#;
        let entries: Vec<RawSignedValidatorRegistration> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].message.as_ref().unwrap().public_key.len(), 2);
        assert!(entries[1].message.is_none());
    }
}
