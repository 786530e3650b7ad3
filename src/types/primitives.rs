use alloy_primitives::FixedBytes;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};

pub type Slot = u64;
pub type Epoch = u64;
pub type ValidatorIndex = u64;

pub type Hash32 = alloy_primitives::B256;
pub type Bytes32 = alloy_primitives::B256;
pub type Root = alloy_primitives::B256;
pub type ExecutionAddress = alloy_primitives::Address;

pub type ForkVersion = [u8; 4];
pub type Domain = [u8; 32];

/// Consensus fork the relay speaks. Only one is supported at the moment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fork {
    #[default]
    Bellatrix,
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bellatrix => f.write_str("bellatrix"),
        }
    }
}

// 48- and 96-byte BLS types on the wire. The containers that carry them hash
// as SSZ `Vector[uint8, N]`, which `merkle_root` computes directly from the
// raw bytes.
macro_rules! bls_fixed_bytes {
    ($name:ident, $len:literal) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub FixedBytes<$len>);

        impl $name {
            pub fn as_slice(&self) -> &[u8] {
                self.0.as_slice()
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = core::array::TryFromSliceError;

            fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
                FixedBytes::try_from(bytes).map(Self)
            }
        }

        impl FromStr for $name {
            type Err = alloy_primitives::hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                FixedBytes::from_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl TreeHash for $name {
            fn tree_hash_type() -> TreeHashType {
                TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> PackedEncoding {
                unreachable!("bls byte vectors are not packed")
            }

            fn tree_hash_packing_factor() -> usize {
                unreachable!("bls byte vectors are not packed")
            }

            fn tree_hash_root(&self) -> Hash256 {
                tree_hash::merkle_root(self.0.as_slice(), 0)
            }
        }
    };
}

bls_fixed_bytes!(BlsPublicKey, 48);
bls_fixed_bytes!(BlsSignature, 96);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_hex_is_case_insensitive() {
        let lower = "0x845bd072b7cd566f02faeb0a4033ce9399e42839ced64e8b2adcfc859ed1e8e1a5a293336a49feac6d9a5edb779be53a";
        let upper = format!("0x{}", lower[2..].to_uppercase());
        let a: BlsPublicKey = lower.parse().unwrap();
        let b: BlsPublicKey = upper.parse().unwrap();
        assert_eq!(a, b);
        // canonical form is lowercase
        assert_eq!(a.to_string(), lower);
    }

    #[test]
    fn bls_types_reject_wrong_lengths() {
        assert!("0x1234".parse::<BlsPublicKey>().is_err());
        assert!(BlsSignature::try_from([0u8; 95].as_slice()).is_err());
    }
}
