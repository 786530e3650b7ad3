//! BLS signing over SSZ signing roots, specialized to the two domains this
//! relay uses: the application builder domain (registrations, builder bids)
//! and the beacon proposer domain (blinded blocks).

use crate::types::{BlsPublicKey, BlsSignature, Domain, ForkVersion, Root};
use blst::{min_pk, BLST_ERROR};
use rand::RngCore;
use std::fmt;
use thiserror::Error;
use tree_hash::TreeHash;

const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

const DOMAIN_BEACON_PROPOSER: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
const DOMAIN_APPLICATION_BUILDER: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid secret key")]
    InvalidSecretKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("signature does not verify for the given message and public key")]
    VerificationFailed,
    #[error("invalid fork version, expected 4 hex-encoded bytes")]
    InvalidForkVersion,
}

#[derive(Clone)]
pub struct SecretKey(min_pk::SecretKey);

impl SecretKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        min_pk::SecretKey::from_bytes(bytes).map(Self).map_err(|_| Error::InvalidSecretKey)
    }

    pub fn from_hex(input: &str) -> Result<Self, Error> {
        let bytes =
            alloy_primitives::hex::decode(input).map_err(|_| Error::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }

    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut ikm = [0u8; 32];
        rng.fill_bytes(&mut ikm);
        let inner = min_pk::SecretKey::key_gen(&ikm, &[]).expect("ikm has sufficient length");
        Self(inner)
    }

    pub fn public_key(&self) -> BlsPublicKey {
        BlsPublicKey(self.0.sk_to_pk().compress().into())
    }

    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.0.sign(message, BLS_DST, &[]).compress().into())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

pub fn verify_signature(
    public_key: &BlsPublicKey,
    message: &[u8],
    signature: &BlsSignature,
) -> Result<(), Error> {
    let public_key = min_pk::PublicKey::key_validate(public_key.as_slice())
        .map_err(|_| Error::InvalidPublicKey)?;
    let signature =
        min_pk::Signature::from_bytes(signature.as_slice()).map_err(|_| Error::InvalidSignature)?;
    match signature.verify(true, message, BLS_DST, &[], &public_key, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        _ => Err(Error::VerificationFailed),
    }
}

pub fn fork_version_from_hex(input: &str) -> Result<ForkVersion, Error> {
    let bytes = alloy_primitives::hex::decode(input).map_err(|_| Error::InvalidForkVersion)?;
    bytes.try_into().map_err(|_| Error::InvalidForkVersion)
}

fn compute_fork_data_root(current_version: ForkVersion, genesis_validators_root: Root) -> Root {
    // ForkData is two leaves: the padded fork version and the validators root.
    let mut leaves = [0u8; 64];
    leaves[..4].copy_from_slice(&current_version);
    leaves[32..].copy_from_slice(genesis_validators_root.as_slice());
    tree_hash::merkle_root(&leaves, 0)
}

pub fn compute_domain(
    domain_type: [u8; 4],
    fork_version: ForkVersion,
    genesis_validators_root: Root,
) -> Domain {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);
    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type);
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    domain
}

pub fn compute_builder_domain(genesis_fork_version: ForkVersion) -> Domain {
    compute_domain(DOMAIN_APPLICATION_BUILDER, genesis_fork_version, Root::ZERO)
}

pub fn compute_proposer_domain(genesis_fork_version: ForkVersion) -> Domain {
    compute_domain(DOMAIN_BEACON_PROPOSER, genesis_fork_version, Root::ZERO)
}

pub fn compute_signing_root<T: TreeHash>(message: &T, domain: Domain) -> Root {
    // SigningData is two leaves as well: the message root and the domain.
    let mut leaves = [0u8; 64];
    leaves[..32].copy_from_slice(message.tree_hash_root().as_slice());
    leaves[32..].copy_from_slice(&domain);
    tree_hash::merkle_root(&leaves, 0)
}

pub fn sign_message<T: TreeHash>(
    message: &T,
    secret_key: &SecretKey,
    domain: Domain,
) -> BlsSignature {
    let signing_root = compute_signing_root(message, domain);
    secret_key.sign(signing_root.as_slice())
}

pub fn verify_signed_message<T: TreeHash>(
    message: &T,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
    domain: Domain,
) -> Result<(), Error> {
    let signing_root = compute_signing_root(message, domain);
    verify_signature(public_key, signing_root.as_slice(), signature)
}
