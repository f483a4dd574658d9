use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    errors::IdentityError,
    keys::{decode_hex, PublicKey},
};

// ACCOUNT ID
// =================================================================================================

/// An account is a public key together with an account nonce.
///
/// The same key controls a distinct account for every nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId {
    pub public_key: PublicKey,
    pub nonce: u32,
}

impl AccountId {
    pub const SERIALIZED_LEN: usize = 36;

    pub const fn new(public_key: PublicKey, nonce: u32) -> Self {
        Self { public_key, nonce }
    }

    /// Returns the public key bytes followed by the big-endian nonce.
    pub fn to_bytes(&self) -> [u8; Self::SERIALIZED_LEN] {
        let mut bytes = [0u8; Self::SERIALIZED_LEN];
        bytes[..32].copy_from_slice(self.public_key.as_bytes());
        bytes[32..].copy_from_slice(&self.nonce.to_be_bytes());
        bytes
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.public_key, self.nonce)
    }
}

// ALIAS HASH
// =================================================================================================

/// Truncated hash of a human readable account alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AliasHash([u8; 28]);

impl AliasHash {
    pub const fn new(bytes: [u8; 28]) -> Self {
        Self(bytes)
    }

    /// Hashes `alias` after trimming it and converting it to lowercase, so aliases which only
    /// differ in case or surrounding whitespace share a hash.
    pub fn from_alias(alias: &str) -> Self {
        let digest = Sha256::digest(alias.trim().to_lowercase().as_bytes());

        let mut bytes = [0u8; 28];
        bytes.copy_from_slice(&digest[..28]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 28] {
        &self.0
    }
}

impl Display for AliasHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AliasHash {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex(s).map(Self)
    }
}
