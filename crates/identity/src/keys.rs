use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    curve::{Ristretto, ScalarMultiplier},
    errors::IdentityError,
};

pub(crate) fn decode_hex<const N: usize>(hex_str: &str) -> Result<[u8; N], IdentityError> {
    let mut bytes = [0u8; N];
    hex::decode_to_slice(hex_str.trim_start_matches("0x"), &mut bytes)
        .map_err(|source| IdentityError::InvalidHex { expected: N, source })?;
    Ok(bytes)
}

// PRIVATE KEY
// =================================================================================================

/// The secret scalar controlling an account, little-endian encoded.
///
/// Deliberately not `Clone` and never printed.
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Wraps raw key material. Its validity is checked when the public key is derived.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Samples a key which is a valid scalar of [`Ristretto`], the curve used by
    /// [`UserDataFactory::new`](crate::UserDataFactory::new).
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::random_for(&Ristretto, rng)
    }

    /// Samples a key which `curve` accepts as a secret.
    pub fn random_for<C, R>(curve: &C, rng: &mut R) -> Self
    where
        C: ScalarMultiplier + ?Sized,
        R: RngCore + CryptoRng,
    {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);

            if curve.is_valid_secret(&bytes) {
                return Self(bytes);
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for PrivateKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex(s).map(Self)
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// PUBLIC KEY
// =================================================================================================

/// A compressed curve point identifying an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex(s).map(Self)
    }
}
