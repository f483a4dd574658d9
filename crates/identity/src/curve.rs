use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT, ristretto::RistrettoPoint, scalar::Scalar,
};

use crate::{
    errors::IdentityError,
    keys::{PrivateKey, PublicKey},
};

/// Curve arithmetic needed to derive public keys.
pub trait ScalarMultiplier: Send + Sync {
    type Point;

    /// Returns the generator public keys are derived from.
    fn generator(&self) -> Self::Point;

    /// Returns whether `secret` encodes a canonical, non-zero scalar.
    fn is_valid_secret(&self, secret: &[u8; 32]) -> bool;

    /// Multiplies `base` by the scalar encoded in `secret`.
    fn scalar_multiply(
        &self,
        base: &Self::Point,
        secret: &PrivateKey,
    ) -> Result<Self::Point, IdentityError>;

    /// Encodes `point` in its compressed form.
    fn encode(&self, point: &Self::Point) -> PublicKey;
}

// RISTRETTO
// =================================================================================================

/// The Ristretto group over Curve25519.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ristretto;

impl Ristretto {
    fn scalar(secret: &[u8; 32]) -> Option<Scalar> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(*secret))
            .filter(|scalar| *scalar != Scalar::ZERO)
    }
}

impl ScalarMultiplier for Ristretto {
    type Point = RistrettoPoint;

    fn generator(&self) -> RistrettoPoint {
        RISTRETTO_BASEPOINT_POINT
    }

    fn is_valid_secret(&self, secret: &[u8; 32]) -> bool {
        Self::scalar(secret).is_some()
    }

    fn scalar_multiply(
        &self,
        base: &RistrettoPoint,
        secret: &PrivateKey,
    ) -> Result<RistrettoPoint, IdentityError> {
        let scalar = Self::scalar(secret.as_bytes()).ok_or(IdentityError::InvalidSecret)?;
        Ok(base * scalar)
    }

    fn encode(&self, point: &RistrettoPoint) -> PublicKey {
        PublicKey::new(point.compress().to_bytes())
    }
}
