use rollup_sync_block_source::RollupId;
use tracing::{debug, instrument};

use crate::{
    account::{AccountId, AliasHash},
    curve::{Ristretto, ScalarMultiplier},
    errors::IdentityError,
    keys::{PrivateKey, PublicKey},
    user::UserData,
    COMPONENT,
};

/// Creates [`UserData`] records from private keys.
///
/// The factory holds no state besides the curve, so a single instance can be shared freely.
#[derive(Debug, Default, Clone)]
pub struct UserDataFactory<C = Ristretto> {
    curve: C,
}

impl UserDataFactory<Ristretto> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: ScalarMultiplier> UserDataFactory<C> {
    pub fn with_curve(curve: C) -> Self {
        Self { curve }
    }

    /// Derives the public key as the curve generator multiplied by `private_key`.
    pub fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, IdentityError> {
        let point = self.curve.scalar_multiply(&self.curve.generator(), private_key)?;
        Ok(self.curve.encode(&point))
    }

    /// Creates the record of the account controlled by `private_key` under `nonce`.
    #[instrument(
        target = COMPONENT,
        name = "identity:create_user",
        skip_all,
        fields(nonce = nonce),
        err
    )]
    pub fn create_user(
        &self,
        private_key: PrivateKey,
        nonce: u32,
        alias_hash: Option<AliasHash>,
        synced_to_rollup: Option<RollupId>,
    ) -> Result<UserData, IdentityError> {
        let public_key = self.derive_public_key(&private_key)?;
        let id = AccountId::new(public_key, nonce);

        debug!(target: COMPONENT, %id, "user created");

        Ok(UserData::new(id, private_key, alias_hash, synced_to_rollup))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use rollup_sync_block_source::RollupId;

    use super::UserDataFactory;
    use crate::{account::AliasHash, errors::IdentityError, keys::PrivateKey};

    const SECRET: &str = "0x0b8b0ef07d4d8a5f3b1de5b3ab65e3a55d9c0e3cbbd43e6b2f3b1f7c2a1e4d05";

    #[test]
    #[rollup_sync_test_macro::enable_logging]
    fn derivation_is_deterministic() {
        let factory = UserDataFactory::new();

        let first = factory.derive_public_key(&SECRET.parse().unwrap()).unwrap();
        let second = factory.derive_public_key(&SECRET.parse().unwrap()).unwrap();
        assert_eq!(first, second);

        let other = factory.derive_public_key(&PrivateKey::random(&mut StdRng::seed_from_u64(1)));
        assert_ne!(other.unwrap(), first);
    }

    #[test]
    #[rollup_sync_test_macro::enable_logging]
    fn nonces_share_the_key_but_not_the_account() {
        let factory = UserDataFactory::new();

        let first = factory.create_user(SECRET.parse().unwrap(), 0, None, None).unwrap();
        let second = factory.create_user(SECRET.parse().unwrap(), 1, None, None).unwrap();

        assert_eq!(first.public_key(), second.public_key());
        assert_ne!(first.id(), second.id());
        assert_eq!(second.nonce(), 1);
    }

    #[test]
    #[rollup_sync_test_macro::enable_logging]
    fn records_keep_their_alias_and_horizon() {
        let alias = AliasHash::from_alias("dave");
        let user = UserDataFactory::new()
            .create_user(SECRET.parse().unwrap(), 0, Some(alias), Some(RollupId::new(12)))
            .unwrap();

        assert_eq!(user.alias_hash(), Some(alias));
        assert_eq!(user.synced_to_rollup(), Some(RollupId::new(12)));
        assert_eq!(user.resume_from(), Some(RollupId::new(13)));
    }

    #[test]
    #[rollup_sync_test_macro::enable_logging]
    fn invalid_secrets_create_no_record() {
        assert_matches!(
            UserDataFactory::new().create_user(PrivateKey::new([0; 32]), 0, None, None),
            Err(IdentityError::InvalidSecret)
        );
    }
}
