use std::fmt::{Display, Formatter};

use rollup_sync_block_source::RollupId;
use rollup_sync_utils::formatting::format_opt;

use crate::{
    account::{AccountId, AliasHash},
    errors::IdentityError,
    keys::{PrivateKey, PublicKey},
};

/// An account controlled by the local client, and how far it has been synchronized.
///
/// Records are created by a [`UserDataFactory`](crate::UserDataFactory), which guarantees the
/// public key and account id match the private key.
#[derive(Debug)]
pub struct UserData {
    id: AccountId,
    private_key: PrivateKey,
    alias_hash: Option<AliasHash>,
    synced_to_rollup: Option<RollupId>,
}

impl UserData {
    pub(crate) fn new(
        id: AccountId,
        private_key: PrivateKey,
        alias_hash: Option<AliasHash>,
        synced_to_rollup: Option<RollupId>,
    ) -> Self {
        Self { id, private_key, alias_hash, synced_to_rollup }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> PublicKey {
        self.id.public_key
    }

    pub fn nonce(&self) -> u32 {
        self.id.nonce
    }

    pub fn alias_hash(&self) -> Option<AliasHash> {
        self.alias_hash
    }

    /// Returns the highest rollup this account has been synchronized to, or `None` if it never
    /// was.
    pub fn synced_to_rollup(&self) -> Option<RollupId> {
        self.synced_to_rollup
    }

    /// Returns the rollup the next synchronization pass has to start from.
    ///
    /// Returns `None` once the account is synchronized to [`RollupId::MAX`], as no later rollup
    /// can exist.
    pub fn resume_from(&self) -> Option<RollupId> {
        match self.synced_to_rollup {
            Some(synced) => synced.child(),
            None => Some(RollupId::GENESIS),
        }
    }

    /// Advances the sync horizon to `rollup_id`.
    ///
    /// Setting the current horizon again is allowed, moving it backwards is not.
    pub fn with_synced_to_rollup(mut self, rollup_id: RollupId) -> Result<Self, IdentityError> {
        self.sync_to_rollup(rollup_id)?;
        Ok(self)
    }

    /// Advances the sync horizon in place. The record is left unchanged on failure.
    pub fn sync_to_rollup(&mut self, rollup_id: RollupId) -> Result<(), IdentityError> {
        if let Some(current) = self.synced_to_rollup.filter(|current| *current > rollup_id) {
            return Err(IdentityError::SyncHorizonRegression { current, requested: rollup_id });
        }

        self.synced_to_rollup = Some(rollup_id);
        Ok(())
    }

    #[must_use]
    pub fn with_alias_hash(mut self, alias_hash: AliasHash) -> Self {
        self.alias_hash = Some(alias_hash);
        self
    }
}

impl Display for UserData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ id: {}, alias_hash: {}, synced_to_rollup: {} }}",
            self.id,
            format_opt(self.alias_hash.as_ref()),
            format_opt(self.synced_to_rollup.as_ref()),
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rollup_sync_block_source::RollupId;

    use super::UserData;
    use crate::{
        account::{AccountId, AliasHash},
        errors::IdentityError,
        keys::{PrivateKey, PublicKey},
    };

    fn user(synced_to_rollup: Option<RollupId>) -> UserData {
        UserData::new(
            AccountId::new(PublicKey::new([3; 32]), 0),
            PrivateKey::new([1; 32]),
            None,
            synced_to_rollup,
        )
    }

    #[test]
    fn new_accounts_resume_from_genesis() {
        let user = user(None);
        assert_eq!(user.resume_from(), Some(RollupId::GENESIS));

        let user = user.with_synced_to_rollup(RollupId::new(4)).unwrap();
        assert_eq!(user.resume_from(), Some(RollupId::new(5)));
    }

    #[test]
    fn accounts_synced_to_the_last_rollup_have_nothing_to_resume() {
        let user = user(None).with_synced_to_rollup(RollupId::MAX).unwrap();

        assert_eq!(user.resume_from(), None);
        assert_eq!(user.synced_to_rollup(), Some(RollupId::MAX));
    }

    #[test]
    fn sync_horizon_never_moves_back() {
        let user = user(Some(RollupId::new(7)))
            .with_synced_to_rollup(RollupId::new(7))
            .unwrap();

        assert_matches!(
            user.with_synced_to_rollup(RollupId::new(6)),
            Err(IdentityError::SyncHorizonRegression { current, requested })
                if current == RollupId::new(7) && requested == RollupId::new(6)
        );
    }

    #[test]
    fn failed_in_place_advances_keep_the_record() {
        let mut user = user(Some(RollupId::new(7)));

        assert_matches!(
            user.sync_to_rollup(RollupId::new(3)),
            Err(IdentityError::SyncHorizonRegression { .. })
        );
        assert_eq!(user.synced_to_rollup(), Some(RollupId::new(7)));

        user.sync_to_rollup(RollupId::new(8)).unwrap();
        assert_eq!(user.resume_from(), Some(RollupId::new(9)));
    }

    #[test]
    fn alias_can_be_bound_later() {
        let alias = AliasHash::from_alias("carol");
        let user = user(None).with_alias_hash(alias);

        assert_eq!(user.alias_hash(), Some(alias));
        assert!(user.to_string().contains(&alias.to_string()));
    }
}
