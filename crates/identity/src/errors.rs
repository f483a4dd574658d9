use rollup_sync_block_source::RollupId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The private key is zero or not a canonical scalar of the curve.
    #[error("private key is not a valid non-zero scalar")]
    InvalidSecret,

    #[error("cannot move sync horizon back from rollup {current} to rollup {requested}")]
    SyncHorizonRegression { current: RollupId, requested: RollupId },

    #[error("expected {expected} hex encoded bytes")]
    InvalidHex {
        expected: usize,
        #[source]
        source: hex::FromHexError,
    },
}
