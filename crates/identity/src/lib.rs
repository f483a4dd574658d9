//! Rollup account identities.
//!
//! A [`UserData`] record ties a private key to the account it controls and to the highest rollup
//! the account has been synchronized to. Records are created by a [`UserDataFactory`], which
//! derives the public key with a pluggable [`ScalarMultiplier`].

pub mod account;
pub mod curve;
pub mod errors;
pub mod factory;
pub mod keys;
pub mod user;

pub use account::{AccountId, AliasHash};
pub use curve::{Ristretto, ScalarMultiplier};
pub use errors::IdentityError;
pub use factory::UserDataFactory;
pub use keys::{PrivateKey, PublicKey};
pub use user::UserData;

// CONSTANTS
// =================================================================================================

/// The name of the identity component, used as the tracing target.
pub const COMPONENT: &str = "rollup-sync-identity";
