use anyhow::Context;
use rollup_sync_identity::{AliasHash, UserDataFactory};

use super::private_key_or_random;

/// Prints the account controlled by `private_key`.
pub fn derive_key(
    private_key: Option<&str>,
    nonce: u32,
    alias: Option<&str>,
) -> anyhow::Result<()> {
    let (private_key, generated) = private_key_or_random(private_key)?;
    if generated {
        println!("private key: 0x{}", hex::encode(private_key.as_bytes()));
    }

    let user = UserDataFactory::new()
        .create_user(private_key, nonce, alias.map(AliasHash::from_alias), None)
        .context("failed to derive account")?;

    println!("public key:  {}", user.public_key());
    println!("account id:  {}", user.id());
    if let Some(alias_hash) = user.alias_hash() {
        println!("alias hash:  {alias_hash}");
    }

    Ok(())
}
