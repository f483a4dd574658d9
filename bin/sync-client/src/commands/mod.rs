use anyhow::Context;
use rand::{thread_rng, Rng};
use rollup_sync_block_source::{PendingBlock, TxHash};
use rollup_sync_identity::PrivateKey;

mod derive_key;
mod follow;

pub use derive_key::derive_key;
pub use follow::follow;

/// Parses the given hex encoded private key, or generates a random one.
fn private_key_or_random(private_key: Option<&str>) -> anyhow::Result<(PrivateKey, bool)> {
    match private_key {
        Some(hex) => {
            let key = hex.parse().context("failed to parse private key")?;
            Ok((key, false))
        },
        None => Ok((PrivateKey::random(&mut thread_rng()), true)),
    }
}

/// Returns a block with random contents for the local producer.
fn simulated_block() -> PendingBlock {
    let mut rng = thread_rng();

    PendingBlock {
        tx_hash: TxHash::new(rng.gen()),
        rollup_size: rng.gen_range(1..=32),
        rollup_proof_data: (0..64).map(|_| rng.gen()).collect(),
        viewing_keys_data: (0..32).map(|_| rng.gen()).collect(),
        interaction_result: Vec::new(),
        gas_used: rng.gen_range(21_000..1_000_000),
        gas_price: rng.gen_range(1..100),
    }
}
