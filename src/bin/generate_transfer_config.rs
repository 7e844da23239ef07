//! Generate fresh keys and print a batch config that uses them.
//!
//! The source accounts must be funded (e.g. `solana airdrop` on devnet)
//! before the batch can succeed.
//!
//! Usage:
//!   cargo run --bin generate_transfer_config -- --count 5 > batch.yaml

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

#[derive(Debug, Parser)]
#[command(about = "Print a sample batch config with freshly generated keys")]
struct Args {
    /// Number of transfers
    #[arg(long, default_value_t = 3)]
    count: usize,

    /// Lamports per transfer
    #[arg(long, default_value_t = 1_000)]
    amount: u64,

    #[arg(long, default_value = "https://api.devnet.solana.com")]
    rpc_url: String,
}

fn address(key: &SigningKey) -> String {
    bs58::encode(key.verifying_key().as_bytes()).into_string()
}

fn main() {
    let args = Args::parse();

    println!("# Fund each source before running:");
    let mut entries = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let source = SigningKey::generate(&mut OsRng);
        let destination = SigningKey::generate(&mut OsRng);
        println!("#   solana airdrop 1 {} --url {}", address(&source), args.rpc_url);
        entries.push((
            BASE64_STANDARD.encode(source.to_keypair_bytes()),
            address(&destination),
        ));
    }

    println!("rpc_url: {}", args.rpc_url);
    println!("transfers:");
    for (key, destination) in entries {
        println!("  - from_private_key: {}", key);
        println!("    to_address: {}", destination);
        println!("    amount: {}", args.amount);
    }
}
