//! Configuration for saltlined

use anyhow::Context;
use clap::Parser;
use saltline_core::KeyPair;
use std::net::SocketAddr;

/// saltlined - encrypted channel daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "saltlined")]
#[command(about = "saltline encrypted channel echo daemon")]
pub struct Config {
    /// Listen address (responder mode)
    #[arg(short, long, default_value = "0.0.0.0:9400")]
    pub listen: SocketAddr,

    /// Peer address to dial (switches to initiator mode)
    #[arg(long)]
    pub dial: Option<SocketAddr>,

    /// Expected public key of the dialed peer (64 hex chars)
    #[arg(long)]
    pub remote_key: Option<String>,

    /// Local key seed (64 hex chars); a fresh key is generated when omitted
    #[arg(long, env = "SALTLINE_KEY_SEED")]
    pub key_seed: Option<String>,

    /// Message to send after connecting (initiator mode)
    #[arg(short, long, default_value = "ping")]
    pub message: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dial.is_some() && self.remote_key.is_none() {
            anyhow::bail!("--remote-key is required when dialing");
        }
        Ok(())
    }

    /// Local keypair from the configured seed, or a fresh one
    pub fn keypair(&self) -> anyhow::Result<KeyPair> {
        match &self.key_seed {
            Some(seed_hex) => {
                let seed = parse_key(seed_hex).context("invalid --key-seed")?;
                Ok(KeyPair::from_seed(&seed))
            }
            None => Ok(KeyPair::generate()),
        }
    }

    /// The expected remote public key, when dialing
    pub fn remote_public(&self) -> anyhow::Result<Option<[u8; 32]>> {
        self.remote_key
            .as_deref()
            .map(|k| parse_key(k).context("invalid --remote-key"))
            .transpose()
    }
}

fn parse_key(hex_str: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(hex_str)?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| anyhow::anyhow!("expected 32 bytes, got {}", v.len()))
}
