//! saltlined - encrypted channel echo daemon
//!
//! Responder mode binds a port, accepts channels, logs each decrypted
//! message, and echoes it back. Initiator mode dials a peer whose public
//! key is known out of band, sends one message, and prints the reply.

mod config;

use clap::Parser;
use config::Config;
use saltline_net::channel::{ChannelEvent, SecureChannel};
use saltline_net::{connect, Listener};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("saltlined=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("saltlined v{}", env!("CARGO_PKG_VERSION"));

    let result = match config.dial {
        Some(addr) => run_initiator(&config, addr).await,
        None => run_responder(&config).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run_responder(config: &Config) -> anyhow::Result<()> {
    let keypair = config.keypair()?;
    info!("local public key: {}", hex::encode(keypair.public_key()));

    let mut listener = Listener::bind(config.listen, keypair).await?;

    tokio::select! {
        _ = async {
            while let Some(channel) = listener.accept().await {
                info!(
                    "channel established with {}",
                    hex::encode(&channel.remote_public()[..8])
                );
                tokio::spawn(serve_channel(channel));
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            listener.stop();
        }
    }

    Ok(())
}

/// Echo every decrypted message back to its sender.
async fn serve_channel(mut channel: SecureChannel) {
    let peer = hex::encode(&channel.remote_public()[..8]);
    while let Some(event) = channel.recv().await {
        match event {
            ChannelEvent::Message(message) => {
                info!("{} -> {} bytes", peer, message.len());
                if let Err(e) = channel.send(&message).await {
                    warn!("echo to {} failed: {}", peer, e);
                    break;
                }
            }
            ChannelEvent::Closed => {
                info!("channel with {} closed", peer);
                break;
            }
        }
    }
}

async fn run_initiator(config: &Config, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let keypair = config.keypair()?;
    let remote_public = config
        .remote_public()?
        .ok_or_else(|| anyhow::anyhow!("--remote-key is required when dialing"))?;

    info!("local public key: {}", hex::encode(keypair.public_key()));

    let mut channel = connect(addr, keypair, remote_public).await?;
    channel.send(config.message.as_bytes()).await?;
    info!("sent {} bytes to {}", config.message.len(), addr);

    match channel.recv().await {
        Some(ChannelEvent::Message(reply)) => {
            println!("{}", String::from_utf8_lossy(&reply));
        }
        Some(ChannelEvent::Closed) | None => {
            warn!("connection closed before a reply arrived");
        }
    }

    channel.destroy();
    Ok(())
}
