//! Dialing side of the protocol
//!
//! Opens a TCP connection, announces the local public key as the first
//! frame, and returns a channel bound to the remote key the caller
//! already expects. The handshake performs no discovery: the caller
//! must know, out of band, who it intends to talk to.

use crate::channel::SecureChannel;
use crate::framing::FrameCodec;
use crate::handshake::{self, HandshakeError};
use saltline_core::KeyPair;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

/// Dial errors
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
}

/// Connect to a listener and return a ready channel.
pub async fn connect(
    addr: SocketAddr,
    keypair: KeyPair,
    remote_public: [u8; 32],
) -> Result<SecureChannel, ConnectError> {
    let stream = TcpStream::connect(addr).await?;
    debug!("connected to {}", addr);

    let mut framed = Framed::new(stream, FrameCodec);
    handshake::initiate(&mut framed, &keypair.public_key()).await?;

    Ok(SecureChannel::new(framed, remote_public, keypair))
}
