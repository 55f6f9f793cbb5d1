//! Connection bootstrap
//!
//! The very first frame on every connection carries the raw 32-byte
//! public key of the connecting party, unencrypted and unwrapped. The
//! claimed key is self-asserted: there is no proof of possession of the
//! matching secret key and no challenge step. Traffic after the
//! handshake is confidential and integrity-protected, but the responder
//! learns nothing about who the initiator really is.

use crate::framing::{FrameCodec, FrameError};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use saltline_core::keys::PUBLIC_KEY_LEN;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// Handshake errors
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake frame has wrong length: {0} (expected {PUBLIC_KEY_LEN})")]
    BadKeyLength(usize),
    #[error("connection closed before handshake completed")]
    ConnectionClosed,
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Announce our public key as the first frame (initiator role).
pub async fn initiate<S>(
    framed: &mut Framed<S, FrameCodec>,
    public_key: &[u8; PUBLIC_KEY_LEN],
) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(Bytes::copy_from_slice(public_key)).await?;
    Ok(())
}

/// Wait for the first frame and take it as the claimed remote public
/// key (responder role). Any length other than 32 bytes is a protocol
/// violation that ends the connection.
pub async fn respond<S>(
    framed: &mut Framed<S, FrameCodec>,
) -> Result<[u8; PUBLIC_KEY_LEN], HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = framed
        .next()
        .await
        .ok_or(HandshakeError::ConnectionClosed)??;

    if frame.len() != PUBLIC_KEY_LEN {
        return Err(HandshakeError::BadKeyLength(frame.len()));
    }

    let mut key = [0u8; PUBLIC_KEY_LEN];
    key.copy_from_slice(&frame);
    Ok(key)
}
