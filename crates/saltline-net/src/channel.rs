//! Encrypted channel over one framed connection
//!
//! A channel binds one (remote public key, local keypair, stream)
//! triple for its entire life. Outbound messages are sealed under a
//! fresh nonce and wrapped in the wire envelope; inbound frames are
//! parsed, opened, and surfaced in stream arrival order.

use crate::framing::FrameCodec;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use saltline_core::{cryptobox, Envelope, KeyPair};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// Outbound queue depth. `send` awaits capacity here instead of
/// buffering without bound when the transport cannot drain.
const SEND_QUEUE_DEPTH: usize = 64;

/// Channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("crypto error: {0}")]
    Crypto(#[from] saltline_core::Error),
}

/// Event surfaced by a channel
#[derive(Debug)]
pub enum ChannelEvent {
    /// One decrypted application message, in stream arrival order
    Message(Bytes),
    /// Terminal: the connection ended; no further events follow
    Closed,
}

/// Encrypted session bound to one fixed remote identity
pub struct SecureChannel {
    remote_public: [u8; 32],
    keypair: KeyPair,
    outbound: mpsc::Sender<Bytes>,
    events: mpsc::Receiver<ChannelEvent>,
    shutdown: broadcast::Sender<()>,
    /// Is the channel open
    open: Arc<RwLock<bool>>,
}

impl SecureChannel {
    /// Wrap a framed stream whose handshake has already completed.
    ///
    /// Spawns one reader and one writer task; each owns its half of the
    /// stream exclusively, so no state is shared across connections.
    pub fn new<S>(framed: Framed<S, FrameCodec>, remote_public: [u8; 32], keypair: KeyPair) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(SEND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(SEND_QUEUE_DEPTH);
        let (shutdown_tx, mut reader_shutdown) = broadcast::channel(1);
        let mut writer_shutdown = shutdown_tx.subscribe();
        let open = Arc::new(RwLock::new(true));

        let (mut sink, mut stream) = framed.split();

        let writer_open = open.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        match frame {
                            Some(frame) => {
                                if let Err(e) = sink.send(frame).await {
                                    debug!("write failed: {}", e);
                                    break;
                                }
                            }
                            // All channel handles dropped
                            None => break,
                        }
                    }
                    _ = writer_shutdown.recv() => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
            *writer_open.write() = false;
        });

        let reader_keypair = keypair.clone();
        let reader_open = open.clone();
        let reader_shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = stream.next() => {
                        match frame {
                            Some(Ok(frame)) => {
                                match open_frame(&frame, &remote_public, &reader_keypair) {
                                    Ok(Some(plaintext)) => {
                                        if event_tx.send(ChannelEvent::Message(plaintext)).await.is_err() {
                                            break;
                                        }
                                    }
                                    // Authentication failure: expected defense
                                    // against tampering, never fatal
                                    Ok(None) => {}
                                    Err(e) => {
                                        warn!("protocol error on channel: {}", e);
                                        break;
                                    }
                                }
                            }
                            Some(Err(e)) => {
                                debug!("framing error: {}", e);
                                break;
                            }
                            None => break,
                        }
                    }
                    _ = reader_shutdown.recv() => break,
                }
            }
            // Whatever ended the read side ends the whole channel: mark
            // it closed and wind down the writer before the terminal event
            *reader_open.write() = false;
            let _ = reader_shutdown_tx.send(());
            let _ = event_tx.send(ChannelEvent::Closed).await;
        });

        Self {
            remote_public,
            keypair,
            outbound: outbound_tx,
            events: event_rx,
            shutdown: shutdown_tx,
            open,
        }
    }

    /// The remote public key this channel is bound to
    pub fn remote_public(&self) -> [u8; 32] {
        self.remote_public
    }

    /// Seal `message` under a fresh nonce and queue it as one frame.
    ///
    /// Awaits outbound queue capacity when the transport is slower than
    /// the caller.
    pub async fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        if !*self.open.read() {
            return Err(ChannelError::Closed);
        }

        let nonce = cryptobox::generate_nonce();
        let ciphertext =
            cryptobox::seal(message, &nonce, &self.remote_public, self.keypair.secret())?;
        let frame = Envelope::new(&ciphertext, &nonce).to_bytes()?;

        self.outbound
            .send(Bytes::from(frame))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Next channel event. Returns `None` once `Closed` has been taken.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Tear down the channel and its connection. Idempotent; no events
    /// are delivered after the terminal `Closed`.
    pub fn destroy(&self) {
        *self.open.write() = false;
        let _ = self.shutdown.send(());
    }
}

/// Parse and open one inbound frame.
///
/// `Ok(None)` means the frame failed authentication and is silently
/// dropped. A malformed envelope is a protocol bug and returns an error
/// that closes the channel.
fn open_frame(
    frame: &[u8],
    remote_public: &[u8; 32],
    keypair: &KeyPair,
) -> Result<Option<Bytes>, saltline_core::Error> {
    let envelope = Envelope::from_bytes(frame)?;
    let (ciphertext, nonce) = envelope.decode_parts()?;

    match cryptobox::open(&ciphertext, &nonce, remote_public, keypair.secret()) {
        Ok(plaintext) => Ok(Some(Bytes::from(plaintext))),
        Err(saltline_core::Error::AuthenticationFailed) => {
            trace!("dropping frame that failed authentication");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake;
    use tokio::io::DuplexStream;

    async fn channel_pair() -> (SecureChannel, SecureChannel) {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let (client, server) = tokio::io::duplex(1 << 16);
        let mut client_framed = Framed::new(client, FrameCodec);
        let mut server_framed = Framed::new(server, FrameCodec);

        handshake::initiate(&mut client_framed, &alice.public_key())
            .await
            .unwrap();
        let announced = handshake::respond(&mut server_framed).await.unwrap();

        let initiator = SecureChannel::new(client_framed, bob.public_key(), alice);
        let responder = SecureChannel::new(server_framed, announced, bob);
        (initiator, responder)
    }

    /// Raw framed peer (alice) plus a channel (bob) bound to alice's key
    async fn raw_and_channel() -> (
        Framed<DuplexStream, FrameCodec>,
        KeyPair,
        [u8; 32],
        SecureChannel,
    ) {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let bob_public = bob.public_key();

        let (client, server) = tokio::io::duplex(1 << 16);
        let raw = Framed::new(client, FrameCodec);
        let channel = SecureChannel::new(Framed::new(server, FrameCodec), alice.public_key(), bob);
        (raw, alice, bob_public, channel)
    }

    fn seal_envelope(message: &[u8], from: &KeyPair, to_public: &[u8; 32]) -> Vec<u8> {
        let nonce = cryptobox::generate_nonce();
        let ciphertext = cryptobox::seal(message, &nonce, to_public, from.secret()).unwrap();
        Envelope::new(&ciphertext, &nonce).to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let (initiator, mut responder) = channel_pair().await;
        initiator.send(b"hello over the wire").await.unwrap();

        match responder.recv().await.unwrap() {
            ChannelEvent::Message(m) => assert_eq!(&m[..], b"hello over the wire"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let (initiator, mut responder) = channel_pair().await;

        for i in 0u8..10 {
            initiator.send(&[i]).await.unwrap();
        }
        for i in 0u8..10 {
            match responder.recv().await.unwrap() {
                ChannelEvent::Message(m) => assert_eq!(&m[..], &[i]),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_tampered_frame_dropped_channel_survives() {
        let (mut raw, alice, bob_public, mut channel) = raw_and_channel().await;

        // A frame with one ciphertext bit flipped inside the envelope
        let nonce = cryptobox::generate_nonce();
        let mut ciphertext =
            cryptobox::seal(b"garbled", &nonce, &bob_public, alice.secret()).unwrap();
        ciphertext[0] ^= 0x01;
        let bad = Envelope::new(&ciphertext, &nonce).to_bytes().unwrap();
        raw.send(Bytes::from(bad)).await.unwrap();

        // Followed by an honest frame
        let good = seal_envelope(b"still here", &alice, &bob_public);
        raw.send(Bytes::from(good)).await.unwrap();

        // Only the honest frame is delivered
        match channel.recv().await.unwrap() {
            ChannelEvent::Message(m) => assert_eq!(&m[..], b"still here"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_key_binding_delivers_nothing() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let wrong = KeyPair::generate();

        let (client, server) = tokio::io::duplex(1 << 16);
        let mut raw = Framed::new(client, FrameCodec);
        // Bound to the wrong remote identity
        let mut channel = SecureChannel::new(
            Framed::new(server, FrameCodec),
            wrong.public_key(),
            bob.clone(),
        );

        let frame = seal_envelope(b"for bob", &alice, &bob.public_key());
        raw.send(Bytes::from(frame)).await.unwrap();
        drop(raw);

        // The real sender's traffic never decrypts; only Closed arrives
        match channel.recv().await.unwrap() {
            ChannelEvent::Closed => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(channel.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_envelope_closes_channel() {
        let (mut raw, _alice, _bob_public, mut channel) = raw_and_channel().await;

        raw.send(Bytes::from_static(b"definitely not an envelope"))
            .await
            .unwrap();

        match channel.recv().await.unwrap() {
            ChannelEvent::Closed => {}
            other => panic!("unexpected event: {:?}", other),
        }

        // The close is real: sends fail and nothing more reaches the wire
        assert!(!channel.is_open());
        let result = channel.send(b"after close").await;
        assert!(matches!(result, Err(ChannelError::Closed)));
        assert!(raw.next().await.is_none());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (mut initiator, mut responder) = channel_pair().await;

        initiator.destroy();
        initiator.destroy();

        // Each side observes exactly one terminal close, then nothing
        match initiator.recv().await.unwrap() {
            ChannelEvent::Closed => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(initiator.recv().await.is_none());

        match responder.recv().await.unwrap() {
            ChannelEvent::Closed => {}
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(responder.recv().await.is_none());

        // Sends after destroy fail instead of buffering
        assert!(!initiator.is_open());
        let result = initiator.send(b"too late").await;
        assert!(matches!(result, Err(ChannelError::Closed)));
    }
}
