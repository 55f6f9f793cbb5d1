//! Accepting side of the protocol
//!
//! Binds a TCP port, runs the responder handshake on every accepted
//! connection, and emits one ready channel per completed handshake.

use crate::channel::SecureChannel;
use crate::framing::FrameCodec;
use crate::handshake::{self, HandshakeError};
use saltline_core::KeyPair;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Listener errors
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts raw connections and emits ready channels
pub struct Listener {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<SecureChannel>,
    shutdown: broadcast::Sender<()>,
}

impl Listener {
    /// Bind and start accepting. Each accepted connection runs its
    /// handshake on its own task; a handshake failure tears down that
    /// connection only.
    pub async fn bind(addr: SocketAddr, keypair: KeyPair) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (incoming_tx, incoming_rx) = mpsc::channel(16);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        info!("listening on {}", local_addr);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer_addr)) => {
                                debug!("accepted connection from {}", peer_addr);
                                let keypair = keypair.clone();
                                let incoming_tx = incoming_tx.clone();
                                tokio::spawn(async move {
                                    match accept_channel(stream, keypair).await {
                                        Ok(channel) => {
                                            let _ = incoming_tx.send(channel).await;
                                        }
                                        Err(e) => {
                                            warn!("handshake with {} failed: {}", peer_addr, e);
                                        }
                                    }
                                });
                            }
                            Err(e) => {
                                warn!("accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("listener on {} stopping", local_addr);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            incoming: incoming_rx,
            shutdown: shutdown_tx,
        })
    }

    /// Next established channel. Returns `None` once the listener has
    /// stopped and the pending queue is drained.
    pub async fn accept(&mut self) -> Option<SecureChannel> {
        self.incoming.recv().await
    }

    /// The bound address (useful when binding port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new connections. Channels already established are
    /// unaffected. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

async fn accept_channel(
    stream: TcpStream,
    keypair: KeyPair,
) -> Result<SecureChannel, HandshakeError> {
    let mut framed = Framed::new(stream, FrameCodec);
    let announced = handshake::respond(&mut framed).await?;
    Ok(SecureChannel::new(framed, announced, keypair))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelEvent;
    use crate::initiator::connect;

    async fn bind_local(keypair: KeyPair) -> Listener {
        Listener::bind("127.0.0.1:0".parse().unwrap(), keypair)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_handshake_scenario() {
        let server_keys = KeyPair::generate();
        let client_keys = KeyPair::generate();
        let mut listener = bind_local(server_keys.clone()).await;

        let client = connect(
            listener.local_addr(),
            client_keys.clone(),
            server_keys.public_key(),
        )
        .await
        .unwrap();

        // The initiator can send immediately, before accept() returns
        client.send(b"first contact").await.unwrap();

        let mut server_channel = listener.accept().await.unwrap();
        assert_eq!(server_channel.remote_public(), client_keys.public_key());

        match server_channel.recv().await.unwrap() {
            ChannelEvent::Message(m) => assert_eq!(&m[..], b"first contact"),
            other => panic!("unexpected event: {:?}", other),
        }

        // And the responder can answer on the same channel
        server_channel.send(b"welcome").await.unwrap();
        let mut client = client;
        match client.recv().await.unwrap() {
            ChannelEvent::Message(m) => assert_eq!(&m[..], b"welcome"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_independent_sessions() {
        let server_keys = KeyPair::generate();
        let first_keys = KeyPair::generate();
        let second_keys = KeyPair::generate();
        let mut listener = bind_local(server_keys.clone()).await;

        let first = connect(
            listener.local_addr(),
            first_keys.clone(),
            server_keys.public_key(),
        )
        .await
        .unwrap();
        let second = connect(
            listener.local_addr(),
            second_keys.clone(),
            server_keys.public_key(),
        )
        .await
        .unwrap();

        first.send(b"from first").await.unwrap();
        second.send(b"from second").await.unwrap();

        // Accept order is not deterministic; match channels by binding
        for _ in 0..2 {
            let mut channel = listener.accept().await.unwrap();
            let expected: &[u8] = if channel.remote_public() == first_keys.public_key() {
                b"from first"
            } else {
                assert_eq!(channel.remote_public(), second_keys.public_key());
                b"from second"
            };
            match channel.recv().await.unwrap() {
                ChannelEvent::Message(m) => assert_eq!(&m[..], expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_ends_accept() {
        let listener = bind_local(KeyPair::generate()).await;

        listener.stop();
        listener.stop();

        let mut listener = listener;
        assert!(listener.accept().await.is_none());
    }
}
