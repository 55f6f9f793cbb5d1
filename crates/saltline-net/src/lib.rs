//! Networking layer for saltline
//!
//! This crate provides:
//! - Length-prefixed framing over raw byte streams
//! - The one-shot public-key handshake
//! - Encrypted channels bound to one remote identity
//! - Listener and dialer composition

pub mod channel;
pub mod framing;
pub mod handshake;
pub mod initiator;
pub mod listener;

pub use channel::{ChannelError, ChannelEvent, SecureChannel};
pub use framing::{FrameCodec, FrameError, MAX_FRAME_SIZE};
pub use initiator::connect;
pub use listener::Listener;
