//! saltline Core Library
//!
//! This crate provides the key material, the public-key box construction,
//! and the textual wire envelope used by saltline encrypted channels.
//!
//! # Modules
//!
//! - [`keys`]: Static X25519 keypairs
//! - [`cryptobox`]: Seal/open using DH key agreement plus AEAD
//! - [`envelope`]: The `{data, nonce}` wire structure
//! - [`error`]: Error types

pub mod cryptobox;
pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::Envelope;
pub use error::{Error, Result};
pub use keys::KeyPair;
