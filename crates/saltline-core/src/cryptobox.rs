//! Public-key authenticated encryption
//!
//! Seal/open combine X25519 Diffie-Hellman key agreement with
//! XChaCha20-Poly1305. Both directions of a pair derive the same
//! message key, so `open` uses the mirrored key arguments of `seal`.

use crate::error::{Error, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

/// Nonce length in bytes
pub const NONCE_LEN: usize = 24;

/// HKDF info string binding derived keys to this construction
const KEY_CONTEXT: &[u8] = b"saltline box v1";

/// Draw a fresh random nonce from the OS CSPRNG.
///
/// A nonce must never be reused under the same key pair; callers draw
/// one per outbound message.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Derive the symmetric message key for one (their_public, our_secret) pair.
///
/// `key = HKDF-SHA256(DH(our_secret, their_public), "saltline box v1")`
fn message_key(their_public: &[u8; 32], our_secret: &StaticSecret) -> [u8; 32] {
    let shared = our_secret.diffie_hellman(&PublicKey::from(*their_public));
    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());

    let mut key = [0u8; 32];
    hkdf.expand(KEY_CONTEXT, &mut key)
        .expect("32-byte okm is a valid hkdf-sha256 output length");
    key
}

/// Encrypt and authenticate `plaintext` for the holder of `their_public`.
pub fn seal(
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
    their_public: &[u8; 32],
    our_secret: &StaticSecret,
) -> Result<Vec<u8>> {
    let key = message_key(their_public, our_secret);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed)
}

/// Authenticate and decrypt a ciphertext sealed by the holder of `their_public`.
///
/// Fails with [`Error::AuthenticationFailed`] on wrong keys, a wrong
/// nonce, or any modification of the ciphertext.
pub fn open(
    ciphertext: &[u8],
    nonce: &[u8; NONCE_LEN],
    their_public: &[u8; 32],
    our_secret: &StaticSecret,
) -> Result<Vec<u8>> {
    let key = message_key(their_public, our_secret);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::AuthenticationFailed)
}
