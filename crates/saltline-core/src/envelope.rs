//! Textual wire envelope
//!
//! Every encrypted message travels as one frame whose payload is a JSON
//! object with two base64 fields: `data` (ciphertext) and `nonce`.
//! Both peers must produce this exact structure.

use crate::cryptobox::NONCE_LEN;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

/// Wire form of one encrypted message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded ciphertext
    pub data: String,
    /// Base64-encoded 24-byte nonce
    pub nonce: String,
}

impl Envelope {
    /// Build an envelope from raw ciphertext and nonce
    pub fn new(ciphertext: &[u8], nonce: &[u8; NONCE_LEN]) -> Self {
        Self {
            data: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce),
        }
    }

    /// Serialize to the bytes carried as one frame payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse an envelope from a frame payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Decode the base64 fields back into (ciphertext, nonce)
    pub fn decode_parts(&self) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
        let ciphertext = BASE64.decode(&self.data)?;
        let nonce_bytes = BASE64.decode(&self.nonce)?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidNonceLength(nonce_bytes.len()))?;
        Ok((ciphertext, nonce))
    }
}
