//! Static X25519 key material
//!
//! One keypair identifies one party for the lifetime of its identity.
//! The public half is shareable; the secret half never leaves its holder.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

/// Public key length in bytes
pub const PUBLIC_KEY_LEN: usize = 32;
/// Secret key length in bytes
pub const SECRET_KEY_LEN: usize = 32;

/// Long-lived X25519 keypair
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Create from seed bytes (for deterministic testing)
    pub fn from_seed(seed: &[u8; SECRET_KEY_LEN]) -> Self {
        let secret = StaticSecret::from(*seed);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key bytes
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public.to_bytes()
    }

    /// Get the secret half, for use in box seal/open
    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret half
        write!(f, "KeyPair({})", hex::encode(&self.public.as_bytes()[..8]))
    }
}
