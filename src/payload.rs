//! Symmetric payload encryption under the encapsulated threshold key.
//!
//! The threshold algebra only transports a target-group element. This module
//! turns that element into a 32-byte key and seals the caller's payload with
//! an authenticated cipher, so that a wrong reconstruction is detected rather
//! than silently producing garbage.

use ark_ec::pairing::{Pairing, PairingOutput};
use ark_serialize::CanonicalSerialize;
use blake2::{Blake2b512, Digest};
use orion::hazardous::aead::xchacha20poly1305;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SteError;
use crate::security::subtle_constant_time_eq;

/// Domain separation tag for key derivation
const KDF_DOMAIN: &[u8] = b"silent-threshold/payload-key/v1";

pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Symmetric key derived from an encapsulated key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_SIZE]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        SymmetricKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        subtle_constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SymmetricKey {}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Derives the payload key from the encapsulated key and a context string
/// (the ciphertext header), binding the payload to that exact ciphertext.
pub fn derive_key<E: Pairing>(
    encapsulated: &PairingOutput<E>,
    context: &[u8],
) -> Result<SymmetricKey, SteError> {
    let mut key_bytes = Vec::new();
    encapsulated.serialize_compressed(&mut key_bytes)?;

    let mut hasher = Blake2b512::new();
    hasher.update(KDF_DOMAIN);
    hasher.update((key_bytes.len() as u64).to_le_bytes());
    hasher.update(&key_bytes);
    hasher.update(context);
    let digest = hasher.finalize();
    key_bytes.zeroize();

    let mut key = [0u8; SYMMETRIC_KEY_SIZE];
    key.copy_from_slice(&digest[..SYMMETRIC_KEY_SIZE]);
    Ok(SymmetricKey(key))
}

/// Authenticated encryption used for the payload.
///
/// `open` must fail on any modification of `sealed` or on a wrong key.
pub trait PayloadCipher: Send + Sync {
    fn seal(&self, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, SteError>;
    fn open(&self, key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, SteError>;
}

/// Length of the random nonce in front of every sealed payload.
pub const NONCE_SIZE: usize = 24;

/// Length of the Poly1305 tag at the end of every sealed payload.
pub const TAG_SIZE: usize = 16;

/// XChaCha20-Poly1305 with a random 192-bit nonce prepended to the output.
///
/// Sealed layout is `nonce || ciphertext || tag`. Empty plaintexts seal to
/// just the nonce and the tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaCha20Poly1305;

impl XChaCha20Poly1305 {
    fn orion_key(key: &SymmetricKey) -> Result<xchacha20poly1305::SecretKey, SteError> {
        xchacha20poly1305::SecretKey::from_slice(key.as_bytes())
            .map_err(|_| SteError::Encoding("invalid payload key length".to_string()))
    }
}

impl PayloadCipher for XChaCha20Poly1305 {
    fn seal(&self, key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, SteError> {
        let secret_key = Self::orion_key(key)?;
        let mut sealed = vec![0u8; NONCE_SIZE + plaintext.len() + TAG_SIZE];
        let (nonce_bytes, body) = sealed.split_at_mut(NONCE_SIZE);

        orion::util::secure_rand_bytes(nonce_bytes)
            .map_err(|_| SteError::Encoding("nonce generation failed".to_string()))?;
        let nonce = xchacha20poly1305::Nonce::from_slice(nonce_bytes)
            .map_err(|_| SteError::Encoding("invalid nonce length".to_string()))?;
        xchacha20poly1305::seal(&secret_key, &nonce, plaintext, None, body)
            .map_err(|_| SteError::Encoding("payload sealing failed".to_string()))?;
        Ok(sealed)
    }

    fn open(&self, key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, SteError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SteError::DecapsulationFailure);
        }
        let secret_key = Self::orion_key(key)?;
        let (nonce_bytes, body) = sealed.split_at(NONCE_SIZE);
        let nonce = xchacha20poly1305::Nonce::from_slice(nonce_bytes)
            .map_err(|_| SteError::DecapsulationFailure)?;

        let mut plaintext = vec![0u8; body.len() - TAG_SIZE];
        xchacha20poly1305::open(&secret_key, &nonce, body, None, &mut plaintext)
            .map_err(|_| SteError::DecapsulationFailure)?;
        Ok(plaintext)
    }
}
