//! AES-256-GCM sealing for shared keys and signed digests.
//!
//! Two constructions live here:
//!
//! - **Sealed box**: a fresh X25519 ephemeral key agrees a secret with the
//!   recipient's static key, HKDF-SHA256 derives the AES key and nonce, and
//!   the plaintext is sealed with AES-256-GCM. Only the recipient can open it.
//! - **Sealed digest**: a 32-byte canonical digest sealed under a shared
//!   symmetric key with a nonce derived from the key and the digest. The
//!   output is deterministic, so a holder of the key checks it by resealing
//!   and comparing in constant time.
//!
//! # Wire Format
//!
//! ```text
//! sealed box:    [32 bytes ephemeral public key][N bytes ciphertext][16 bytes auth tag]
//! sealed digest: [12 bytes nonce][32 bytes ciphertext][16 bytes auth tag]
//! ```

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{CryptoError, ProtocolError};

/// Size of the nonce in bytes (96 bits for GCM).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of an X25519 public key.
pub const EPHEMERAL_KEY_SIZE: usize = 32;

/// Length of the digests this module seals.
pub const DIGEST_SIZE: usize = 32;

const SEALED_BOX_INFO: &[u8] = b"tollgate/sealed-box/v1";
const SEALED_DIGEST_SALT: &[u8] = b"tollgate/sealed-digest/v1";

/// Symmetric algorithm of a shared key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum KeyAlgorithm {
    #[default]
    Aes256 = 0,
}

impl KeyAlgorithm {
    /// Single-byte ordinal written by the signing codec.
    pub fn tag(&self) -> u8 {
        *self as u8
    }

    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes256 => 32,
        }
    }

    /// Length of a digest sealed under a key of this algorithm.
    pub fn sealed_digest_len(&self) -> usize {
        match self {
            Self::Aes256 => NONCE_SIZE + DIGEST_SIZE + TAG_SIZE,
        }
    }
}

impl TryFrom<u8> for KeyAlgorithm {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Aes256),
            other => Err(ProtocolError::unsupported("key_algorithm", other)),
        }
    }
}

/// A shared AES-256 key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    /// Fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("expected 32 key bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Aes256
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

fn cipher(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Seal a digest under a shared key. Same inputs give the same bytes.
pub fn seal_digest(key: &SymmetricKey, digest: &[u8; DIGEST_SIZE]) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(SEALED_DIGEST_SALT), key.as_bytes());
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    hk.expand(digest, &mut nonce_bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let ciphertext = cipher(key.as_bytes())?
        .encrypt(Nonce::from_slice(&nonce_bytes), digest.as_slice())
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Constant-time check of a sealed digest.
pub fn check_sealed_digest(
    key: &SymmetricKey,
    digest: &[u8; DIGEST_SIZE],
    sealed: &[u8],
) -> Result<bool, CryptoError> {
    let expected = seal_digest(key, digest)?;
    Ok(expected.ct_eq(sealed).into())
}

/// Total length of a sealed box carrying `plaintext_len` bytes.
pub fn sealed_box_len(plaintext_len: usize) -> usize {
    EPHEMERAL_KEY_SIZE + plaintext_len + TAG_SIZE
}

fn derive_box_key(
    shared: &[u8; 32],
    ephemeral: &X25519PublicKey,
    recipient: &X25519PublicKey,
) -> Result<([u8; 32], [u8; NONCE_SIZE]), CryptoError> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);

    let mut okm = [0u8; 32 + NONCE_SIZE];
    hk.expand(SEALED_BOX_INFO, &mut okm)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut key = [0u8; 32];
    let mut nonce = [0u8; NONCE_SIZE];
    key.copy_from_slice(&okm[..32]);
    nonce.copy_from_slice(&okm[32..]);
    okm.zeroize();
    Ok((key, nonce))
}

/// Seal `plaintext` so only the holder of `recipient`'s secret can open it.
pub fn seal_to(recipient: &X25519PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(CryptoError::EncryptFailed(
            "recipient key is a low-order point".to_string(),
        ));
    }

    let (mut key, nonce) = derive_box_key(shared.as_bytes(), &ephemeral_public, recipient)?;
    let sealed = cipher(&key)?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()));
    key.zeroize();
    let ciphertext = sealed?;

    let mut result = Vec::with_capacity(EPHEMERAL_KEY_SIZE + ciphertext.len());
    result.extend_from_slice(ephemeral_public.as_bytes());
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a sealed box with the recipient's static secret.
pub fn open_with(secret: &StaticSecret, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < EPHEMERAL_KEY_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidFormat);
    }

    let mut ephemeral = [0u8; EPHEMERAL_KEY_SIZE];
    ephemeral.copy_from_slice(&sealed[..EPHEMERAL_KEY_SIZE]);
    let ephemeral_public = X25519PublicKey::from(ephemeral);
    let recipient_public = X25519PublicKey::from(secret);

    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptFailed(
            "ephemeral key is a low-order point".to_string(),
        ));
    }

    let (mut key, nonce) = derive_box_key(shared.as_bytes(), &ephemeral_public, &recipient_public)?;
    let opened = cipher(&key)?
        .decrypt(Nonce::from_slice(&nonce), &sealed[EPHEMERAL_KEY_SIZE..])
        .map_err(|_| CryptoError::DecryptFailed("Authentication failed".to_string()));
    key.zeroize();
    opened
}
