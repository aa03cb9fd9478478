//! Certificate capabilities used by key exchange and request signing.
//!
//! The protocol core never touches key material directly. It asks a
//! [`PublicCertificate`] to verify and encrypt, and a [`PrivateCertificate`]
//! to sign and decrypt. [`LightCertificate`] is the bundled implementation:
//! Ed25519 for signatures and an X25519 sealed box for encryption.

use std::fmt;

use ed25519_dalek::{Signature as DalekSig, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::encryption::{open_with, seal_to, sealed_box_len};
use crate::errors::CryptoError;
use crate::identifier::ClientId;

/// A signature together with the identity of the certificate that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertSignature {
    pub signer_id: ClientId,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl CertSignature {
    pub fn new(signer_id: ClientId, bytes: Vec<u8>) -> Self {
        Self { signer_id, bytes }
    }
}

/// Public half of a certificate.
pub trait PublicCertificate {
    /// Identity the certificate was issued to.
    fn id(&self) -> ClientId;

    /// Exact length of every signature this certificate produces.
    fn signature_len(&self) -> usize;

    /// Exact ciphertext length for `plaintext_len` bytes of input.
    fn encrypted_len(&self, plaintext_len: usize) -> usize;

    /// Verify `signature` over `data`. Never fails loudly: anything
    /// malformed is simply not a valid signature.
    fn verify(&self, data: &[u8], signature: &CertSignature) -> bool;

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Private half of a certificate.
pub trait PrivateCertificate {
    type Public: PublicCertificate;

    fn public(&self) -> &Self::Public;

    fn sign(&self, data: &[u8]) -> Result<CertSignature, CryptoError>;

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Public certificate: an identity plus Ed25519 and X25519 public keys.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCertificate {
    id: ClientId,
    verifying_key: [u8; 32],
    encryption_key: [u8; 32],
}

impl LightCertificate {
    pub fn new(id: ClientId, verifying_key: [u8; 32], encryption_key: [u8; 32]) -> Self {
        Self {
            id,
            verifying_key,
            encryption_key,
        }
    }

    pub fn verifying_key(&self) -> &[u8; 32] {
        &self.verifying_key
    }

    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption_key
    }
}

impl fmt::Debug for LightCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightCertificate")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PublicCertificate for LightCertificate {
    fn id(&self) -> ClientId {
        self.id
    }

    fn signature_len(&self) -> usize {
        ed25519_dalek::SIGNATURE_LENGTH
    }

    fn encrypted_len(&self, plaintext_len: usize) -> usize {
        sealed_box_len(plaintext_len)
    }

    fn verify(&self, data: &[u8], signature: &CertSignature) -> bool {
        if signature.signer_id != self.id {
            return false;
        }
        let Ok(key) = VerifyingKey::from_bytes(&self.verifying_key) else {
            return false;
        };
        let Ok(sig) = DalekSig::from_slice(&signature.bytes) else {
            return false;
        };
        key.verify(data, &sig).is_ok()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), fields(cert = %self.id)))]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        seal_to(&X25519PublicKey::from(self.encryption_key), data)
    }
}

/// Private certificate holding the signing and decryption secrets.
///
/// Both secrets are zeroized on drop by their own types.
#[derive(Clone)]
pub struct PrivateLightCertificate {
    public: LightCertificate,
    signing_key: SigningKey,
    decryption_key: StaticSecret,
}

impl PrivateLightCertificate {
    /// Issue a fresh certificate for `id`.
    pub fn generate(id: ClientId) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let decryption_key = StaticSecret::random_from_rng(OsRng);
        Self::from_keys(id, signing_key, decryption_key)
    }

    /// Rebuild a certificate from stored secret bytes.
    pub fn from_secret_bytes(id: ClientId, signing: [u8; 32], decryption: [u8; 32]) -> Self {
        Self::from_keys(
            id,
            SigningKey::from_bytes(&signing),
            StaticSecret::from(decryption),
        )
    }

    fn from_keys(id: ClientId, signing_key: SigningKey, decryption_key: StaticSecret) -> Self {
        let public = LightCertificate::new(
            id,
            signing_key.verifying_key().to_bytes(),
            X25519PublicKey::from(&decryption_key).to_bytes(),
        );
        Self {
            public,
            signing_key,
            decryption_key,
        }
    }
}

impl fmt::Debug for PrivateLightCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateLightCertificate")
            .field("id", &self.public.id)
            .finish_non_exhaustive()
    }
}

impl PrivateCertificate for PrivateLightCertificate {
    type Public = LightCertificate;

    fn public(&self) -> &LightCertificate {
        &self.public
    }

    fn sign(&self, data: &[u8]) -> Result<CertSignature, CryptoError> {
        let sig = self
            .signing_key
            .try_sign(data)
            .map_err(|e| CryptoError::SignFailed(e.to_string()))?;
        Ok(CertSignature::new(self.public.id, sig.to_bytes().to_vec()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), fields(cert = %self.public.id)))]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        open_with(&self.decryption_key, data)
    }
}
