//! Non-interactive key exchange.
//!
//! An author mints a fresh symmetric key, encrypts it once under their own
//! certificate and once under the recipient's, and (unless anonymous) signs
//! the canonical form of the record. The signature covers the hash of the
//! plaintext key, so either party can check it after opening their copy.
//!
//! Message keys are always signed. Wallet comment keys may be anonymous, in
//! which case they carry no signature and signature type `None`.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tollgate_lib::config::{MessageServiceConfig, WalletServiceConfig};
use tollgate_lib::{
    AdmissionRule, AdmissionWindow, CertSignature, ClientId, IdMask, KeyAlgorithm,
    PrivateCertificate, ProtocolError, PublicCertificate, Result, SymmetricKey, WholeSeconds,
};
use zeroize::Zeroizing;

use crate::admission::{
    reject, require_before, require_exact_len, require_id, require_in_window, require_issuable,
    require_span_months, require_unexpired, require_whole_seconds,
};
use crate::signing::{
    CommentKeySignatureType, Digest256, MessageKeySignatureType, SignableRecord,
};

/// Signature scheme of one key record kind.
pub trait KeySignatureScheme:
    Copy + Eq + Debug + Default + Serialize + DeserializeOwned
{
    /// Tag new records are signed with.
    const CURRENT: Self;

    /// Whether records of this kind may be anonymous.
    const ALLOWS_ANONYMOUS: bool;

    fn is_none(&self) -> bool;

    fn is_current(&self) -> bool {
        *self == Self::CURRENT
    }

    /// The signable form of `record` with its opened key.
    fn signable<'a>(record: &KeyRecord<Self>, plain_key: &'a [u8]) -> SignableRecord<'a>;
}

impl KeySignatureScheme for MessageKeySignatureType {
    const CURRENT: Self = MessageKeySignatureType::CURRENT;
    const ALLOWS_ANONYMOUS: bool = false;

    fn is_none(&self) -> bool {
        MessageKeySignatureType::is_none(self)
    }

    fn signable<'a>(record: &KeyRecord<Self>, plain_key: &'a [u8]) -> SignableRecord<'a> {
        SignableRecord::MessageKey {
            key_id: record.key_id,
            from: record.author,
            to: record.recipient,
            plain_key,
            issued: WholeSeconds::round(record.issued),
            valid_until: WholeSeconds::round(record.valid_until),
            algorithm: record.algorithm,
            signature_type: record.signature_type,
        }
    }
}

impl KeySignatureScheme for CommentKeySignatureType {
    const CURRENT: Self = CommentKeySignatureType::CURRENT;
    const ALLOWS_ANONYMOUS: bool = true;

    fn is_none(&self) -> bool {
        CommentKeySignatureType::is_none(self)
    }

    fn signable<'a>(record: &KeyRecord<Self>, plain_key: &'a [u8]) -> SignableRecord<'a> {
        SignableRecord::CommentKey {
            key_id: record.key_id,
            anonymous: record.anonymous,
            algorithm: record.algorithm,
            from: record.author,
            to: record.recipient,
            plain_key,
            issued: WholeSeconds::round(record.issued),
            valid_until: WholeSeconds::round(record.valid_until),
            signature_type: record.signature_type,
        }
    }
}

/// Issue time and expiry of a key, rounded to whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyValidity {
    pub issued: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl KeyValidity {
    /// Valid from `now` for `lifetime`, both ends truncated to the second.
    pub fn starting_at(now: DateTime<Utc>, lifetime: Duration) -> Self {
        Self {
            issued: WholeSeconds::round(now).as_datetime(),
            valid_until: WholeSeconds::round(now + lifetime).as_datetime(),
        }
    }
}

/// A symmetric key wrapped for its author and its recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord<S> {
    pub key_id: ClientId,
    pub author: ClientId,
    pub recipient: ClientId,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(with = "serde_bytes")]
    pub key_for_author: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub key_for_recipient: Vec<u8>,
    pub issued: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub algorithm: KeyAlgorithm,
    pub signature_type: S,
    pub signature: Option<CertSignature>,
}

/// Key shared by the two parties of a message exchange.
pub type MessageKeyRecord = KeyRecord<MessageKeySignatureType>;

/// Key protecting a wallet transfer comment.
pub type CommentKeyRecord = KeyRecord<CommentKeySignatureType>;

/// Limits a new key record is admitted under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPolicy {
    pub issuable: IdMask,
    pub window: AdmissionWindow,
    pub max_validity_months: u32,
    pub algorithm: KeyAlgorithm,
}

impl From<&MessageServiceConfig> for KeyPolicy {
    fn from(config: &MessageServiceConfig) -> Self {
        Self {
            issuable: config.issuable_range(),
            window: config.window,
            max_validity_months: config.max_key_validity_months,
            algorithm: config.key_algorithm,
        }
    }
}

impl From<&WalletServiceConfig> for KeyPolicy {
    fn from(config: &WalletServiceConfig) -> Self {
        Self {
            issuable: config.issuable_range(),
            window: config.window,
            max_validity_months: config.max_key_validity_months,
            algorithm: config.key_algorithm,
        }
    }
}

impl<S: KeySignatureScheme> KeyRecord<S> {
    /// Mint a fresh key for `author` and `recipient`.
    ///
    /// Returns the record to publish and the plaintext key for the author's
    /// own use.
    #[tracing::instrument(skip_all, fields(key_id = %key_id, anonymous = anonymous))]
    pub fn mint<A, R>(
        key_id: ClientId,
        author: &A,
        recipient: &R,
        validity: KeyValidity,
        anonymous: bool,
    ) -> Result<(Self, SymmetricKey)>
    where
        A: PrivateCertificate,
        R: PublicCertificate,
    {
        if anonymous && !S::ALLOWS_ANONYMOUS {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "anonymous",
                "this key kind is always signed",
            ));
        }

        let key = SymmetricKey::generate();
        let mut record = Self {
            key_id,
            author: author.public().id(),
            recipient: recipient.id(),
            anonymous,
            key_for_author: author.public().encrypt(key.as_bytes())?,
            key_for_recipient: recipient.encrypt(key.as_bytes())?,
            issued: validity.issued,
            valid_until: validity.valid_until,
            algorithm: key.algorithm(),
            signature_type: S::default(),
            signature: None,
        };

        if !anonymous {
            record.signature_type = S::CURRENT;
            let digest = record.digest(key.as_bytes())?;
            record.signature = Some(author.sign(&digest)?);
        }

        tracing::debug!(author = %record.author, recipient = %record.recipient, "key minted");
        Ok((record, key))
    }

    /// Canonical digest of this record with its opened key.
    pub fn digest(&self, plain_key: &[u8]) -> Result<Digest256> {
        S::signable(self, plain_key).digest()
    }

    /// Check the record from the author's side, opening the author copy.
    ///
    /// `Ok(false)` for unsigned records, foreign signers, and ciphertexts
    /// that do not open.
    pub fn verify_as_author<A: PrivateCertificate>(&self, author: &A) -> Result<bool> {
        self.verify_with(&self.key_for_author, author, author.public())
    }

    /// Check the record from the recipient's side. The signer is still
    /// the author.
    pub fn verify_as_recipient<P, R>(&self, author: &P, recipient: &R) -> Result<bool>
    where
        P: PublicCertificate,
        R: PrivateCertificate,
    {
        self.verify_with(&self.key_for_recipient, recipient, author)
    }

    /// Like [`verify_as_author`](Self::verify_as_author), failing on `false`.
    pub fn ensure_signed_for_author<A: PrivateCertificate>(&self, author: &A) -> Result<()> {
        if self.verify_as_author(author)? {
            Ok(())
        } else {
            Err(ProtocolError::SignatureVerificationFailed { subject: "key record" })
        }
    }

    /// Like [`verify_as_recipient`](Self::verify_as_recipient), failing on `false`.
    pub fn ensure_signed_for_recipient<P, R>(&self, author: &P, recipient: &R) -> Result<()>
    where
        P: PublicCertificate,
        R: PrivateCertificate,
    {
        if self.verify_as_recipient(author, recipient)? {
            Ok(())
        } else {
            Err(ProtocolError::SignatureVerificationFailed { subject: "key record" })
        }
    }

    fn verify_with<D, P>(&self, ciphertext: &[u8], opener: &D, author: &P) -> Result<bool>
    where
        D: PrivateCertificate,
        P: PublicCertificate,
    {
        if self.signature_type.is_none() {
            return Ok(false);
        }
        let Some(signature) = &self.signature else {
            return Err(ProtocolError::malformed(
                "signature",
                "signed key record carries no signature",
            ));
        };
        if author.id() != self.author
            || signature.signer_id != self.author
            || signature.bytes.len() != author.signature_len()
        {
            tracing::debug!(key_id = %self.key_id, "key signature does not match author");
            return Ok(false);
        }

        let plain_key = match opener.decrypt(ciphertext) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(err) => {
                tracing::warn!(key_id = %self.key_id, %err, "key ciphertext did not open");
                return Ok(false);
            }
        };
        let digest = self.digest(&plain_key)?;
        Ok(author.verify(&digest, signature))
    }

    /// Open the author's copy of the key.
    pub fn open_as_author<A: PrivateCertificate>(&self, author: &A) -> Result<SymmetricKey> {
        let plain = Zeroizing::new(author.decrypt(&self.key_for_author)?);
        Ok(SymmetricKey::from_bytes(&plain)?)
    }

    /// Open the recipient's copy of the key.
    pub fn open_as_recipient<R: PrivateCertificate>(&self, recipient: &R) -> Result<SymmetricKey> {
        let plain = Zeroizing::new(recipient.decrypt(&self.key_for_recipient)?);
        Ok(SymmetricKey::from_bytes(&plain)?)
    }

    /// Whether a request may still depend on this key at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    /// Fail with the expired-key rule once the key is past its validity.
    pub fn ensure_usable_at(&self, field: &'static str, now: DateTime<Utc>) -> Result<()> {
        require_unexpired(field, &self.valid_until, now)
    }

    /// Admit a newly published key record from `author`.
    pub fn validate_at<P: PublicCertificate>(
        &self,
        policy: &KeyPolicy,
        author: &P,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require_id("key_id", &self.key_id)?;
        require_id("author", &self.author)?;
        require_id("recipient", &self.recipient)?;
        if self.author != author.id() {
            return Err(reject(
                AdmissionRule::KeyMismatch,
                "author",
                format!("record author {} is not the caller {}", self.author, author.id()),
            ));
        }

        require_issuable("key_id", &self.key_id, &policy.issuable)?;

        let expected = author.encrypted_len(policy.algorithm.key_len());
        require_exact_len("key_for_author", self.key_for_author.len(), expected)?;
        require_exact_len("key_for_recipient", self.key_for_recipient.len(), expected)?;
        if self.algorithm != policy.algorithm {
            return Err(reject(
                AdmissionRule::ValueRange,
                "algorithm",
                format!("{:?} is not accepted", self.algorithm),
            ));
        }

        require_whole_seconds("issued", &self.issued)?;
        require_whole_seconds("valid_until", &self.valid_until)?;
        require_in_window("issued", &self.issued, &policy.window, now)?;
        require_before("valid_until", &self.issued, &self.valid_until)?;
        require_span_months(
            "valid_until",
            &self.issued,
            &self.valid_until,
            policy.max_validity_months,
        )?;

        self.validate_signature_mode(author)
    }

    fn validate_signature_mode<P: PublicCertificate>(&self, author: &P) -> Result<()> {
        if self.anonymous {
            if !S::ALLOWS_ANONYMOUS {
                return Err(reject(
                    AdmissionRule::SignatureMode,
                    "anonymous",
                    "this key kind is always signed",
                ));
            }
            if !self.signature_type.is_none() || self.signature.is_some() {
                return Err(reject(
                    AdmissionRule::SignatureMode,
                    "signature",
                    "anonymous key must carry no signature and signature type none",
                ));
            }
            return Ok(());
        }

        if !self.signature_type.is_current() {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "signature_type",
                "signed key must carry the current signature type",
            ));
        }
        let Some(signature) = &self.signature else {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "signature",
                "signed key carries no signature",
            ));
        };
        if signature.signer_id != self.author {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "signature",
                format!("signed by {}, not the author", signature.signer_id),
            ));
        }
        if signature.bytes.len() != author.signature_len() {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "signature",
                format!(
                    "signature is {} bytes, expected {}",
                    signature.bytes.len(),
                    author.signature_len()
                ),
            ));
        }
        Ok(())
    }
}
