//! # Canonical Signing Codec
//!
//! ## Security Model
//!
//! Every signed record is reduced to one fixed byte layout and hashed with
//! SHA-256. The layout MUST be identical on every peer:
//! - Fields are written in a declared order per record kind
//! - Integers are little-endian, identifiers are their 16-byte GUID form
//! - Bodies, comments and key material appear only as their SHA-256 hash
//! - Timestamps are whole seconds, written as 100ns ticks since 0001-01-01
//! - Enumerated tags are single bytes
//!
//! ## Versioning
//!
//! Each record kind carries a signature-type tag. A new layout gets a new
//! tag; a tag is never reused for a different layout. Encoding a record
//! whose tag is `None` is a programming error and fails with
//! [`ProtocolError::UnsupportedProtocolVersion`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tollgate_lib::{AdmissionRule, ClientId, KeyAlgorithm, ProtocolError, Result, WholeSeconds};

/// SHA-256 output.
pub type Digest256 = [u8; 32];

/// Hash arbitrary bytes.
pub fn sha256(data: &[u8]) -> Digest256 {
    Sha256::digest(data).into()
}

macro_rules! signature_type {
    ($(#[$meta:meta])* $name:ident, $tag:literal, $current:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            /// Unsigned.
            #[default]
            None = 0,
            $current = 1,
        }

        impl $name {
            /// Tag new records are signed with.
            pub const CURRENT: Self = Self::$current;

            pub fn tag(&self) -> u8 {
                *self as u8
            }

            pub fn is_none(&self) -> bool {
                matches!(self, Self::None)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self> {
                match value {
                    0 => Ok(Self::None),
                    1 => Ok(Self::$current),
                    other => Err(ProtocolError::unsupported($tag, other)),
                }
            }
        }
    };
}

signature_type!(
    /// Layout version of a sent message's sealed signature.
    MessageSignatureType,
    "message_signature_type",
    Type20150924
);

signature_type!(
    /// Layout version of a message key signature.
    MessageKeySignatureType,
    "message_key_signature_type",
    Type20150923
);

signature_type!(
    /// Layout version of a wallet transfer's sealed signature.
    TransferSignatureType,
    "transfer_signature_type",
    Type20150929
);

signature_type!(
    /// Layout version of a wallet comment key signature.
    CommentKeySignatureType,
    "comment_key_signature_type",
    Type20150929
);

/// Append-only little-endian writer.
struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(160),
        }
    }

    fn id(&mut self, id: &ClientId) -> &mut Self {
        self.buf.extend_from_slice(&id.to_wire_bytes());
        self
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn flag(&mut self, value: bool) -> &mut Self {
        self.buf.push(u8::from(value));
        self
    }

    fn tag(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    fn hash_of(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&sha256(data));
        self
    }

    fn time(&mut self, value: WholeSeconds) -> &mut Self {
        self.i64(value.ticks())
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

/// A record reduced to the fields its signature covers.
#[derive(Debug, Clone, Copy)]
pub enum SignableRecord<'a> {
    MessageSend {
        message_id: ClientId,
        from: ClientId,
        to: ClientId,
        message_type: i32,
        body: &'a [u8],
        sent_time: WholeSeconds,
        message_key_id: ClientId,
        save_until: WholeSeconds,
        signature_type: MessageSignatureType,
    },
    MessageKey {
        key_id: ClientId,
        from: ClientId,
        to: ClientId,
        plain_key: &'a [u8],
        issued: WholeSeconds,
        valid_until: WholeSeconds,
        algorithm: KeyAlgorithm,
        signature_type: MessageKeySignatureType,
    },
    WalletTransfer {
        transfer_id: ClientId,
        sent_time: WholeSeconds,
        anonymous: bool,
        from: ClientId,
        to: ClientId,
        amount: i64,
        comment: &'a [u8],
        comment_key_id: ClientId,
        signature_type: TransferSignatureType,
    },
    CommentKey {
        key_id: ClientId,
        anonymous: bool,
        algorithm: KeyAlgorithm,
        from: ClientId,
        to: ClientId,
        plain_key: &'a [u8],
        issued: WholeSeconds,
        valid_until: WholeSeconds,
        signature_type: CommentKeySignatureType,
    },
}

impl SignableRecord<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageSend { .. } => "message_send",
            Self::MessageKey { .. } => "message_key",
            Self::WalletTransfer { .. } => "wallet_transfer",
            Self::CommentKey { .. } => "comment_key",
        }
    }

    /// Canonical bytes of the record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = CanonicalWriter::new();
        match *self {
            Self::MessageSend {
                message_id,
                from,
                to,
                message_type,
                body,
                sent_time,
                message_key_id,
                save_until,
                signature_type,
            } => {
                if signature_type.is_none() {
                    return Err(ProtocolError::unsupported("message_signature_type", 0u8));
                }
                w.id(&message_id)
                    .id(&from)
                    .id(&to)
                    .i32(message_type)
                    .hash_of(body)
                    .time(sent_time)
                    .id(&message_key_id)
                    .time(save_until)
                    .tag(signature_type.tag());
            }
            Self::MessageKey {
                key_id,
                from,
                to,
                plain_key,
                issued,
                valid_until,
                algorithm,
                signature_type,
            } => {
                if signature_type.is_none() {
                    return Err(ProtocolError::unsupported("message_key_signature_type", 0u8));
                }
                w.id(&key_id)
                    .id(&from)
                    .id(&to)
                    .hash_of(plain_key)
                    .time(issued)
                    .time(valid_until)
                    .tag(algorithm.tag())
                    .tag(signature_type.tag());
            }
            Self::WalletTransfer {
                transfer_id,
                sent_time,
                anonymous,
                from,
                to,
                amount,
                comment,
                comment_key_id,
                signature_type,
            } => {
                if signature_type.is_none() {
                    return Err(ProtocolError::unsupported("transfer_signature_type", 0u8));
                }
                if anonymous {
                    return Err(ProtocolError::rejected(
                        AdmissionRule::SignatureMode,
                        "anonymous",
                        "anonymous transfers are never signed",
                    ));
                }
                w.id(&transfer_id)
                    .time(sent_time)
                    .flag(anonymous)
                    .id(&from)
                    .id(&to)
                    .i64(amount)
                    .hash_of(comment)
                    .id(&comment_key_id)
                    .tag(signature_type.tag());
            }
            Self::CommentKey {
                key_id,
                anonymous,
                algorithm,
                from,
                to,
                plain_key,
                issued,
                valid_until,
                signature_type,
            } => {
                if signature_type.is_none() {
                    return Err(ProtocolError::unsupported("comment_key_signature_type", 0u8));
                }
                w.id(&key_id)
                    .flag(anonymous)
                    .tag(algorithm.tag())
                    .id(&from)
                    .id(&to)
                    .hash_of(plain_key)
                    .time(issued)
                    .time(valid_until)
                    .tag(signature_type.tag());
            }
        }
        Ok(w.finish())
    }

    /// SHA-256 of the canonical bytes. This is what gets signed or sealed.
    pub fn digest(&self) -> Result<Digest256> {
        Ok(sha256(&self.encode()?))
    }
}
