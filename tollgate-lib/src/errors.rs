//! Error types for Tollgate operations.
//!
//! Every fallible operation in the protocol core reports one of the kinds
//! in [`ProtocolError`]. Admission failures additionally name the rule that
//! rejected the request so callers can map them onto their own responses.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error codes for FFI and service integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ProtocolErrorCode {
    /// Input could not be parsed or is structurally unusable
    MalformedInput = 1000,
    /// A request failed admission
    AdmissionRejected = 2000,
    /// A signature or sealed digest did not verify
    SignatureVerificationFailed = 3000,
    /// An unknown signature, algorithm or event tag was met
    UnsupportedProtocolVersion = 4000,
    /// The computed fee is above the caller's declared maximum
    FeeExceedsCallerLimit = 5000,
    /// A certificate or sealing primitive failed
    CryptoCapability = 6000,
    /// Configuration is inconsistent
    InvalidConfig = 7000,
}

/// Admission rules, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRule {
    /// A required identifier is the empty placeholder.
    RequiredIdentifier,
    /// An identifier is outside the range or class its field allows.
    IdentifierNamespace,
    /// A payload or ciphertext has the wrong size.
    PayloadSize,
    /// A numeric value is outside its permitted range.
    ValueRange,
    /// A timestamp carries sub-second precision.
    TimestampPrecision,
    /// A timestamp is outside the admission window around now.
    TimeWindow,
    /// Two timestamps are in the wrong order.
    TimestampOrdering,
    /// A timestamp pair spans more than allowed.
    SpanLimit,
    /// A collection holds duplicate entries.
    DuplicateEntries,
    /// A collection has too few or too many entries.
    CountRange,
    /// Signature presence, type tag or length disagrees with the request.
    SignatureMode,
    /// A referenced key does not belong to this request.
    KeyMismatch,
    /// A referenced key is past its validity.
    ExpiredKey,
    /// The anonymity of a key and the request using it differ.
    AnonymityMismatch,
}

impl AdmissionRule {
    /// Stable snake_case name used in logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequiredIdentifier => "required_identifier",
            Self::IdentifierNamespace => "identifier_namespace",
            Self::PayloadSize => "payload_size",
            Self::ValueRange => "value_range",
            Self::TimestampPrecision => "timestamp_precision",
            Self::TimeWindow => "time_window",
            Self::TimestampOrdering => "timestamp_ordering",
            Self::SpanLimit => "span_limit",
            Self::DuplicateEntries => "duplicate_entries",
            Self::CountRange => "count_range",
            Self::SignatureMode => "signature_mode",
            Self::KeyMismatch => "key_mismatch",
            Self::ExpiredKey => "expired_key",
            Self::AnonymityMismatch => "anonymity_mismatch",
        }
    }
}

impl fmt::Display for AdmissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rejected admission rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{rule} violated by `{field}`: {detail}")]
pub struct AdmissionViolation {
    pub rule: AdmissionRule,
    pub field: &'static str,
    pub detail: String,
}

impl AdmissionViolation {
    pub fn new(rule: AdmissionRule, field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            rule,
            field,
            detail: detail.into(),
        }
    }
}

/// Failures of the certificate and sealing primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptFailed(String),
    #[error("Decryption failed: {0}")]
    DecryptFailed(String),
    #[error("Invalid ciphertext format")]
    InvalidFormat,
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("Signing failed: {0}")]
    SignFailed(String),
}

/// Comprehensive error type for Tollgate operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Input could not be interpreted.
    MalformedInput {
        /// Field or parameter name
        field: &'static str,
        /// Reason for rejection
        reason: String,
    },

    /// A request failed one admission rule.
    Admission(AdmissionViolation),

    /// Signature did not verify.
    SignatureVerificationFailed {
        /// What was being verified
        subject: &'static str,
    },

    /// Unknown signature-type, algorithm or event tag.
    UnsupportedProtocolVersion {
        /// Name of the tag
        tag: &'static str,
        /// Raw value met on the wire
        value: i64,
    },

    /// Fee is above the caller's ceiling.
    FeeExceedsCallerLimit {
        /// Computed fee
        fee: Decimal,
        /// Caller's declared maximum
        limit: Decimal,
    },

    /// Certificate or sealing primitive failure.
    Crypto(CryptoError),

    /// Configuration is inconsistent.
    InvalidConfig(String),
}

impl ProtocolError {
    /// Get the error code for FFI/service integration.
    pub fn code(&self) -> ProtocolErrorCode {
        match self {
            Self::MalformedInput { .. } => ProtocolErrorCode::MalformedInput,
            Self::Admission(_) => ProtocolErrorCode::AdmissionRejected,
            Self::SignatureVerificationFailed { .. } => {
                ProtocolErrorCode::SignatureVerificationFailed
            }
            Self::UnsupportedProtocolVersion { .. } => {
                ProtocolErrorCode::UnsupportedProtocolVersion
            }
            Self::FeeExceedsCallerLimit { .. } => ProtocolErrorCode::FeeExceedsCallerLimit,
            Self::Crypto(_) => ProtocolErrorCode::CryptoCapability,
            Self::InvalidConfig(_) => ProtocolErrorCode::InvalidConfig,
        }
    }

    /// The admission rule that rejected the request, if any.
    pub fn admission_rule(&self) -> Option<AdmissionRule> {
        match self {
            Self::Admission(violation) => Some(violation.rule),
            _ => None,
        }
    }

    /// Create a malformed input error.
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field,
            reason: reason.into(),
        }
    }

    /// Create an admission error.
    pub fn rejected(rule: AdmissionRule, field: &'static str, detail: impl Into<String>) -> Self {
        Self::Admission(AdmissionViolation::new(rule, field, detail))
    }

    /// Create an unsupported tag error.
    pub fn unsupported(tag: &'static str, value: impl Into<i64>) -> Self {
        Self::UnsupportedProtocolVersion {
            tag,
            value: value.into(),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput { field, reason } => write!(f, "malformed {}: {}", field, reason),
            Self::Admission(violation) => write!(f, "request rejected: {}", violation),
            Self::SignatureVerificationFailed { subject } => {
                write!(f, "signature verification failed for {}", subject)
            }
            Self::UnsupportedProtocolVersion { tag, value } => {
                write!(f, "unsupported {} value {}", tag, value)
            }
            Self::FeeExceedsCallerLimit { fee, limit } => {
                write!(f, "fee {} exceeds caller limit {}", fee, limit)
            }
            Self::Crypto(err) => write!(f, "crypto error: {}", err),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Admission(violation) => Some(violation),
            Self::Crypto(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AdmissionViolation> for ProtocolError {
    fn from(violation: AdmissionViolation) -> Self {
        Self::Admission(violation)
    }
}

impl From<CryptoError> for ProtocolError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err)
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInput {
            field: "json",
            reason: err.to_string(),
        }
    }
}
