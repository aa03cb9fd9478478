//! Tollgate shared library.
//!
//! Everything the request protocol builds on but that carries no request
//! semantics of its own: identifier classification, certificates, sealing,
//! second-granular time, errors and per-service configuration.
//!
//! # Example
//!
//! ```
//! use tollgate_lib::namespace::{ClientIdClass, NamespaceTable};
//! use tollgate_lib::ClientId;
//!
//! let table = NamespaceTable::message();
//! let id: ClientId = "00000000-0000-0000-0000-00000000002a".parse().unwrap();
//! assert_eq!(table.classify(&id), ClientIdClass::SystemUsed);
//! ```

pub mod certificate;
pub mod config;
pub mod encryption;
pub mod errors;
pub mod identifier;
pub mod namespace;
pub mod time;

/// Test fixtures.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use certificate::{
    CertSignature, LightCertificate, PrivateCertificate, PrivateLightCertificate,
    PublicCertificate,
};
pub use config::{Environment, ProtocolConfig};
pub use encryption::{KeyAlgorithm, SymmetricKey};
pub use errors::{AdmissionRule, AdmissionViolation, CryptoError, ProtocolError, ProtocolErrorCode};
pub use identifier::{ClientId, IdMask};
pub use time::{AdmissionWindow, Clock, FixedClock, SystemClock, WholeSeconds};

/// Common result alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
