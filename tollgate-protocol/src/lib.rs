//! # Tollgate Request Protocol
//!
//! Client-side authorization and fee metering for the message, wallet and
//! exchange services.
//!
//! - Canonical byte encoding of signed records, hashed with SHA-256
//! - Non-interactive key exchange with signed, time-bounded key records
//! - Admission rules every request passes before a service acts on it
//! - Fixed-point fee computation shared by clients and services
//!
//! Nothing here performs I/O. Time enters as an explicit `now` argument
//! and randomness only through key generation.

pub mod admission;
pub mod amount;
pub mod events;
pub mod exchange;
pub mod fee;
pub mod key_exchange;
pub mod message;
pub mod signing;
pub mod wallet;

pub use amount::Amount;
pub use events::{
    ClientEvent, ExchangeEvent, MessageEvent, SerializedClientEvent, SubscribeEventsRequest,
    WalletEvent,
};
pub use key_exchange::{
    CommentKeyRecord, KeyPolicy, KeyRecord, KeySignatureScheme, KeyValidity, MessageKeyRecord,
};
pub use message::SendMessageRequest;
pub use signing::{
    CommentKeySignatureType, Digest256, MessageKeySignatureType, MessageSignatureType,
    SignableRecord, TransferSignatureType,
};
pub use wallet::{SimpleTransferRequest, TransferToInfo};
