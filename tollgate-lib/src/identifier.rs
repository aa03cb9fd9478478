//! 128-bit client, wallet, key and transfer identifiers.
//!
//! Masks and equal-values are written in the textual GUID byte order, so a
//! mask of `FFFFFFFF-0000-0000-0000-000000000000` selects the first four
//! bytes as they appear when the identifier is printed. The canonical
//! signing form uses the mixed-endian 16-byte layout of
//! [`Uuid::to_bytes_le`].

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ProtocolError;

/// A 128-bit identifier for clients, wallets, keys, messages and transfers.
///
/// The class of an identifier is never stored; it is derived from the bit
/// pattern by a [`NamespaceTable`](crate::namespace::NamespaceTable).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// The empty placeholder identifier.
    pub const NIL: ClientId = ClientId(Uuid::nil());

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Raw 16-byte form written by the canonical signing codec.
    pub fn to_wire_bytes(&self) -> [u8; 16] {
        self.0.to_bytes_le()
    }

    pub fn from_wire_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes_le(bytes))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0.hyphenated())
    }
}

impl FromStr for ClientId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ProtocolError::malformed("client_id", e.to_string()))
    }
}

impl From<Uuid> for ClientId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A (mask, equal) pair. An identifier matches when `id & mask == equal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMask {
    pub mask: ClientId,
    pub equal: ClientId,
}

impl IdMask {
    pub const fn new(mask: u128, equal: u128) -> Self {
        Self {
            mask: ClientId::from_u128(mask),
            equal: ClientId::from_u128(equal),
        }
    }

    /// Matches exactly one identifier.
    pub const fn exact(value: u128) -> Self {
        Self::new(u128::MAX, value)
    }

    pub fn matches(&self, id: &ClientId) -> bool {
        id.as_u128() & self.mask.as_u128() == self.equal.as_u128()
    }

    /// An equal-value with bits outside the mask can never match anything.
    pub fn is_well_formed(&self) -> bool {
        self.equal.as_u128() & !self.mask.as_u128() == 0
    }

    /// Draw a fresh identifier that matches this mask.
    ///
    /// The random source is supplied by the caller so issuance stays
    /// reproducible in tests.
    pub fn generate<R: RngCore + ?Sized>(&self, rng: &mut R) -> ClientId {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let random = u128::from_be_bytes(bytes);
        let mask = self.mask.as_u128();
        ClientId::from_u128((random & !mask) | (self.equal.as_u128() & mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_textual_byte_order() {
        let id: ClientId = "01020304-0506-0708-090a-0b0c0d0e0f10".parse().unwrap();
        assert_eq!(id.as_u128(), 0x01020304_0506_0708_090a_0b0c0d0e0f10);
        assert_eq!(id.to_string(), "01020304-0506-0708-090a-0b0c0d0e0f10");
    }

    #[test]
    fn test_wire_bytes_use_guid_layout() {
        let id: ClientId = "01020304-0506-0708-090a-0b0c0d0e0f10".parse().unwrap();
        assert_eq!(
            hex::encode(id.to_wire_bytes()),
            "0403020106050807090a0b0c0d0e0f10"
        );
        assert_eq!(ClientId::from_wire_bytes(id.to_wire_bytes()), id);
    }

    #[test]
    fn test_mask_match() {
        let reserved = IdMask::new(0xFFFFFFFF_0000_0000_0000_000000000000, 0);
        assert!(reserved.matches(&ClientId::from_u128(0x00000000_1234_0000_0000_000000000001)));
        assert!(!reserved.matches(&ClientId::from_u128(0x00000001_0000_0000_0000_000000000000)));
        assert!(IdMask::exact(1).matches(&ClientId::from_u128(1)));
        assert!(!IdMask::exact(1).matches(&ClientId::from_u128(2)));
    }

    #[test]
    fn test_well_formed() {
        assert!(IdMask::new(0xFF00, 0x1200).is_well_formed());
        assert!(!IdMask::new(0xFF00, 0x1201).is_well_formed());
    }

    #[test]
    fn test_generate_stays_in_range() {
        let range = IdMask::new(0xFF000000_0000_0000_0000_000000000000, 0x01000000_0000_0000_0000_000000000000);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let id = range.generate(&mut rng);
            assert!(range.matches(&id));
            assert!(!id.is_nil());
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-guid".parse::<ClientId>().is_err());
    }
}
