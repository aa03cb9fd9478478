//! Per-service identifier classification.
//!
//! A [`NamespaceTable`] is an ordered list of [`MaskRule`]s with a fallback
//! class. Classification walks the rules in order and returns the first
//! match, so the most restrictive class must come first. The default
//! tables below are part of the wire contract and match bit-for-bit what
//! peers use.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;
use crate::identifier::{ClientId, IdMask};

/// Mask of the system-reserved block: first 10 bytes zero.
pub const SYSTEM_USED: IdMask = IdMask::new(0xFFFFFFFF_FFFF_FFFF_FFFF_000000000000, 0);

/// Mask of the client-reserved block: first 4 bytes zero.
pub const CLIENTS_RESERVED: IdMask = IdMask::new(0xFFFFFFFF_0000_0000_0000_000000000000, 0);

/// The fee-collecting wallet.
pub const FEES_WALLET: ClientId = ClientId::NIL;

/// The singleton wallet anonymous transfers are attributed to.
pub const ANONYMOUS_WALLET: ClientId = ClientId::from_u128(1);

/// Emission wallets: `00000000-0000-0000-0000-0Exxxxxxxxxx`.
pub const EMISSION: IdMask = IdMask::new(
    0xFFFFFFFF_FFFF_FFFF_FFFF_FF0000000000,
    0x00000000_0000_0000_0000_0E0000000000,
);

/// Classes for message and exchange identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientIdClass {
    SystemUsed,
    ClientsReserved,
    Clients,
}

impl ClientIdClass {
    /// Whether requests may name this class as a peer or account.
    ///
    /// The client-reserved block is never issued, so nothing there can
    /// receive.
    pub fn is_addressable(&self) -> bool {
        matches!(self, Self::Clients | Self::SystemUsed)
    }
}

/// Classes for wallet identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletIdClass {
    Fees,
    AnonymousClient,
    Emission,
    SystemUsed,
    ClientsReserved,
    Clients,
}

impl WalletIdClass {
    /// Whether a plain client-to-client transfer may target this class.
    pub fn accepts_simple_transfer(&self) -> bool {
        matches!(self, Self::Clients | Self::SystemUsed)
    }
}

/// One entry of a classification table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRule<C> {
    pub class: C,
    #[serde(flatten)]
    pub mask: IdMask,
}

impl<C> MaskRule<C> {
    pub const fn new(class: C, mask: IdMask) -> Self {
        Self { class, mask }
    }
}

/// Ordered mask table with a fallback class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceTable<C> {
    rules: Vec<MaskRule<C>>,
    fallback: C,
}

impl<C: Copy + PartialEq> NamespaceTable<C> {
    pub fn new(rules: Vec<MaskRule<C>>, fallback: C) -> Self {
        Self { rules, fallback }
    }

    /// Classify an identifier. Total and side-effect free.
    pub fn classify(&self, id: &ClientId) -> C {
        self.rules
            .iter()
            .find(|rule| rule.mask.matches(id))
            .map(|rule| rule.class)
            .unwrap_or(self.fallback)
    }

    pub fn rules(&self) -> &[MaskRule<C>] {
        &self.rules
    }

    pub fn fallback(&self) -> C {
        self.fallback
    }

    /// Reject tables with rules that can never match.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        for rule in &self.rules {
            if !rule.mask.is_well_formed() {
                return Err(ProtocolError::InvalidConfig(format!(
                    "mask rule {} has equal-value bits outside its mask",
                    rule.mask.mask
                )));
            }
        }
        Ok(())
    }
}

impl NamespaceTable<ClientIdClass> {
    /// Message-service table.
    pub fn message() -> Self {
        Self::new(
            vec![
                MaskRule::new(ClientIdClass::SystemUsed, SYSTEM_USED),
                MaskRule::new(ClientIdClass::ClientsReserved, CLIENTS_RESERVED),
            ],
            ClientIdClass::Clients,
        )
    }

    /// Exchange-service table. Exchange identifiers share the message layout.
    pub fn exchange() -> Self {
        Self::message()
    }
}

impl NamespaceTable<WalletIdClass> {
    /// Wallet-service table.
    pub fn wallet() -> Self {
        Self::new(
            vec![
                MaskRule::new(WalletIdClass::Fees, IdMask::exact(FEES_WALLET.as_u128())),
                MaskRule::new(
                    WalletIdClass::AnonymousClient,
                    IdMask::exact(ANONYMOUS_WALLET.as_u128()),
                ),
                MaskRule::new(WalletIdClass::Emission, EMISSION),
                MaskRule::new(WalletIdClass::SystemUsed, SYSTEM_USED),
                MaskRule::new(WalletIdClass::ClientsReserved, CLIENTS_RESERVED),
            ],
            WalletIdClass::Clients,
        )
    }
}
