//! Wallet service requests.
//!
//! Transfers are signed like messages: the canonical digest is sealed under
//! the comment key shared with the receiving wallet. Anonymous transfers and
//! transfers without a comment key are never signed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_lib::config::WalletServiceConfig;
use tollgate_lib::encryption::{check_sealed_digest, seal_digest};
use tollgate_lib::namespace::ANONYMOUS_WALLET;
use tollgate_lib::{
    AdmissionRule, ClientId, PublicCertificate, Result, SymmetricKey, WholeSeconds,
};

use crate::admission::{
    reject, require_count, require_distinct, require_id, require_in_range, require_in_window,
    require_issuable, require_max_len, require_ordered, require_signature_mode,
    require_whole_seconds,
};
use crate::amount::Amount;
use crate::fee::{ensure_within_limit, wallet_fee};
use crate::key_exchange::{CommentKeyRecord, KeyPolicy};
use crate::signing::{SignableRecord, TransferSignatureType};

/// Bytes an invoice reserves in the comment for the payer's own data.
pub const INVOICE_COMMENT_RESERVE: usize = 32;

/// One transfer of a simple transfer request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToInfo {
    pub transfer_id: ClientId,
    pub to: ClientId,
    pub amount: i64,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default, with = "serde_bytes")]
    pub comment: Vec<u8>,
    /// Key the comment is encrypted with, or nil.
    #[serde(default)]
    pub comment_key_id: ClientId,
    #[serde(default)]
    pub signature_type: TransferSignatureType,
    #[serde(default, with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl TransferToInfo {
    pub fn new(transfer_id: ClientId, to: ClientId, amount: i64) -> Self {
        Self {
            transfer_id,
            to,
            amount,
            anonymous: false,
            comment: Vec::new(),
            comment_key_id: ClientId::NIL,
            signature_type: TransferSignatureType::None,
            sealed_signature: Vec::new(),
        }
    }

    /// Attach a comment encrypted under `comment_key_id`.
    pub fn with_comment(mut self, comment: Vec<u8>, comment_key_id: ClientId) -> Self {
        self.comment = comment;
        self.comment_key_id = comment_key_id;
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Whether admission expects a sealed signature on this transfer.
    pub fn expects_signature(&self) -> bool {
        !self.anonymous && !self.comment_key_id.is_nil()
    }

    pub fn signable(&self, from: ClientId, sent_time: DateTime<Utc>) -> SignableRecord<'_> {
        SignableRecord::WalletTransfer {
            transfer_id: self.transfer_id,
            sent_time: WholeSeconds::round(sent_time),
            anonymous: self.anonymous,
            from,
            to: self.to,
            amount: self.amount,
            comment: &self.comment,
            comment_key_id: self.comment_key_id,
            signature_type: self.signature_type,
        }
    }

    /// Seal the canonical digest under the comment key.
    pub fn seal_signature(
        &mut self,
        from: ClientId,
        sent_time: DateTime<Utc>,
        key: &SymmetricKey,
    ) -> Result<()> {
        if !self.expects_signature() {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "sealed_signature",
                "only non-anonymous transfers with a comment key are signed",
            ));
        }
        self.signature_type = TransferSignatureType::CURRENT;
        let digest = self.signable(from, sent_time).digest()?;
        self.sealed_signature = seal_digest(key, &digest)?;
        Ok(())
    }

    /// `Ok(false)` for unsigned transfers and for seals that do not match.
    pub fn check_signature(
        &self,
        from: ClientId,
        sent_time: DateTime<Utc>,
        key: &SymmetricKey,
    ) -> Result<bool> {
        if self.signature_type.is_none() || self.anonymous {
            return Ok(false);
        }
        let digest = self.signable(from, sent_time).digest()?;
        let valid = check_sealed_digest(key, &digest, &self.sealed_signature)?;
        if !valid {
            tracing::warn!(transfer_id = %self.transfer_id, "sealed transfer signature mismatch");
        }
        Ok(valid)
    }

    /// Admit one transfer. Times are checked on the enclosing request.
    pub fn validate(&self, config: &WalletServiceConfig) -> Result<()> {
        require_id("transfer_id", &self.transfer_id)?;
        require_id("to", &self.to)?;

        require_issuable("transfer_id", &self.transfer_id, &config.issuable_range())?;
        let class = config.namespace.classify(&self.to);
        if !class.accepts_simple_transfer() {
            return Err(reject(
                AdmissionRule::IdentifierNamespace,
                "to",
                format!("{:?} wallets do not accept simple transfers", class),
            ));
        }

        require_in_range("amount", &self.amount, 1..=config.max_transfer_amount)?;
        require_max_len("comment", self.comment.len(), config.max_comment_bytes)?;

        require_signature_mode(
            "sealed_signature",
            self.expects_signature(),
            self.signature_type.is_none(),
            self.signature_type == TransferSignatureType::CURRENT,
            self.sealed_signature.len(),
            config.key_algorithm.sealed_digest_len(),
        )
    }

    /// Check the comment key this transfer refers to.
    pub fn check_comment_key(
        &self,
        key: &CommentKeyRecord,
        from: ClientId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if key.key_id != self.comment_key_id {
            return Err(reject(
                AdmissionRule::KeyMismatch,
                "comment_key_id",
                format!("key {} is not {}", key.key_id, self.comment_key_id),
            ));
        }
        if key.author != from || key.recipient != self.to {
            return Err(reject(
                AdmissionRule::KeyMismatch,
                "comment_key_id",
                "key was not issued for this sender and recipient",
            ));
        }
        if key.anonymous != self.anonymous {
            return Err(reject(
                AdmissionRule::AnonymityMismatch,
                "comment_key_id",
                format!(
                    "key anonymous={} but transfer anonymous={}",
                    key.anonymous, self.anonymous
                ),
            ));
        }
        key.ensure_usable_at("comment_key_id", now)
    }
}

/// One or more transfers from the calling wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleTransferRequest {
    pub request_id: ClientId,
    pub transfers: Vec<TransferToInfo>,
    pub sent_time: DateTime<Utc>,
    /// Highest fee, in whole units, the sender accepts to pay.
    pub max_fee: i64,
}

impl SimpleTransferRequest {
    pub fn new(request_id: ClientId, transfers: Vec<TransferToInfo>, now: DateTime<Utc>) -> Self {
        Self {
            request_id,
            transfers,
            sent_time: WholeSeconds::round(now).as_datetime(),
            max_fee: 0,
        }
    }

    pub fn with_max_fee(mut self, max_fee: i64) -> Self {
        self.max_fee = max_fee;
        self
    }

    /// Seal every transfer that expects a signature.
    pub fn seal_signatures(&mut self, from: ClientId, key: &SymmetricKey) -> Result<()> {
        let sent_time = self.sent_time;
        for transfer in self.transfers.iter_mut().filter(|t| t.expects_signature()) {
            transfer.seal_signature(from, sent_time, key)?;
        }
        Ok(())
    }

    pub fn validate_at(&self, config: &WalletServiceConfig, now: DateTime<Utc>) -> Result<()> {
        require_id("request_id", &self.request_id)?;
        require_count(
            "transfers",
            self.transfers.len(),
            &(1..=config.max_transfers_per_request),
        )?;
        let transfer_ids: Vec<ClientId> = self.transfers.iter().map(|t| t.transfer_id).collect();
        require_distinct("transfers", &transfer_ids)?;

        // Per-transfer rules run before the request's sent_time rules, matching the wire order.
        for transfer in &self.transfers {
            transfer.validate(config)?;
        }

        require_whole_seconds("sent_time", &self.sent_time)?;
        require_in_window("sent_time", &self.sent_time, &config.window, now)?;
        require_in_range("max_fee", &self.max_fee, 0..=i64::from(i32::MAX))
    }

    pub fn total_amount(&self) -> i64 {
        self.transfers
            .iter()
            .fold(0i64, |sum, t| sum.saturating_add(t.amount))
    }

    pub fn total_comment_bytes(&self) -> usize {
        self.transfers.iter().map(|t| t.comment.len()).sum()
    }

    pub fn fee(&self, config: &WalletServiceConfig) -> Amount {
        wallet_fee(
            &config.fees,
            self.transfers.len(),
            self.total_amount(),
            self.total_comment_bytes(),
        )
    }

    /// Fee of this request, failing when it is above `max_fee`.
    pub fn ensure_fee_within_limit(&self, config: &WalletServiceConfig) -> Result<Amount> {
        let fee = self.fee(config);
        ensure_within_limit(fee, Amount::from_units(self.max_fee))?;
        Ok(fee)
    }
}

/// A processed transfer as listed back to the sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentTransferInfo {
    pub transfer_id: ClientId,
    pub request_id: ClientId,
    pub to: ClientId,
    pub amount: i64,
    /// Share of the request fee charged for this transfer.
    pub fee: i64,
    #[serde(with = "serde_bytes")]
    pub comment: Vec<u8>,
    pub comment_key_id: ClientId,
    pub sent_time: DateTime<Utc>,
    pub anonymous: bool,
    pub signature_type: TransferSignatureType,
    #[serde(with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl SentTransferInfo {
    pub fn as_transfer(&self) -> TransferToInfo {
        TransferToInfo {
            transfer_id: self.transfer_id,
            to: self.to,
            amount: self.amount,
            anonymous: self.anonymous,
            comment: self.comment.clone(),
            comment_key_id: self.comment_key_id,
            signature_type: self.signature_type,
            sealed_signature: self.sealed_signature.clone(),
        }
    }

    pub fn check_signature(&self, from: ClientId, key: &SymmetricKey) -> Result<bool> {
        self.as_transfer().check_signature(from, self.sent_time, key)
    }
}

/// A transfer as delivered to the receiving wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingTransferInfo {
    pub transfer_id: ClientId,
    /// Sender, or the anonymous wallet for anonymous transfers.
    pub from: ClientId,
    pub amount: i64,
    #[serde(with = "serde_bytes")]
    pub comment: Vec<u8>,
    pub comment_key_id: ClientId,
    pub sent_time: DateTime<Utc>,
    pub anonymous: bool,
    pub signature_type: TransferSignatureType,
    #[serde(with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl IncomingTransferInfo {
    /// Delivery view of `transfer` sent by `from` at `sent_time`.
    ///
    /// Anonymous transfers are attributed to [`ANONYMOUS_WALLET`] and lose
    /// any signature.
    pub fn delivered(transfer: &TransferToInfo, from: ClientId, sent_time: DateTime<Utc>) -> Self {
        let anonymous = transfer.anonymous;
        Self {
            transfer_id: transfer.transfer_id,
            from: if anonymous { ANONYMOUS_WALLET } else { from },
            amount: transfer.amount,
            comment: transfer.comment.clone(),
            comment_key_id: transfer.comment_key_id,
            sent_time,
            anonymous,
            signature_type: if anonymous {
                TransferSignatureType::None
            } else {
                transfer.signature_type
            },
            sealed_signature: if anonymous {
                Vec::new()
            } else {
                transfer.sealed_signature.clone()
            },
        }
    }

    pub fn as_transfer(&self, to: ClientId) -> TransferToInfo {
        TransferToInfo {
            transfer_id: self.transfer_id,
            to,
            amount: self.amount,
            anonymous: self.anonymous,
            comment: self.comment.clone(),
            comment_key_id: self.comment_key_id,
            signature_type: self.signature_type,
            sealed_signature: self.sealed_signature.clone(),
        }
    }

    pub fn check_signature(&self, to: ClientId, key: &SymmetricKey) -> Result<bool> {
        self.as_transfer(to)
            .check_signature(self.from, self.sent_time, key)
    }
}

/// Publish a new comment key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommentKeyRequest {
    pub request_id: ClientId,
    pub key: CommentKeyRecord,
}

impl NewCommentKeyRequest {
    pub fn validate_at<P: PublicCertificate>(
        &self,
        config: &WalletServiceConfig,
        author: &P,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require_id("request_id", &self.request_id)?;
        self.key.validate_at(&KeyPolicy::from(config), author, now)
    }
}

fn default_sent_limit() -> usize {
    100
}

/// Page through sent transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentTransfersQuery {
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
    #[serde(default)]
    pub to: Option<ClientId>,
    #[serde(default)]
    pub last_known_transfer: Option<ClientId>,
    #[serde(default = "default_sent_limit")]
    pub limit: usize,
    /// Restrict the listing to these transfers.
    #[serde(default)]
    pub include_only: Vec<ClientId>,
}

impl Default for SentTransfersQuery {
    fn default() -> Self {
        Self {
            from_time: DateTime::<Utc>::MIN_UTC,
            to_time: DateTime::<Utc>::MAX_UTC,
            to: None,
            last_known_transfer: None,
            limit: default_sent_limit(),
            include_only: Vec::new(),
        }
    }
}

impl SentTransfersQuery {
    pub fn validate(&self, config: &WalletServiceConfig) -> Result<()> {
        require_ordered("to_time", &self.from_time, &self.to_time)?;
        require_in_range("limit", &self.limit, config.page_size.clone())?;
        require_distinct("include_only", &self.include_only)?;
        require_count("include_only", self.include_only.len(), &config.include_filter)
    }
}

fn default_buffer_count() -> usize {
    100
}

/// Long-poll subscription to incoming transfers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingTransfersSubscription {
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,
    #[serde(default)]
    pub last_known_transfer: Option<ClientId>,
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
    #[serde(default)]
    pub include_only: Vec<ClientId>,
}

impl Default for IncomingTransfersSubscription {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            last_known_transfer: None,
            from_time: DateTime::<Utc>::MIN_UTC,
            to_time: DateTime::<Utc>::MAX_UTC,
            include_only: Vec::new(),
        }
    }
}

impl IncomingTransfersSubscription {
    pub fn validate(&self, config: &WalletServiceConfig) -> Result<()> {
        require_in_range("buffer_count", &self.buffer_count, 1..=100)?;
        require_ordered("to_time", &self.from_time, &self.to_time)?;
        require_count("include_only", self.include_only.len(), &config.include_filter)?;
        require_distinct("include_only", &self.include_only)
    }
}

/// A payment request a wallet hands to a payer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub to: ClientId,
    #[serde(with = "serde_bytes")]
    pub comment: Vec<u8>,
    pub amount: i64,
    #[serde(default)]
    pub force_anonymous: bool,
}

impl InvoiceData {
    pub fn validate(&self, config: &WalletServiceConfig) -> Result<()> {
        require_max_len(
            "comment",
            self.comment.len() + INVOICE_COMMENT_RESERVE,
            config.max_comment_bytes,
        )?;
        require_in_range("amount", &self.amount, 1..=config.max_transfer_amount)
    }

    /// The transfer paying this invoice.
    pub fn to_transfer(&self, transfer_id: ClientId) -> TransferToInfo {
        let transfer = TransferToInfo {
            comment: self.comment.clone(),
            ..TransferToInfo::new(transfer_id, self.to, self.amount)
        };
        if self.force_anonymous {
            transfer.anonymous()
        } else {
            transfer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_lib::namespace::{EMISSION, FEES_WALLET};
    use tollgate_lib::test_utils::{fixed_now, IdSource};

    fn rule(result: Result<()>) -> AdmissionRule {
        result.unwrap_err().admission_rule().unwrap()
    }

    #[test]
    fn test_signed_transfer_roundtrip() {
        let mut ids = IdSource::production(21);
        let config = WalletServiceConfig::default();
        let (from, to) = (ids.next_id(), ids.next_id());
        let key = SymmetricKey::generate();

        let transfer = TransferToInfo::new(ids.next_id(), to, 500)
            .with_comment(b"rent".to_vec(), ids.next_id());
        let mut request = SimpleTransferRequest::new(ids.next_id(), vec![transfer], fixed_now())
            .with_max_fee(10);
        request.seal_signatures(from, &key).unwrap();

        assert!(request.validate_at(&config, fixed_now()).is_ok());
        let sealed = &request.transfers[0];
        assert!(sealed.check_signature(from, request.sent_time, &key).unwrap());

        let incoming = IncomingTransferInfo::delivered(sealed, from, request.sent_time);
        assert_eq!(incoming.from, from);
        assert!(incoming.check_signature(to, &key).unwrap());
    }

    #[test]
    fn test_anonymous_delivery_hides_sender() {
        let mut ids = IdSource::production(22);
        let transfer = TransferToInfo::new(ids.next_id(), ids.next_id(), 5).anonymous();
        let incoming = IncomingTransferInfo::delivered(&transfer, ids.next_id(), fixed_now());
        assert_eq!(incoming.from, ANONYMOUS_WALLET);
        assert!(incoming.signature_type.is_none());
        assert!(incoming.sealed_signature.is_empty());
    }

    #[test]
    fn test_anonymous_transfer_cannot_be_sealed() {
        let mut ids = IdSource::production(23);
        let mut transfer = TransferToInfo::new(ids.next_id(), ids.next_id(), 5)
            .with_comment(b"x".to_vec(), ids.next_id())
            .anonymous();
        let err = transfer
            .seal_signature(ids.next_id(), fixed_now(), &SymmetricKey::generate())
            .unwrap_err();
        assert_eq!(err.admission_rule(), Some(AdmissionRule::SignatureMode));
    }

    #[test]
    fn test_transfer_destination_classes() {
        let mut ids = IdSource::production(24);
        let config = WalletServiceConfig::default();
        let emission = ClientId::from_u128(EMISSION.equal.as_u128() | 7);
        for to in [FEES_WALLET, ANONYMOUS_WALLET, emission] {
            let transfer = TransferToInfo::new(ids.next_id(), to, 5);
            let result = transfer.validate(&config);
            let expected = if to.is_nil() {
                AdmissionRule::RequiredIdentifier
            } else {
                AdmissionRule::IdentifierNamespace
            };
            assert_eq!(rule(result), expected);
        }
        // system wallets still accept simple transfers
        let system = ClientId::from_u128(0x1234);
        assert!(TransferToInfo::new(ids.next_id(), system, 5).validate(&config).is_ok());
    }

    #[test]
    fn test_transfer_rules() {
        let mut ids = IdSource::production(25);
        let config = WalletServiceConfig::default();
        let base = TransferToInfo::new(ids.next_id(), ids.next_id(), 5);

        let mut bad = base.clone();
        bad.amount = 0;
        assert_eq!(rule(bad.validate(&config)), AdmissionRule::ValueRange);

        let mut bad = base.clone();
        bad.amount = config.max_transfer_amount + 1;
        assert_eq!(rule(bad.validate(&config)), AdmissionRule::ValueRange);

        let mut bad = base.clone();
        bad.comment = vec![0; config.max_comment_bytes + 1];
        assert_eq!(rule(bad.validate(&config)), AdmissionRule::PayloadSize);

        let mut bad = base.clone();
        bad.transfer_id = ClientId::from_u128(0x55 << 120);
        assert_eq!(rule(bad.validate(&config)), AdmissionRule::IdentifierNamespace);

        let mut bad = base.anonymous();
        bad.sealed_signature = vec![1; 60];
        assert_eq!(rule(bad.validate(&config)), AdmissionRule::SignatureMode);
    }

    #[test]
    fn test_request_rules() {
        let mut ids = IdSource::production(26);
        let config = WalletServiceConfig::default();
        let now = fixed_now();
        let transfer = TransferToInfo::new(ids.next_id(), ids.next_id(), 5);

        let request = SimpleTransferRequest::new(ids.next_id(), vec![], now);
        assert_eq!(rule(request.validate_at(&config, now)), AdmissionRule::CountRange);

        let request = SimpleTransferRequest::new(
            ids.next_id(),
            vec![transfer.clone(), transfer.clone()],
            now,
        );
        assert_eq!(rule(request.validate_at(&config, now)), AdmissionRule::DuplicateEntries);

        let mut request = SimpleTransferRequest::new(ids.next_id(), vec![transfer.clone()], now);
        request.sent_time = now - chrono::Duration::seconds(301);
        assert_eq!(rule(request.validate_at(&config, now)), AdmissionRule::TimeWindow);

        let request = SimpleTransferRequest::new(ids.next_id(), vec![transfer], now).with_max_fee(-1);
        assert_eq!(rule(request.validate_at(&config, now)), AdmissionRule::ValueRange);
    }

    #[test]
    fn test_transfer_rules_precede_sent_time() {
        let mut ids = IdSource::production(28);
        let config = WalletServiceConfig::default();
        let now = fixed_now();
        let transfer = TransferToInfo::new(ids.next_id(), ids.next_id(), 0);

        let mut request = SimpleTransferRequest::new(ids.next_id(), vec![transfer], now);
        request.sent_time = now - chrono::Duration::seconds(301);
        assert_eq!(rule(request.validate_at(&config, now)), AdmissionRule::ValueRange);
    }

    #[test]
    fn test_request_fee() {
        let mut ids = IdSource::production(27);
        let config = WalletServiceConfig::default();
        let transfers = vec![
            TransferToInfo::new(ids.next_id(), ids.next_id(), 600_000).with_comment(vec![0; 2000], ClientId::NIL),
            TransferToInfo::new(ids.next_id(), ids.next_id(), 400_000).with_comment(vec![0; 1000], ClientId::NIL),
        ];
        let request = SimpleTransferRequest::new(ids.next_id(), transfers, fixed_now());
        assert_eq!(request.fee(&config).as_units(), 104);
        assert!(request.ensure_fee_within_limit(&config).is_err());
        assert!(request.with_max_fee(104).ensure_fee_within_limit(&config).is_ok());
    }

    #[test]
    fn test_sent_transfers_query() {
        let config = WalletServiceConfig::default();
        assert!(SentTransfersQuery::default().validate(&config).is_ok());

        let id = ClientId::from_u128(3);
        let query = SentTransfersQuery {
            include_only: vec![id, id],
            ..Default::default()
        };
        assert_eq!(rule(query.validate(&config)), AdmissionRule::DuplicateEntries);

        let query = SentTransfersQuery {
            limit: 201,
            ..Default::default()
        };
        assert_eq!(rule(query.validate(&config)), AdmissionRule::ValueRange);

        let query = IncomingTransfersSubscription {
            include_only: (0..101u128).map(ClientId::from_u128).collect(),
            ..Default::default()
        };
        assert_eq!(rule(query.validate(&config)), AdmissionRule::CountRange);
    }

    #[test]
    fn test_invoice_reserves_comment_space() {
        let config = WalletServiceConfig::default();
        let mut invoice = InvoiceData {
            to: ClientId::from_u128((0x01 << 120) | 9),
            comment: vec![0; config.max_comment_bytes - INVOICE_COMMENT_RESERVE],
            amount: 10,
            force_anonymous: true,
        };
        assert!(invoice.validate(&config).is_ok());
        assert!(invoice.to_transfer(ClientId::from_u128(1)).anonymous);

        invoice.comment.push(0);
        assert_eq!(rule(invoice.validate(&config)), AdmissionRule::PayloadSize);
        invoice.comment.pop();
        invoice.amount = 0;
        assert_eq!(rule(invoice.validate(&config)), AdmissionRule::ValueRange);
    }
}
