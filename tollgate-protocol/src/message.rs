//! Message service requests.
//!
//! A message is signed by sealing its canonical digest under the message
//! key shared with the recipient. Messages sent without a key carry no
//! signature at all.

use std::ops::RangeInclusive;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tollgate_lib::config::MessageServiceConfig;
use tollgate_lib::encryption::{check_sealed_digest, seal_digest};
use tollgate_lib::{
    AdmissionRule, ClientId, ProtocolError, PublicCertificate, Result, SymmetricKey, WholeSeconds,
};

use crate::admission::{
    reject, require_addressable, require_before, require_count, require_distinct, require_id,
    require_in_range, require_in_window, require_issuable, require_max_len, require_ordered,
    require_signature_mode, require_span, require_whole_seconds,
};
use crate::amount::Amount;
use crate::fee::{ensure_within_limit, message_fee_with_surcharge};
use crate::key_exchange::{KeyPolicy, MessageKeyRecord};
use crate::signing::{MessageSignatureType, SignableRecord};

/// Message type of plain UTF-8 text.
pub const MESSAGE_TYPE_UTF8_TEXT: i32 = 0;

#[allow(clippy::too_many_arguments)]
fn message_signable<'a>(
    message_id: ClientId,
    from: ClientId,
    to: ClientId,
    message_type: i32,
    body: &'a [u8],
    sent_time: DateTime<Utc>,
    message_key_id: ClientId,
    save_until: DateTime<Utc>,
    signature_type: MessageSignatureType,
) -> SignableRecord<'a> {
    SignableRecord::MessageSend {
        message_id,
        from,
        to,
        message_type,
        body,
        sent_time: WholeSeconds::round(sent_time),
        message_key_id,
        save_until: WholeSeconds::round(save_until),
        signature_type,
    }
}

fn check_message_seal(
    record: SignableRecord<'_>,
    signature_type: MessageSignatureType,
    sealed: &[u8],
    key: &SymmetricKey,
) -> Result<bool> {
    if signature_type.is_none() {
        return Ok(false);
    }
    let digest = record.digest()?;
    let valid = check_sealed_digest(key, &digest, sealed)?;
    if !valid {
        tracing::warn!(kind = record.kind(), "sealed message signature mismatch");
    }
    Ok(valid)
}

/// A message on its way to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub request_id: ClientId,
    pub message_id: ClientId,
    pub to: ClientId,
    pub message_type: i32,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    /// Key the signature is sealed under, or nil for unsigned messages.
    pub message_key_id: ClientId,
    pub sent_time: DateTime<Utc>,
    pub save_until: DateTime<Utc>,
    /// Highest fee the sender accepts to pay.
    pub max_fee: Amount,
    pub signature_type: MessageSignatureType,
    #[serde(with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl SendMessageRequest {
    /// An unsigned text message sent at `now` and kept for `keep_for`.
    /// Both timestamps are truncated to the second.
    pub fn new(
        request_id: ClientId,
        message_id: ClientId,
        to: ClientId,
        body: Vec<u8>,
        now: DateTime<Utc>,
        keep_for: Duration,
    ) -> Self {
        Self {
            request_id,
            message_id,
            to,
            message_type: MESSAGE_TYPE_UTF8_TEXT,
            body,
            message_key_id: ClientId::NIL,
            sent_time: WholeSeconds::round(now).as_datetime(),
            save_until: WholeSeconds::round(now + keep_for).as_datetime(),
            max_fee: Amount::zero(),
            signature_type: MessageSignatureType::None,
            sealed_signature: Vec::new(),
        }
    }

    pub fn with_message_type(mut self, message_type: i32) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_max_fee(mut self, max_fee: Amount) -> Self {
        self.max_fee = max_fee;
        self
    }

    /// Canonical record as seen from sender `from`.
    pub fn signable(&self, from: ClientId) -> SignableRecord<'_> {
        message_signable(
            self.message_id,
            from,
            self.to,
            self.message_type,
            &self.body,
            self.sent_time,
            self.message_key_id,
            self.save_until,
            self.signature_type,
        )
    }

    /// Sign with the shared key `key_id` by sealing the canonical digest.
    pub fn seal_signature(
        &mut self,
        from: ClientId,
        key_id: ClientId,
        key: &SymmetricKey,
    ) -> Result<()> {
        if key_id.is_nil() {
            return Err(reject(
                AdmissionRule::SignatureMode,
                "message_key_id",
                "a sealed signature needs a message key",
            ));
        }
        self.message_key_id = key_id;
        self.signature_type = MessageSignatureType::CURRENT;
        let digest = self.signable(from).digest()?;
        self.sealed_signature = seal_digest(key, &digest)?;
        Ok(())
    }

    /// `Ok(false)` for unsigned messages and for seals that do not match.
    pub fn check_signature(&self, from: ClientId, key: &SymmetricKey) -> Result<bool> {
        check_message_seal(
            self.signable(from),
            self.signature_type,
            &self.sealed_signature,
            key,
        )
    }

    /// Admit the request at `now`.
    pub fn validate_at(&self, config: &MessageServiceConfig, now: DateTime<Utc>) -> Result<()> {
        require_id("request_id", &self.request_id)?;
        require_id("message_id", &self.message_id)?;
        require_id("to", &self.to)?;

        require_issuable("message_id", &self.message_id, &config.issuable_range())?;
        require_addressable("to", &self.to, &config.namespace)?;

        require_max_len("body", self.body.len(), config.max_message_size)?;
        require_in_range("max_fee", &self.max_fee.as_decimal(), Decimal::ZERO..=Decimal::MAX)?;

        require_whole_seconds("sent_time", &self.sent_time)?;
        require_whole_seconds("save_until", &self.save_until)?;

        require_in_window("sent_time", &self.sent_time, &config.window, now)?;

        require_before("save_until", &self.sent_time, &self.save_until)?;
        let max_retention = Duration::try_days(config.max_retention_days).ok_or_else(|| {
            ProtocolError::InvalidConfig(format!(
                "retention of {} days is out of range",
                config.max_retention_days
            ))
        })?;
        require_span("save_until", &self.sent_time, &self.save_until, max_retention)?;

        require_signature_mode(
            "sealed_signature",
            !self.message_key_id.is_nil(),
            self.signature_type.is_none(),
            self.signature_type == MessageSignatureType::CURRENT,
            self.sealed_signature.len(),
            config.key_algorithm.sealed_digest_len(),
        )
    }

    /// Check the message key this request is sealed under.
    pub fn check_key(&self, key: &MessageKeyRecord, from: ClientId, now: DateTime<Utc>) -> Result<()> {
        if key.key_id != self.message_key_id {
            return Err(reject(
                AdmissionRule::KeyMismatch,
                "message_key_id",
                format!("key {} is not {}", key.key_id, self.message_key_id),
            ));
        }
        if key.author != from || key.recipient != self.to {
            return Err(reject(
                AdmissionRule::KeyMismatch,
                "message_key_id",
                "key was not issued for this sender and recipient",
            ));
        }
        key.ensure_usable_at("message_key_id", now)
    }

    /// Storage fee of this message, without any unauthorized-sender charge.
    pub fn fee(&self, config: &MessageServiceConfig) -> Amount {
        self.fee_with_surcharge(config, None)
    }

    pub fn fee_with_surcharge(
        &self,
        config: &MessageServiceConfig,
        unauthorized_fee: Option<Amount>,
    ) -> Amount {
        message_fee_with_surcharge(
            &config.fees,
            self.body.len(),
            self.save_until - self.sent_time,
            unauthorized_fee,
        )
    }

    /// Fee of this message, failing when it is above `max_fee`.
    pub fn ensure_fee_within_limit(
        &self,
        config: &MessageServiceConfig,
        unauthorized_fee: Option<Amount>,
    ) -> Result<Amount> {
        let fee = self.fee_with_surcharge(config, unauthorized_fee);
        ensure_within_limit(fee, self.max_fee)?;
        Ok(fee)
    }
}

/// A sent message as listed back to its sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessageInfo {
    pub message_id: ClientId,
    pub to: ClientId,
    pub message_type: i32,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    pub message_key_id: ClientId,
    pub sent_time: DateTime<Utc>,
    pub save_until: DateTime<Utc>,
    pub signature_type: MessageSignatureType,
    #[serde(with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl SentMessageInfo {
    pub fn check_signature(&self, from: ClientId, key: &SymmetricKey) -> Result<bool> {
        let record = message_signable(
            self.message_id,
            from,
            self.to,
            self.message_type,
            &self.body,
            self.sent_time,
            self.message_key_id,
            self.save_until,
            self.signature_type,
        );
        check_message_seal(record, self.signature_type, &self.sealed_signature, key)
    }
}

impl From<&SendMessageRequest> for SentMessageInfo {
    fn from(request: &SendMessageRequest) -> Self {
        Self {
            message_id: request.message_id,
            to: request.to,
            message_type: request.message_type,
            body: request.body.clone(),
            message_key_id: request.message_key_id,
            sent_time: request.sent_time,
            save_until: request.save_until,
            signature_type: request.signature_type,
            sealed_signature: request.sealed_signature.clone(),
        }
    }
}

/// A message as delivered to its recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessageInfo {
    pub message_id: ClientId,
    pub from: ClientId,
    pub message_type: i32,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    pub message_key_id: ClientId,
    pub sent_time: DateTime<Utc>,
    pub save_until: DateTime<Utc>,
    pub signature_type: MessageSignatureType,
    #[serde(with = "serde_bytes")]
    pub sealed_signature: Vec<u8>,
}

impl IncomingMessageInfo {
    /// Delivery view of `request` sent by `from`.
    pub fn delivered(request: &SendMessageRequest, from: ClientId) -> Self {
        Self {
            message_id: request.message_id,
            from,
            message_type: request.message_type,
            body: request.body.clone(),
            message_key_id: request.message_key_id,
            sent_time: request.sent_time,
            save_until: request.save_until,
            signature_type: request.signature_type,
            sealed_signature: request.sealed_signature.clone(),
        }
    }

    pub fn check_signature(&self, to: ClientId, key: &SymmetricKey) -> Result<bool> {
        let record = message_signable(
            self.message_id,
            self.from,
            to,
            self.message_type,
            &self.body,
            self.sent_time,
            self.message_key_id,
            self.save_until,
            self.signature_type,
        );
        check_message_seal(record, self.signature_type, &self.sealed_signature, key)
    }
}

/// Publish a new message key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessageKeyRequest {
    pub request_id: ClientId,
    pub key: MessageKeyRecord,
}

impl NewMessageKeyRequest {
    pub fn validate_at<P: PublicCertificate>(
        &self,
        config: &MessageServiceConfig,
        author: &P,
        now: DateTime<Utc>,
    ) -> Result<()> {
        require_id("request_id", &self.request_id)?;
        self.key.validate_at(&KeyPolicy::from(config), author, now)
    }
}

/// Certificate lookup for a list of peers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCertificatesRequest {
    pub peers: Vec<ClientId>,
}

impl PeerCertificatesRequest {
    pub fn validate(&self, allowed: &RangeInclusive<usize>) -> Result<()> {
        require_count("peers", self.peers.len(), allowed)?;
        require_distinct("peers", &self.peers)
    }
}

fn default_sent_page() -> usize {
    100
}

fn default_incoming_page() -> usize {
    30
}

/// Page through sent messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessagesQuery {
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
    #[serde(default)]
    pub to: Option<ClientId>,
    #[serde(default)]
    pub last_known_message: Option<ClientId>,
    #[serde(default = "default_sent_page")]
    pub page_size: usize,
    #[serde(default)]
    pub message_type: Option<i32>,
}

impl Default for SentMessagesQuery {
    fn default() -> Self {
        Self {
            from_time: DateTime::<Utc>::MIN_UTC,
            to_time: DateTime::<Utc>::MAX_UTC,
            to: None,
            last_known_message: None,
            page_size: default_sent_page(),
            message_type: None,
        }
    }
}

impl SentMessagesQuery {
    pub fn validate(&self, config: &MessageServiceConfig) -> Result<()> {
        require_in_range("page_size", &self.page_size, config.page_size.clone())?;
        require_ordered("to_time", &self.from_time, &self.to_time)
    }
}

/// Page through received messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessagesQuery {
    pub from_time: DateTime<Utc>,
    pub to_time: DateTime<Utc>,
    #[serde(default)]
    pub from: Option<ClientId>,
    #[serde(default)]
    pub last_known_message: Option<ClientId>,
    #[serde(default = "default_incoming_page")]
    pub page_size: usize,
    #[serde(default)]
    pub message_type: Option<i32>,
}

impl Default for IncomingMessagesQuery {
    fn default() -> Self {
        Self {
            from_time: DateTime::<Utc>::MIN_UTC,
            to_time: DateTime::<Utc>::MAX_UTC,
            from: None,
            last_known_message: None,
            page_size: default_incoming_page(),
            message_type: None,
        }
    }
}

impl IncomingMessagesQuery {
    pub fn validate(&self, config: &MessageServiceConfig) -> Result<()> {
        require_in_range("page_size", &self.page_size, config.page_size.clone())?;
        require_ordered("to_time", &self.from_time, &self.to_time)
    }
}

/// Per-client settings kept by the message service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageClientSettings {
    /// Token unauthorized senders must present.
    pub auth_id: ClientId,
    /// Charged to senders the client has not authorized.
    pub unauthorized_fee: Amount,
    pub auto_renew_auth_id: bool,
}

impl MessageClientSettings {
    pub fn new(auth_id: ClientId) -> Self {
        Self {
            auth_id,
            unauthorized_fee: Amount::from_units(100),
            auto_renew_auth_id: true,
        }
    }

    /// The unauthorized fee must be positive and at most the service ceiling.
    pub fn validate(&self, config: &MessageServiceConfig) -> Result<()> {
        let fee = self.unauthorized_fee.as_decimal();
        if fee <= Decimal::ZERO || fee > config.max_unauthorized_fee {
            return Err(reject(
                AdmissionRule::ValueRange,
                "unauthorized_fee",
                format!("{} not within (0, {}]", fee, config.max_unauthorized_fee),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_lib::test_utils::{fixed_now, IdSource};
    use tollgate_lib::AdmissionWindow;

    fn request(ids: &mut IdSource) -> SendMessageRequest {
        SendMessageRequest::new(
            ids.next_id(),
            ids.next_id(),
            ids.next_id(),
            b"hello".to_vec(),
            fixed_now(),
            Duration::hours(10),
        )
        .with_max_fee(Amount::from_units(1))
    }

    fn rule(result: Result<()>) -> AdmissionRule {
        result.unwrap_err().admission_rule().unwrap()
    }

    #[test]
    fn test_unsigned_message_is_admitted() {
        let mut ids = IdSource::production(1);
        let config = MessageServiceConfig::default();
        let req = request(&mut ids);
        assert!(req.validate_at(&config, fixed_now()).is_ok());
        assert!(!req.check_signature(ids.next_id(), &SymmetricKey::generate()).unwrap());
    }

    #[test]
    fn test_sealed_signature_roundtrip() {
        let mut ids = IdSource::production(2);
        let config = MessageServiceConfig::default();
        let from = ids.next_id();
        let key = SymmetricKey::generate();
        let mut req = request(&mut ids);
        req.seal_signature(from, ids.next_id(), &key).unwrap();

        assert_eq!(req.sealed_signature.len(), config.key_algorithm.sealed_digest_len());
        assert!(req.validate_at(&config, fixed_now()).is_ok());
        assert!(req.check_signature(from, &key).unwrap());
        assert!(!req.check_signature(ids.next_id(), &key).unwrap());

        let sent = SentMessageInfo::from(&req);
        assert!(sent.check_signature(from, &key).unwrap());
        let incoming = IncomingMessageInfo::delivered(&req, from);
        assert!(incoming.check_signature(req.to, &key).unwrap());
    }

    #[test]
    fn test_validation_rules() {
        let mut ids = IdSource::production(3);
        let config = MessageServiceConfig::default();
        let now = fixed_now();
        let base = request(&mut ids);

        let mut bad = base.clone();
        bad.to = ClientId::NIL;
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::RequiredIdentifier);

        let mut bad = base.clone();
        bad.message_id = ClientId::from_u128(0x42 << 120);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::IdentifierNamespace);

        let mut bad = base.clone();
        bad.to = ClientId::from_u128(1 << 64);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::IdentifierNamespace);

        let mut bad = base.clone();
        bad.body = vec![0; config.max_message_size + 1];
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::PayloadSize);

        let mut bad = base.clone();
        bad.max_fee = Amount::from_units(-1);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::ValueRange);

        let mut bad = base.clone();
        bad.sent_time += Duration::nanoseconds(1);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::TimestampPrecision);

        let mut bad = base.clone();
        bad.sent_time -= Duration::minutes(6);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::TimeWindow);

        let mut bad = base.clone();
        bad.save_until = bad.sent_time;
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::TimestampOrdering);

        let mut bad = base.clone();
        bad.save_until = bad.sent_time + Duration::days(181);
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::SpanLimit);

        let mut bad = base.clone();
        bad.sealed_signature = vec![0; 60];
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::SignatureMode);

        let mut bad = base;
        bad.message_key_id = ids.next_id();
        assert_eq!(rule(bad.validate_at(&config, now)), AdmissionRule::SignatureMode);
    }

    #[test]
    fn test_out_of_range_config_is_an_error() {
        let mut ids = IdSource::production(5);
        let req = request(&mut ids);

        let mut config = MessageServiceConfig::default();
        config.max_retention_days = 1_000_000_000_000_000;
        assert!(matches!(
            req.validate_at(&config, fixed_now()),
            Err(ProtocolError::InvalidConfig(_))
        ));

        let config = MessageServiceConfig::default().with_window(AdmissionWindow {
            before_secs: i64::MAX,
            after_secs: -1,
        });
        assert!(config.validate().is_err());
        assert_eq!(
            rule(req.validate_at(&config, fixed_now())),
            AdmissionRule::TimeWindow
        );
    }

    #[test]
    fn test_system_recipients_are_addressable() {
        let mut ids = IdSource::production(6);
        let mut req = request(&mut ids);
        req.to = ClientId::from_u128(0x1234);
        assert!(req.validate_at(&MessageServiceConfig::default(), fixed_now()).is_ok());
    }

    #[test]
    fn test_fee_limit() {
        let mut ids = IdSource::production(4);
        let config = MessageServiceConfig::default();
        let mut req = request(&mut ids);
        req.body = vec![0; 1024];
        // 0.01 + (0.01 + 0.1) * 10 * 0.1
        assert_eq!(req.fee(&config), Amount::from_str_checked("0.12").unwrap());
        assert!(req.ensure_fee_within_limit(&config, None).is_ok());
        assert!(req
            .ensure_fee_within_limit(&config, Some(Amount::from_units(5)))
            .is_err());
    }

    #[test]
    fn test_listing_queries() {
        let config = MessageServiceConfig::default();
        assert!(SentMessagesQuery::default().validate(&config).is_ok());
        assert!(IncomingMessagesQuery::default().validate(&config).is_ok());

        let query = SentMessagesQuery {
            page_size: 0,
            ..Default::default()
        };
        assert_eq!(rule(query.validate(&config)), AdmissionRule::ValueRange);

        let query = IncomingMessagesQuery {
            from_time: fixed_now(),
            to_time: fixed_now() - Duration::seconds(1),
            ..Default::default()
        };
        assert_eq!(rule(query.validate(&config)), AdmissionRule::TimestampOrdering);
    }

    #[test]
    fn test_peer_lookup_allows_empty_list() {
        let config = MessageServiceConfig::default();
        let mut ids = IdSource::production(5);
        assert!(PeerCertificatesRequest::default().validate(&config.peer_lookup).is_ok());

        let peer = ids.next_id();
        let request = PeerCertificatesRequest {
            peers: vec![peer, peer],
        };
        assert_eq!(rule(request.validate(&config.peer_lookup)), AdmissionRule::DuplicateEntries);

        let request = PeerCertificatesRequest {
            peers: (0..21).map(|_| ids.next_id()).collect(),
        };
        assert_eq!(rule(request.validate(&config.peer_lookup)), AdmissionRule::CountRange);
    }

    #[test]
    fn test_client_settings_fee_bounds() {
        let config = MessageServiceConfig::default();
        let mut settings = MessageClientSettings::new(ClientId::from_u128(9));
        assert!(settings.validate(&config).is_ok());
        settings.unauthorized_fee = Amount::zero();
        assert_eq!(rule(settings.validate(&config)), AdmissionRule::ValueRange);
        settings.unauthorized_fee = Amount::from_units(1000);
        assert!(settings.validate(&config).is_ok());
        settings.unauthorized_fee = Amount::from_str_checked("1000.01").unwrap();
        assert_eq!(rule(settings.validate(&config)), AdmissionRule::ValueRange);
    }
}
