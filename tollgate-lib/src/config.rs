//! Per-service configuration: mask tables, limits and fee schedules.
//!
//! Nothing here is global. A [`ProtocolConfig`] is built for an
//! [`Environment`] (or loaded from JSON) and handed to the validators and
//! fee functions that need it.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::encryption::KeyAlgorithm;
use crate::errors::ProtocolError;
use crate::identifier::IdMask;
use crate::namespace::{ClientIdClass, NamespaceTable, WalletIdClass, CLIENTS_RESERVED};
use crate::time::AdmissionWindow;

/// Name of the variable [`Environment::from_env`] reads.
pub const ENVIRONMENT_VAR: &str = "TOLLGATE_ENV";

/// Deployment environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    Dev,
    /// Pre-production.
    Stage,
    /// Production.
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Stage => "stage",
            Self::Production => "production",
        }
    }

    /// Read the environment from `TOLLGATE_ENV`, defaulting to production.
    pub fn from_env() -> Result<Self, ProtocolError> {
        match std::env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Identifier range clients draw new message, key and transfer ids from.
    ///
    /// Environments use disjoint ranges so identifiers never collide
    /// across deployments.
    pub fn issuable_range(&self) -> IdMask {
        let prefix: u128 = match self {
            Self::Production => 0x01,
            Self::Stage => 0x02,
            Self::Dev => 0x03,
        };
        IdMask::new(0xFF00_0000_0000_0000_0000_0000_0000_0000, prefix << 120)
    }

    /// Default long-poll timeout for event subscriptions.
    pub fn event_timeout_secs(&self) -> u32 {
        match self {
            Self::Dev => 5,
            Self::Stage | Self::Production => 180,
        }
    }
}

impl FromStr for Environment {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "stage" => Ok(Self::Stage),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ProtocolError::InvalidConfig(format!(
                "unknown environment `{}`",
                other
            ))),
        }
    }
}

/// Linear coefficients of the message fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFeeSchedule {
    /// Charged once per message.
    pub const_fee: Decimal,
    /// Charged per hour retained, independent of size.
    pub const_fee_per_hour: Decimal,
    /// Charged per kilobyte per hour retained.
    pub fee_per_kb: Decimal,
    /// Multiplier applied to the hourly part.
    pub fee_per_hour: Decimal,
}

impl MessageFeeSchedule {
    /// Every coefficient must be non-negative.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        ensure_non_negative("message const_fee", self.const_fee)?;
        ensure_non_negative("message const_fee_per_hour", self.const_fee_per_hour)?;
        ensure_non_negative("message fee_per_kb", self.fee_per_kb)?;
        ensure_non_negative("message fee_per_hour", self.fee_per_hour)
    }
}

impl Default for MessageFeeSchedule {
    fn default() -> Self {
        Self {
            const_fee: dec!(0.01),
            const_fee_per_hour: dec!(0.01),
            fee_per_kb: dec!(0.1),
            fee_per_hour: dec!(0.1),
        }
    }
}

/// Coefficients of the wallet transfer fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFeeSchedule {
    /// Charged once per transfer.
    pub const_fee: i64,
    /// Fraction of the transferred total.
    pub fee_rate: Decimal,
    /// Charged per whole kilobyte of comments.
    pub fee_per_kb_comment: Decimal,
}

impl WalletFeeSchedule {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.const_fee < 0 {
            return Err(ProtocolError::InvalidConfig(
                "wallet const_fee must not be negative".to_string(),
            ));
        }
        ensure_non_negative("wallet fee_rate", self.fee_rate)?;
        ensure_non_negative("wallet fee_per_kb_comment", self.fee_per_kb_comment)
    }
}

impl Default for WalletFeeSchedule {
    fn default() -> Self {
        Self {
            const_fee: 1,
            fee_rate: dec!(0.0001),
            fee_per_kb_comment: dec!(1),
        }
    }
}

/// Deposit and withdrawal fees of one exchange currency.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCurrencyFees {
    pub deposit_const: Decimal,
    /// Percent of the deposited value, 0 to 100.
    pub deposit_percent: Decimal,
    pub withdraw_const: Decimal,
    /// Percent of the withdrawn value, 0 to 100.
    pub withdraw_percent: Decimal,
}

impl ExchangeCurrencyFees {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let percent = dec!(0)..=dec!(100);
        if !percent.contains(&self.deposit_percent) || !percent.contains(&self.withdraw_percent) {
            return Err(ProtocolError::InvalidConfig(
                "exchange fee percent must be within 0..=100".to_string(),
            ));
        }
        if self.deposit_const.is_sign_negative() || self.withdraw_const.is_sign_negative() {
            return Err(ProtocolError::InvalidConfig(
                "exchange constant fees must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_message_namespace() -> NamespaceTable<ClientIdClass> {
    NamespaceTable::message()
}

fn default_max_message_size() -> usize {
    64_000
}

fn default_max_retention_days() -> i64 {
    180
}

/// Longest retention a configuration may allow, in days.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

fn default_max_key_validity_months() -> u32 {
    1
}

fn default_max_unauthorized_fee() -> Decimal {
    dec!(1000)
}

fn default_message_peer_lookup() -> RangeInclusive<usize> {
    0..=20
}

fn default_message_page() -> RangeInclusive<usize> {
    1..=100
}

fn ensure_issuable_clients(range: &IdMask) -> Result<(), ProtocolError> {
    let pinned = range.equal.as_u128() & range.mask.as_u128() & CLIENTS_RESERVED.mask.as_u128();
    if !range.is_well_formed() || pinned == 0 {
        return Err(ProtocolError::InvalidConfig(format!(
            "issuable range {}/{} must pin a non-zero bit in the first four bytes",
            range.mask, range.equal
        )));
    }
    Ok(())
}

fn ensure_non_negative(name: &str, value: Decimal) -> Result<(), ProtocolError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ProtocolError::InvalidConfig(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }
    Ok(())
}

fn ensure_range(name: &str, range: &RangeInclusive<usize>) -> Result<(), ProtocolError> {
    if range.is_empty() {
        return Err(ProtocolError::InvalidConfig(format!("{} range is empty", name)));
    }
    Ok(())
}

/// Message service configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageServiceConfig {
    /// Classification table for message-service identifiers.
    #[serde(default = "default_message_namespace")]
    pub namespace: NamespaceTable<ClientIdClass>,

    /// Range new message and key ids must fall in. Filled from the
    /// environment when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuable: Option<IdMask>,

    #[serde(default)]
    pub window: AdmissionWindow,

    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Longest time a message may be kept, in days.
    #[serde(default = "default_max_retention_days")]
    pub max_retention_days: i64,

    #[serde(default = "default_max_key_validity_months")]
    pub max_key_validity_months: u32,

    /// Algorithm of message keys and of sealed message signatures.
    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,

    /// Ceiling of the fee a recipient may charge unauthorized senders.
    #[serde(default = "default_max_unauthorized_fee")]
    pub max_unauthorized_fee: Decimal,

    /// Allowed size of a peer certificate lookup.
    #[serde(default = "default_message_peer_lookup")]
    pub peer_lookup: RangeInclusive<usize>,

    /// Allowed page size of message listings.
    #[serde(default = "default_message_page")]
    pub page_size: RangeInclusive<usize>,

    #[serde(default)]
    pub fees: MessageFeeSchedule,
}

impl Default for MessageServiceConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl MessageServiceConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            namespace: NamespaceTable::message(),
            issuable: Some(environment.issuable_range()),
            window: AdmissionWindow::default(),
            max_message_size: default_max_message_size(),
            max_retention_days: default_max_retention_days(),
            max_key_validity_months: default_max_key_validity_months(),
            key_algorithm: KeyAlgorithm::default(),
            max_unauthorized_fee: default_max_unauthorized_fee(),
            peer_lookup: default_message_peer_lookup(),
            page_size: default_message_page(),
            fees: MessageFeeSchedule::default(),
        }
    }

    /// The configured issuable range, or production's.
    pub fn issuable_range(&self) -> IdMask {
        self.issuable
            .unwrap_or_else(|| Environment::default().issuable_range())
    }

    /// Set the issuable range.
    pub fn with_issuable(mut self, range: IdMask) -> Self {
        self.issuable = Some(range);
        self
    }

    /// Set the admission window.
    pub fn with_window(mut self, window: AdmissionWindow) -> Self {
        self.window = window;
        self
    }

    /// Set the maximum message body size.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the fee schedule.
    pub fn with_fees(mut self, fees: MessageFeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.namespace.validate()?;
        ensure_issuable_clients(&self.issuable_range())?;
        ensure_range("message peer lookup", &self.peer_lookup)?;
        ensure_range("message page size", &self.page_size)?;
        self.window.validate()?;
        if !(1..=MAX_RETENTION_DAYS).contains(&self.max_retention_days) {
            return Err(ProtocolError::InvalidConfig(format!(
                "message retention of {} days outside 1..={}",
                self.max_retention_days, MAX_RETENTION_DAYS
            )));
        }
        if self.max_key_validity_months == 0 {
            return Err(ProtocolError::InvalidConfig(
                "message key validity must be positive".to_string(),
            ));
        }
        if self.max_unauthorized_fee <= Decimal::ZERO {
            return Err(ProtocolError::InvalidConfig(
                "max unauthorized fee must be positive".to_string(),
            ));
        }
        self.fees.validate()
    }
}

fn default_wallet_namespace() -> NamespaceTable<WalletIdClass> {
    NamespaceTable::wallet()
}

fn default_max_comment_bytes() -> usize {
    64_256
}

fn default_max_transfer_amount() -> i64 {
    i64::from(i32::MAX)
}

fn default_max_transfers_per_request() -> usize {
    30
}

fn default_wallet_peer_lookup() -> RangeInclusive<usize> {
    1..=20
}

fn default_wallet_page() -> RangeInclusive<usize> {
    1..=200
}

fn default_include_filter() -> RangeInclusive<usize> {
    0..=100
}

/// Wallet service configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletServiceConfig {
    /// Classification table for wallet identifiers.
    #[serde(default = "default_wallet_namespace")]
    pub namespace: NamespaceTable<WalletIdClass>,

    /// Range new transfer and comment-key ids must fall in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuable: Option<IdMask>,

    #[serde(default)]
    pub window: AdmissionWindow,

    /// Largest comment payload, in bytes.
    #[serde(default = "default_max_comment_bytes")]
    pub max_comment_bytes: usize,

    #[serde(default = "default_max_transfer_amount")]
    pub max_transfer_amount: i64,

    #[serde(default = "default_max_transfers_per_request")]
    pub max_transfers_per_request: usize,

    #[serde(default = "default_max_key_validity_months")]
    pub max_key_validity_months: u32,

    #[serde(default)]
    pub key_algorithm: KeyAlgorithm,

    #[serde(default = "default_wallet_peer_lookup")]
    pub peer_lookup: RangeInclusive<usize>,

    /// Allowed page size of sent-transfer listings.
    #[serde(default = "default_wallet_page")]
    pub page_size: RangeInclusive<usize>,

    /// Allowed size of transfer id filters in listings.
    #[serde(default = "default_include_filter")]
    pub include_filter: RangeInclusive<usize>,

    #[serde(default)]
    pub fees: WalletFeeSchedule,
}

impl Default for WalletServiceConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl WalletServiceConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            namespace: NamespaceTable::wallet(),
            issuable: Some(environment.issuable_range()),
            window: AdmissionWindow::default(),
            max_comment_bytes: default_max_comment_bytes(),
            max_transfer_amount: default_max_transfer_amount(),
            max_transfers_per_request: default_max_transfers_per_request(),
            max_key_validity_months: default_max_key_validity_months(),
            key_algorithm: KeyAlgorithm::default(),
            peer_lookup: default_wallet_peer_lookup(),
            page_size: default_wallet_page(),
            include_filter: default_include_filter(),
            fees: WalletFeeSchedule::default(),
        }
    }

    pub fn issuable_range(&self) -> IdMask {
        self.issuable
            .unwrap_or_else(|| Environment::default().issuable_range())
    }

    /// Set the issuable range.
    pub fn with_issuable(mut self, range: IdMask) -> Self {
        self.issuable = Some(range);
        self
    }

    /// Set the admission window.
    pub fn with_window(mut self, window: AdmissionWindow) -> Self {
        self.window = window;
        self
    }

    /// Set the per-request transfer limit.
    pub fn with_max_transfers_per_request(mut self, count: usize) -> Self {
        self.max_transfers_per_request = count;
        self
    }

    /// Set the fee schedule.
    pub fn with_fees(mut self, fees: WalletFeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.namespace.validate()?;
        ensure_issuable_clients(&self.issuable_range())?;
        ensure_range("wallet peer lookup", &self.peer_lookup)?;
        ensure_range("wallet page size", &self.page_size)?;
        ensure_range("wallet include filter", &self.include_filter)?;
        self.window.validate()?;
        if self.max_transfer_amount <= 0 || self.max_transfers_per_request == 0 {
            return Err(ProtocolError::InvalidConfig(
                "transfer amount and count limits must be positive".to_string(),
            ));
        }
        self.fees.validate()
    }
}

fn default_exchange_namespace() -> NamespaceTable<ClientIdClass> {
    NamespaceTable::exchange()
}

fn default_max_security_code_len() -> usize {
    20
}

fn default_max_currency_code_len() -> usize {
    10
}

fn default_max_abs_currency_value() -> Decimal {
    dec!(1000000000000)
}

fn default_id_list() -> RangeInclusive<usize> {
    1..=100
}

/// Exchange service configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeServiceConfig {
    #[serde(default = "default_exchange_namespace")]
    pub namespace: NamespaceTable<ClientIdClass>,

    #[serde(default)]
    pub window: AdmissionWindow,

    #[serde(default = "default_max_security_code_len")]
    pub max_security_code_len: usize,

    #[serde(default = "default_max_currency_code_len")]
    pub max_currency_code_len: usize,

    /// Largest absolute price, deposit or withdrawal value.
    #[serde(default = "default_max_abs_currency_value")]
    pub max_abs_currency_value: Decimal,

    /// Allowed size of order, deposit and withdrawal id lookups.
    #[serde(default = "default_id_list")]
    pub id_list: RangeInclusive<usize>,

    /// Deposit and withdrawal fees by currency code.
    #[serde(default)]
    pub currency_fees: BTreeMap<String, ExchangeCurrencyFees>,
}

impl Default for ExchangeServiceConfig {
    fn default() -> Self {
        Self {
            namespace: NamespaceTable::exchange(),
            window: AdmissionWindow::default(),
            max_security_code_len: default_max_security_code_len(),
            max_currency_code_len: default_max_currency_code_len(),
            max_abs_currency_value: default_max_abs_currency_value(),
            id_list: default_id_list(),
            currency_fees: BTreeMap::new(),
        }
    }
}

impl ExchangeServiceConfig {
    /// Set the fees of one currency.
    pub fn with_currency_fees(mut self, currency_code: &str, fees: ExchangeCurrencyFees) -> Self {
        self.currency_fees.insert(currency_code.to_string(), fees);
        self
    }

    /// Fees of `currency_code`, if any are configured.
    pub fn fees_for(&self, currency_code: &str) -> Option<&ExchangeCurrencyFees> {
        self.currency_fees.get(currency_code)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.namespace.validate()?;
        ensure_range("exchange id list", &self.id_list)?;
        self.window.validate()?;
        if self.max_abs_currency_value <= Decimal::ZERO {
            return Err(ProtocolError::InvalidConfig(
                "max currency value must be positive".to_string(),
            ));
        }
        for (code, fees) in &self.currency_fees {
            if code.is_empty() || code.len() > self.max_currency_code_len {
                return Err(ProtocolError::InvalidConfig(format!(
                    "currency code `{}` must be 1..={} bytes",
                    code, self.max_currency_code_len
                )));
            }
            fees.validate().map_err(|e| {
                ProtocolError::InvalidConfig(format!("currency `{}`: {}", code, e))
            })?;
        }
        Ok(())
    }
}

/// Configuration of all three services for one environment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub message: MessageServiceConfig,
    #[serde(default)]
    pub wallet: WalletServiceConfig,
    #[serde(default)]
    pub exchange: ExchangeServiceConfig,
}

impl ProtocolConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            message: MessageServiceConfig::for_environment(environment),
            wallet: WalletServiceConfig::for_environment(environment),
            exchange: ExchangeServiceConfig::default(),
        }
    }

    /// Parse and validate a JSON configuration.
    ///
    /// Issuable ranges left out of the document default to the ranges of
    /// the document's environment.
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            environment: Environment,
            #[serde(default)]
            message: Option<MessageServiceConfig>,
            #[serde(default)]
            wallet: Option<WalletServiceConfig>,
            #[serde(default)]
            exchange: ExchangeServiceConfig,
        }

        let raw: Raw = serde_json::from_str(json)
            .map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
        let env = raw.environment;

        let mut message = raw
            .message
            .unwrap_or_else(|| MessageServiceConfig::for_environment(env));
        message.issuable.get_or_insert_with(|| env.issuable_range());

        let mut wallet = raw
            .wallet
            .unwrap_or_else(|| WalletServiceConfig::for_environment(env));
        wallet.issuable.get_or_insert_with(|| env.issuable_range());

        let config = Self {
            environment: env,
            message,
            wallet,
            exchange: raw.exchange,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        self.message.validate()?;
        self.wallet.validate()?;
        self.exchange.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ClientId;

    #[test]
    fn test_environment_parse() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!(" Stage ".parse::<Environment>().unwrap(), Environment::Stage);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
        assert_eq!(Environment::default(), Environment::Production);
    }

    #[test]
    fn test_issuable_ranges_are_disjoint_clients() {
        let table = NamespaceTable::message();
        for env in [Environment::Dev, Environment::Stage, Environment::Production] {
            let range = env.issuable_range();
            assert!(ensure_issuable_clients(&range).is_ok());
            assert_eq!(table.classify(&range.equal), ClientIdClass::Clients);
        }
        let dev = Environment::Dev.issuable_range();
        let prod = Environment::Production.issuable_range();
        assert!(!prod.matches(&dev.equal));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ProtocolConfig::for_environment(Environment::Stage);
        assert!(config.validate().is_ok());
        assert_eq!(config.message.max_message_size, 64_000);
        assert_eq!(config.wallet.max_transfer_amount, 2_147_483_647);
        assert_eq!(config.wallet.fees.const_fee, 1);
        assert_eq!(config.message.fees.fee_per_kb, dec!(0.1));
    }

    #[test]
    fn test_from_json_fills_environment_defaults() {
        let config = ProtocolConfig::from_json(
            r#"{"environment": "dev", "wallet": {"max_transfers_per_request": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.wallet.max_transfers_per_request, 5);
        assert_eq!(config.wallet.max_comment_bytes, 64_256);
        assert_eq!(config.wallet.issuable_range(), Environment::Dev.issuable_range());
        assert_eq!(config.message.issuable_range(), Environment::Dev.issuable_range());
    }

    #[test]
    fn test_from_json_rejects_reserved_issuable_range() {
        let json = format!(
            r#"{{"message": {{"issuable": {{"mask": "{}", "equal": "{}"}}}}}}"#,
            ClientId::from_u128(0xFFFF_FFFF << 96),
            ClientId::NIL
        );
        let err = ProtocolConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(_)));
    }

    fn rejected(json: &str) -> bool {
        matches!(
            ProtocolConfig::from_json(json),
            Err(ProtocolError::InvalidConfig(_))
        )
    }

    #[test]
    fn test_message_fee_coefficients_must_not_be_negative() {
        for coefficient in ["const_fee", "const_fee_per_hour", "fee_per_kb", "fee_per_hour"] {
            let mut fees = MessageFeeSchedule::default();
            match coefficient {
                "const_fee" => fees.const_fee = dec!(-0.01),
                "const_fee_per_hour" => fees.const_fee_per_hour = dec!(-0.01),
                "fee_per_kb" => fees.fee_per_kb = dec!(-1),
                _ => fees.fee_per_hour = dec!(-0.1),
            }
            assert!(fees.validate().is_err(), "{} accepted", coefficient);
            let config = MessageServiceConfig::default().with_fees(fees);
            assert!(config.validate().is_err(), "{} accepted", coefficient);
        }

        let free = MessageFeeSchedule {
            const_fee: Decimal::ZERO,
            const_fee_per_hour: Decimal::ZERO,
            fee_per_kb: Decimal::ZERO,
            fee_per_hour: Decimal::ZERO,
        };
        assert!(free.validate().is_ok());
    }

    #[test]
    fn test_wallet_fee_coefficients_must_not_be_negative() {
        let negative = [
            WalletFeeSchedule {
                const_fee: -1,
                ..Default::default()
            },
            WalletFeeSchedule {
                fee_rate: dec!(-0.0001),
                ..Default::default()
            },
            WalletFeeSchedule {
                fee_per_kb_comment: dec!(-1),
                ..Default::default()
            },
        ];
        for fees in negative {
            assert!(WalletServiceConfig::default().with_fees(fees).validate().is_err());
        }
    }

    #[test]
    fn test_from_json_rejects_negative_fees() {
        assert!(rejected(r#"{"message": {"fees": {
            "const_fee": "0.01", "const_fee_per_hour": "0.01",
            "fee_per_kb": "-1", "fee_per_hour": "0.1"}}}"#));
        assert!(rejected(r#"{"wallet": {"fees": {
            "const_fee": 1, "fee_rate": "0.0001", "fee_per_kb_comment": "-1"}}}"#));
        assert!(rejected(r#"{"exchange": {"currency_fees": {"BTM": {
            "deposit_const": "0", "deposit_percent": "-2",
            "withdraw_const": "0", "withdraw_percent": "1"}}}}"#));
        assert!(rejected(r#"{"exchange": {"currency_fees": {"BTM": {
            "deposit_const": "0", "deposit_percent": "2",
            "withdraw_const": "-5", "withdraw_percent": "1"}}}}"#));
    }

    #[test]
    fn test_from_json_rejects_bad_windows() {
        assert!(rejected(r#"{"message": {"window": {"before_secs": -1}}}"#));
        assert!(rejected(r#"{"wallet": {"window": {"after_secs": 9223372036854775807}}}"#));
        assert!(rejected(r#"{"exchange": {"window": {"before_secs": 86401}}}"#));
        assert!(ProtocolConfig::from_json(r#"{"message": {"window": {"before_secs": 0}}}"#).is_ok());
    }

    #[test]
    fn test_from_json_bounds_retention() {
        assert!(rejected(r#"{"message": {"max_retention_days": 0}}"#));
        assert!(rejected(r#"{"message": {"max_retention_days": 1000000000000000}}"#));
        assert!(rejected(r#"{"message": {"max_retention_days": 36501}}"#));
        let config =
            ProtocolConfig::from_json(r#"{"message": {"max_retention_days": 36500}}"#).unwrap();
        assert_eq!(config.message.max_retention_days, MAX_RETENTION_DAYS);
    }

    #[test]
    fn test_from_json_loads_currency_fees() {
        let config = ProtocolConfig::from_json(
            r#"{"exchange": {"currency_fees": {"BTM": {
                "deposit_const": "1", "deposit_percent": "0.5",
                "withdraw_const": "2", "withdraw_percent": "1"}}}}"#,
        )
        .unwrap();
        let fees = config.exchange.fees_for("BTM").unwrap();
        assert_eq!(fees.deposit_percent, dec!(0.5));
        assert!(config.exchange.fees_for("USD").is_none());

        let long_code = ExchangeServiceConfig::default()
            .with_currency_fees("LONGERTHANTEN", ExchangeCurrencyFees::default());
        assert!(long_code.validate().is_err());
    }

    #[test]
    fn test_exchange_fee_validation() {
        let mut fees = ExchangeCurrencyFees {
            deposit_percent: dec!(2.5),
            ..Default::default()
        };
        assert!(fees.validate().is_ok());
        fees.withdraw_percent = dec!(101);
        assert!(fees.validate().is_err());
    }
}
