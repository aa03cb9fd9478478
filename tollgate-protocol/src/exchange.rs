//! Exchange service requests.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tollgate_lib::config::{ExchangeCurrencyFees, ExchangeServiceConfig};
use tollgate_lib::{AdmissionRule, ClientId, ProtocolError, Result};

use crate::admission::{
    reject, require_addressable, require_code, require_count, require_distinct, require_id,
    require_in_range,
};
use crate::amount::Amount;
use crate::fee::{deposit_fee, withdraw_fee};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Place an order on one security.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub request_id: ClientId,
    pub side: OrderSide,
    pub security_code: String,
    pub price: Decimal,
    pub qty: i64,
    /// Account in the security's base currency.
    pub base_account: ClientId,
    /// Account in the second currency of the pair.
    pub second_account: ClientId,
}

impl NewOrderRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_id("request_id", &self.request_id)?;
        require_id("base_account", &self.base_account)?;
        require_id("second_account", &self.second_account)?;
        require_addressable("base_account", &self.base_account, &config.namespace)?;
        require_addressable("second_account", &self.second_account, &config.namespace)?;

        require_code("security_code", &self.security_code, config.max_security_code_len)?;
        positive_value("price", self.price, config.max_abs_currency_value)?;
        require_in_range("qty", &self.qty, 1..=i64::MAX)
    }
}

fn positive_value(field: &'static str, value: Decimal, max: Decimal) -> Result<()> {
    if value <= Decimal::ZERO || value > max {
        return Err(reject(
            AdmissionRule::ValueRange,
            field,
            format!("{} not within (0, {}]", value, max),
        ));
    }
    Ok(())
}

/// Open an account in one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccountRequest {
    pub account_id: ClientId,
    pub currency_code: String,
}

impl NewAccountRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_id("account_id", &self.account_id)?;
        require_addressable("account_id", &self.account_id, &config.namespace)?;
        require_code("currency_code", &self.currency_code, config.max_currency_code_len)
    }
}

/// Look up orders, deposits, withdrawals or locked funds by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdListRequest {
    pub ids: Vec<ClientId>,
}

impl IdListRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_count("ids", self.ids.len(), &config.id_list)?;
        require_distinct("ids", &self.ids)
    }
}

/// Depth-of-market lookup for a list of securities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDepthRequest {
    pub security_codes: Vec<String>,
}

impl MarketDepthRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_count("security_codes", self.security_codes.len(), &config.id_list)?;
        require_distinct("security_codes", &self.security_codes)?;
        for code in &self.security_codes {
            require_code("security_codes", code, config.max_security_code_len)?;
        }
        Ok(())
    }
}

/// Deposit a positive value into an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDepositRequest {
    pub request_id: ClientId,
    pub account: ClientId,
    pub value: Decimal,
}

impl CreateDepositRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_id("account", &self.account)?;
        require_id("request_id", &self.request_id)?;
        require_addressable("account", &self.account, &config.namespace)?;
        positive_value("value", self.value, config.max_abs_currency_value)
    }

    pub fn fee(&self, fees: &ExchangeCurrencyFees) -> Amount {
        deposit_fee(fees, self.value)
    }
}

/// Kind of value one payment detail entry holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PaymentDetailValue {
    Text(String),
    Id(ClientId),
    Decimal(Decimal),
    Integer(i64),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
}

/// One named field of the withdrawal destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetailEntry {
    pub key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub value: PaymentDetailValue,
}

fn default_enabled() -> bool {
    true
}

/// Where a withdrawal should be paid out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub description: String,
    pub entries: Vec<PaymentDetailEntry>,
}

impl PaymentDetails {
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if entry.key.trim().is_empty() {
                return Err(ProtocolError::malformed(
                    "payment_details",
                    "entry key must not be blank",
                ));
            }
            if !seen.insert(entry.key.as_str()) {
                return Err(reject(
                    AdmissionRule::DuplicateEntries,
                    "payment_details",
                    format!("key `{}` appears more than once", entry.key),
                ));
            }
        }
        Ok(())
    }
}

/// Withdraw from an account. The value is negative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWithdrawRequest {
    pub request_id: ClientId,
    pub account: ClientId,
    pub value: Decimal,
    pub payment_details: PaymentDetails,
}

impl CreateWithdrawRequest {
    pub fn validate(&self, config: &ExchangeServiceConfig) -> Result<()> {
        require_id("account", &self.account)?;
        require_id("request_id", &self.request_id)?;
        require_addressable("account", &self.account, &config.namespace)?;
        if self.value >= Decimal::ZERO || self.value.abs() > config.max_abs_currency_value {
            return Err(reject(
                AdmissionRule::ValueRange,
                "value",
                format!(
                    "{} not within [-{}, 0)",
                    self.value, config.max_abs_currency_value
                ),
            ));
        }
        self.payment_details.validate()
    }

    pub fn fee(&self, fees: &ExchangeCurrencyFees) -> Amount {
        withdraw_fee(fees, self.value)
    }
}
