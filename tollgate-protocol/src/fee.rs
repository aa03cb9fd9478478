//! Fee metering.
//!
//! Pure functions from payload size, retention and operation count to a
//! fee. Clients use them to bound what they accept to pay, services use the
//! same functions to charge, so both sides must agree to the last digit.

use chrono::Duration;
use rust_decimal::Decimal;
use tollgate_lib::config::{ExchangeCurrencyFees, MessageFeeSchedule, WalletFeeSchedule};
use tollgate_lib::{ProtocolError, Result};

use crate::amount::Amount;

const BYTES_PER_KB: i64 = 1024;
const SECONDS_PER_HOUR: i64 = 3600;

fn mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or(Decimal::MAX)
}

fn add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or(Decimal::MAX)
}

/// Fee for storing a message of `body_len` bytes for `retention`.
///
/// `const + (const_per_hour + per_kb * size / 1024) * hours * per_hour`,
/// where hours is the absolute retention. The size term is the exact
/// `size / 1024`, not rounded up to whole kilobytes, as deployed services
/// charge it. Division by the hour length is done last so the only
/// rounding is Decimal's final one.
pub fn message_fee(schedule: &MessageFeeSchedule, body_len: usize, retention: Duration) -> Amount {
    let size = Decimal::from(body_len as u64);
    let seconds = Decimal::from(retention.num_seconds().unsigned_abs());

    let per_size = mul(schedule.fee_per_kb, size) / Decimal::from(BYTES_PER_KB);
    let hourly = add(schedule.const_fee_per_hour, per_size);
    let retained =
        mul(mul(hourly, seconds), schedule.fee_per_hour) / Decimal::from(SECONDS_PER_HOUR);

    Amount::from_decimal(add(schedule.const_fee, retained))
}

/// Message fee plus the recipient's charge for unauthorized senders.
pub fn message_fee_with_surcharge(
    schedule: &MessageFeeSchedule,
    body_len: usize,
    retention: Duration,
    unauthorized_fee: Option<Amount>,
) -> Amount {
    let base = message_fee(schedule, body_len, retention);
    match unauthorized_fee {
        Some(surcharge) => base.saturating_add(&surcharge),
        None => base,
    }
}

/// Fee for one request of `transfer_count` transfers.
///
/// The percentage part and the comment part are truncated to whole units
/// separately before summing.
pub fn wallet_fee(
    schedule: &WalletFeeSchedule,
    transfer_count: usize,
    total_amount: i64,
    total_comment_bytes: usize,
) -> Amount {
    let per_transfer = mul(
        Decimal::from(schedule.const_fee),
        Decimal::from(transfer_count as u64),
    );
    let percent = mul(schedule.fee_rate, Decimal::from(total_amount)).trunc();
    let whole_kb = Decimal::from(total_comment_bytes as u64 / BYTES_PER_KB as u64);
    let comment = mul(schedule.fee_per_kb_comment, whole_kb).trunc();

    Amount::from_decimal(add(add(per_transfer, percent), comment))
}

/// Fee for depositing `value` into an exchange account.
pub fn deposit_fee(fees: &ExchangeCurrencyFees, value: Decimal) -> Amount {
    let variable = Amount::from_decimal(value.abs()).percentage(fees.deposit_percent);
    Amount::from_decimal(fees.deposit_const).saturating_add(&variable)
}

/// Fee for withdrawing `value` from an exchange account.
pub fn withdraw_fee(fees: &ExchangeCurrencyFees, value: Decimal) -> Amount {
    let variable = Amount::from_decimal(value.abs()).percentage(fees.withdraw_percent);
    Amount::from_decimal(fees.withdraw_const).saturating_add(&variable)
}

/// Fail when `fee` is above the caller's declared maximum.
pub fn ensure_within_limit(fee: Amount, limit: Amount) -> Result<()> {
    if fee.is_within_limit(&limit) {
        Ok(())
    } else {
        tracing::debug!(%fee, %limit, "fee above caller limit");
        Err(ProtocolError::FeeExceedsCallerLimit {
            fee: fee.as_decimal(),
            limit: limit.as_decimal(),
        })
    }
}
