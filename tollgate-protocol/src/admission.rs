//! Admission rule checks shared by every request kind.
//!
//! Each request type runs these in rule order and stops at the first
//! failure. A failure is a [`ProtocolError::Admission`] naming the rule and
//! the offending field; nothing here panics or recovers.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::RangeInclusive;

use chrono::{DateTime, Months, Utc};
use tollgate_lib::namespace::{ClientIdClass, NamespaceTable};
use tollgate_lib::time::is_whole_seconds;
use tollgate_lib::{AdmissionRule, AdmissionWindow, ClientId, IdMask, ProtocolError, Result};

pub(crate) fn reject(rule: AdmissionRule, field: &'static str, detail: impl Into<String>) -> ProtocolError {
    let detail = detail.into();
    tracing::debug!(rule = %rule, field, detail = %detail, "request rejected");
    ProtocolError::rejected(rule, field, detail)
}

/// Rule 1: the identifier is not the empty placeholder.
pub fn require_id(field: &'static str, id: &ClientId) -> Result<()> {
    if id.is_nil() {
        return Err(reject(AdmissionRule::RequiredIdentifier, field, "identifier is empty"));
    }
    Ok(())
}

/// Rule 2: the identifier was drawn from `range`.
pub fn require_issuable(field: &'static str, id: &ClientId, range: &IdMask) -> Result<()> {
    if !range.matches(id) {
        return Err(reject(
            AdmissionRule::IdentifierNamespace,
            field,
            format!("{} is outside the issuable range", id),
        ));
    }
    Ok(())
}

/// Rule 2: the identifier names a class that can be addressed.
pub fn require_addressable(
    field: &'static str,
    id: &ClientId,
    table: &NamespaceTable<ClientIdClass>,
) -> Result<()> {
    let class = table.classify(id);
    if !class.is_addressable() {
        return Err(reject(
            AdmissionRule::IdentifierNamespace,
            field,
            format!("{} is in the {:?} block", id, class),
        ));
    }
    Ok(())
}

/// Rule 3: payload is at most `max` bytes.
pub fn require_max_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(reject(
            AdmissionRule::PayloadSize,
            field,
            format!("{} bytes exceeds {}", len, max),
        ));
    }
    Ok(())
}

/// Rule 3: payload is exactly `expected` bytes.
pub fn require_exact_len(field: &'static str, len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(reject(
            AdmissionRule::PayloadSize,
            field,
            format!("{} bytes, expected {}", len, expected),
        ));
    }
    Ok(())
}

/// Rule 3: a numeric value lies in `range`.
pub fn require_in_range<T: PartialOrd + Display>(
    field: &'static str,
    value: &T,
    range: RangeInclusive<T>,
) -> Result<()> {
    if !range.contains(value) {
        return Err(reject(
            AdmissionRule::ValueRange,
            field,
            format!("{} not within {}..={}", value, range.start(), range.end()),
        ));
    }
    Ok(())
}

/// Rule 3 for codes: non-blank and at most `max` characters.
pub fn require_code(field: &'static str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        tracing::debug!(field, "blank code");
        return Err(ProtocolError::malformed(field, "must not be blank"));
    }
    let len = value.chars().count();
    if len > max {
        return Err(reject(
            AdmissionRule::PayloadSize,
            field,
            format!("{} characters exceeds {}", len, max),
        ));
    }
    Ok(())
}

/// Rule 4: the timestamp has no sub-second part.
pub fn require_whole_seconds(field: &'static str, time: &DateTime<Utc>) -> Result<()> {
    if !is_whole_seconds(time) {
        return Err(reject(
            AdmissionRule::TimestampPrecision,
            field,
            format!("{} carries sub-second precision", time.to_rfc3339()),
        ));
    }
    Ok(())
}

/// Rule 5: the timestamp is inside the admission window around `now`.
pub fn require_in_window(
    field: &'static str,
    time: &DateTime<Utc>,
    window: &AdmissionWindow,
    now: DateTime<Utc>,
) -> Result<()> {
    if !window.contains(*time, now) {
        return Err(reject(
            AdmissionRule::TimeWindow,
            field,
            format!(
                "{} outside [{}, {}]",
                time.to_rfc3339(),
                window.earliest(now).to_rfc3339(),
                window.latest(now).to_rfc3339()
            ),
        ));
    }
    Ok(())
}

/// Rule 6: `earlier` is strictly before `later`.
pub fn require_before(
    field: &'static str,
    earlier: &DateTime<Utc>,
    later: &DateTime<Utc>,
) -> Result<()> {
    if earlier >= later {
        return Err(reject(
            AdmissionRule::TimestampOrdering,
            field,
            format!("{} is not after {}", later.to_rfc3339(), earlier.to_rfc3339()),
        ));
    }
    Ok(())
}

/// Rule 6: a query range does not end before it starts.
pub fn require_ordered(
    field: &'static str,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
) -> Result<()> {
    if to < from {
        return Err(reject(
            AdmissionRule::TimestampOrdering,
            field,
            format!("{} is before {}", to.to_rfc3339(), from.to_rfc3339()),
        ));
    }
    Ok(())
}

/// Rule 6: `later` is no further than `max` past `earlier`.
pub fn require_span(
    field: &'static str,
    earlier: &DateTime<Utc>,
    later: &DateTime<Utc>,
    max: chrono::Duration,
) -> Result<()> {
    if *later - *earlier > max {
        return Err(reject(
            AdmissionRule::SpanLimit,
            field,
            format!("span exceeds {} days", max.num_days()),
        ));
    }
    Ok(())
}

/// Rule 6: `later` is no further than `months` calendar months past `earlier`.
pub fn require_span_months(
    field: &'static str,
    earlier: &DateTime<Utc>,
    later: &DateTime<Utc>,
    months: u32,
) -> Result<()> {
    let limit = earlier.checked_add_months(Months::new(months));
    match limit {
        Some(limit) if *later <= limit => Ok(()),
        _ => Err(reject(
            AdmissionRule::SpanLimit,
            field,
            format!("span exceeds {} month(s)", months),
        )),
    }
}

/// Rule 7: no entry appears twice.
pub fn require_distinct<T: Eq + Hash + Display>(field: &'static str, items: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(reject(
                AdmissionRule::DuplicateEntries,
                field,
                format!("{} appears more than once", item),
            ));
        }
    }
    Ok(())
}

/// Rule 7: the collection size lies in `range`.
pub fn require_count(field: &'static str, len: usize, range: &RangeInclusive<usize>) -> Result<()> {
    if !range.contains(&len) {
        return Err(reject(
            AdmissionRule::CountRange,
            field,
            format!("{} entries, allowed {}..={}", len, range.start(), range.end()),
        ));
    }
    Ok(())
}

/// Rule 8 for sealed signatures: unsigned requests carry nothing, signed
/// ones carry the current tag and an exact-length signature.
pub fn require_signature_mode(
    field: &'static str,
    expect_signed: bool,
    tag_is_none: bool,
    tag_is_current: bool,
    signature_len: usize,
    expected_len: usize,
) -> Result<()> {
    if !expect_signed {
        if !tag_is_none || signature_len != 0 {
            return Err(reject(
                AdmissionRule::SignatureMode,
                field,
                "unsigned request must carry no signature and signature type none",
            ));
        }
        return Ok(());
    }
    if !tag_is_current {
        return Err(reject(
            AdmissionRule::SignatureMode,
            field,
            "signed request must carry the current signature type",
        ));
    }
    if signature_len != expected_len {
        return Err(reject(
            AdmissionRule::SignatureMode,
            field,
            format!("signature is {} bytes, expected {}", signature_len, expected_len),
        ));
    }
    Ok(())
}

/// Expired once `now` reaches `valid_until`.
pub fn require_unexpired(
    field: &'static str,
    valid_until: &DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<()> {
    if now >= *valid_until {
        return Err(reject(
            AdmissionRule::ExpiredKey,
            field,
            format!("key expired at {}", valid_until.to_rfc3339()),
        ));
    }
    Ok(())
}
