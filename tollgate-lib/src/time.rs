//! Second-granular timestamps, admission windows and clocks.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// 100-nanosecond ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// A UTC timestamp with no sub-second component.
///
/// The canonical signing codec only accepts this type, so an unrounded
/// timestamp cannot reach a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WholeSeconds(DateTime<Utc>);

impl WholeSeconds {
    /// Truncate to the containing second.
    pub fn round(time: DateTime<Utc>) -> Self {
        Self(time.trunc_subsecs(0))
    }

    /// `None` when `time` carries sub-second precision.
    pub fn exact(time: DateTime<Utc>) -> Option<Self> {
        is_whole_seconds(&time).then_some(Self(time))
    }

    /// 100ns ticks since 0001-01-01, as written on the wire.
    pub fn ticks(&self) -> i64 {
        self.0.timestamp() * TICKS_PER_SECOND + UNIX_EPOCH_TICKS
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<WholeSeconds> for DateTime<Utc> {
    fn from(value: WholeSeconds) -> Self {
        value.0
    }
}

pub fn is_whole_seconds(time: &DateTime<Utc>) -> bool {
    time.trunc_subsecs(0) == *time
}

fn default_skew_secs() -> i64 {
    300
}

/// Widest skew either side of an admission window may allow.
pub const MAX_SKEW_SECS: i64 = 86_400;

/// The acceptance band `[now - before, now + after]` around a request.
///
/// Both ends are inclusive. The band is recomputed on every check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionWindow {
    #[serde(default = "default_skew_secs")]
    pub before_secs: i64,
    #[serde(default = "default_skew_secs")]
    pub after_secs: i64,
}

impl Default for AdmissionWindow {
    fn default() -> Self {
        Self {
            before_secs: default_skew_secs(),
            after_secs: default_skew_secs(),
        }
    }
}

impl AdmissionWindow {
    pub fn symmetric(secs: i64) -> Self {
        Self {
            before_secs: secs,
            after_secs: secs,
        }
    }

    /// Both sides must lie in `0..=MAX_SKEW_SECS`.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let allowed = 0..=MAX_SKEW_SECS;
        if !allowed.contains(&self.before_secs) || !allowed.contains(&self.after_secs) {
            return Err(ProtocolError::InvalidConfig(format!(
                "admission window {}s/{}s outside 0..={}s",
                self.before_secs, self.after_secs, MAX_SKEW_SECS
            )));
        }
        Ok(())
    }

    /// Saturates at the earliest representable time.
    pub fn earliest(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_seconds(self.before_secs)
            .and_then(|skew| now.checked_sub_signed(skew))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Saturates at the latest representable time.
    pub fn latest(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_seconds(self.after_secs)
            .and_then(|skew| now.checked_add_signed(skew))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        time >= self.earliest(now) && time <= self.latest(now)
    }
}

/// Source of "now" for admission checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
