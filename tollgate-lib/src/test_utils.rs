//! Deterministic fixtures for admission and key-exchange tests.
//!
//! Only available with the `test-utils` feature or in test builds.

use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::certificate::PrivateLightCertificate;
use crate::config::Environment;
use crate::identifier::{ClientId, IdMask};
use crate::time::FixedClock;

/// 2026-03-01T12:00:00Z. Early in a 31-day month so one-month spans
/// always exceed 30 days.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn fixed_clock() -> FixedClock {
    FixedClock(fixed_now())
}

/// Seeded identifier source over an issuable range.
pub struct IdSource {
    range: IdMask,
    rng: StdRng,
}

impl IdSource {
    pub fn new(range: IdMask, seed: u64) -> Self {
        Self {
            range,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Production issuable range.
    pub fn production(seed: u64) -> Self {
        Self::new(Environment::Production.issuable_range(), seed)
    }

    pub fn next_id(&mut self) -> ClientId {
        self.range.generate(&mut self.rng)
    }
}

/// Fresh certificate for a client id in the production range.
pub fn client_cert(ids: &mut IdSource) -> PrivateLightCertificate {
    PrivateLightCertificate::generate(ids.next_id())
}

/// Certificate with fixed secrets, for reproducible vectors.
pub fn seeded_cert(id: ClientId, seed: u8) -> PrivateLightCertificate {
    PrivateLightCertificate::from_secret_bytes(id, [seed; 32], [seed.wrapping_add(1); 32])
}
