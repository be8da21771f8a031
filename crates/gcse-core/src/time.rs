//! Millisecond-epoch time wrapper for the on-disk wire format (`spec.md` §6).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A `DateTime<Utc>` that serializes as a signed millisecond epoch, matching
/// the record wire format in `spec.md` §6 ("time is a signed millisecond
/// epoch").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(i64);

impl Millis {
    /// The current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Add a [`chrono::Duration`], saturating on overflow.
    #[must_use]
    pub fn plus(self, d: chrono::Duration) -> Self {
        Self::from(self.to_datetime() + d)
    }

    /// Convert to a `chrono::DateTime<Utc>`.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.0).single().unwrap_or(Utc::now())
    }

    /// Raw millisecond epoch value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl From<DateTime<Utc>> for Millis {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl From<SystemTime> for Millis {
    fn from(t: SystemTime) -> Self {
        let dt: DateTime<Utc> = t
            .duration_since(UNIX_EPOCH)
            .map(|d| Utc.timestamp_millis_opt(d.as_millis() as i64).single())
            .unwrap_or_default()
            .unwrap_or_else(Utc::now);
        Self::from(dt)
    }
}

impl std::fmt::Display for Millis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_datetime() {
        let now = Utc::now();
        let m = Millis::from(now);
        assert_eq!(m.to_datetime().timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn plus_advances() {
        let base = Millis::now();
        let later = base.plus(chrono::Duration::hours(12));
        assert!(later.as_millis() > base.as_millis());
    }
}
