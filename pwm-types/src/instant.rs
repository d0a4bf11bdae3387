//! ISO-8601 instant encoding.
//!
//! Instants are written as UTC with a `Z` suffix. Fractional seconds are
//! emitted only when non-zero, in groups of 3, 6 or 9 digits, so no precision
//! is lost on a round trip. Parsing accepts any RFC-3339 offset and
//! normalizes to UTC.
//!
//! Use as a serde field adapter:
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Stamped {
//!     #[serde(with = "pwm_types::instant")]
//!     at: DateTime<Utc>,
//! }
//! ```

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

use crate::WireError;

/// The "never" sentinel: `1970-01-01T00:00:00Z`.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Timestamp carried by freshly constructed records until a store stamps
/// them: `1970-01-01T00:00:01Z`.
pub fn record_default() -> DateTime<Utc> {
    epoch() + Duration::seconds(1)
}

/// Format an instant as an ISO-8601 string.
pub fn format(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 / RFC-3339 string into a UTC instant.
pub fn parse(raw: &str) -> Result<DateTime<Utc>, WireError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WireError::InvalidData(format!("invalid instant {raw:?}: {e}")))
}

/// Serde serializer for `#[serde(with = "pwm_types::instant")]`.
pub fn serialize<S>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(instant))
}

/// Serde deserializer for `#[serde(with = "pwm_types::instant")]`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}
