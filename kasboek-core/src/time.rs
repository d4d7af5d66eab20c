//! Time utilities: chat timestamps and timezone-aware fallback dates.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Epoch instant attached to a message, used for the transaction date when
/// the text itself carries no valid date.
///
/// Only finite values chrono can represent are accepted, so turning one into
/// a calendar date cannot fail. Serializes as an exact decimal string and
/// deserializes from either a string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FallbackTimestamp(DateTime<Utc>);

impl FallbackTimestamp {
    /// Build from whole or fractional seconds since the Unix epoch.
    pub fn from_secs(secs: f64) -> Result<Self> {
        if !secs.is_finite() {
            bail!("timestamp is not a finite number: {secs}");
        }

        let whole = secs.floor();
        if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            bail!("timestamp out of range: {secs}");
        }
        let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);

        let instant = DateTime::from_timestamp(whole as i64, nanos)
            .with_context(|| format!("timestamp out of range: {secs}"))?;
        Ok(Self(instant))
    }

    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0.timestamp() as f64 + f64::from(self.0.timestamp_subsec_nanos()) / 1e9
    }

    /// Calendar date of this instant in UTC.
    pub fn to_date_utc(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Calendar date of this instant on a wall clock in `tz`.
    pub fn to_date_in(&self, tz: Tz) -> NaiveDate {
        self.0.with_timezone(&tz).date_naive()
    }
}

/// Parses chat-style timestamps such as `"1700000000.000100"`.
impl FromStr for FallbackTimestamp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        // Unsigned decimal strings are split exactly; f64 would lose the
        // microseconds that keep neighbouring chat messages apart.
        if let Some((whole, frac)) = split_unsigned_decimal(trimmed) {
            let secs: i64 = whole
                .parse()
                .with_context(|| format!("invalid timestamp '{s}'"))?;
            let nanos: u32 = format!("{frac:0<9}")[..9]
                .parse()
                .with_context(|| format!("invalid timestamp '{s}'"))?;
            let instant = DateTime::from_timestamp(secs, nanos)
                .with_context(|| format!("timestamp out of range: {s}"))?;
            return Ok(Self(instant));
        }

        let secs: f64 = trimmed
            .parse()
            .with_context(|| format!("invalid timestamp '{s}'"))?;
        Self::from_secs(secs)
    }
}

impl TryFrom<f64> for FallbackTimestamp {
    type Error = anyhow::Error;

    fn try_from(secs: f64) -> Result<Self> {
        Self::from_secs(secs)
    }
}

impl fmt::Display for FallbackTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.timestamp();
        let nanos = self.0.timestamp_subsec_nanos();
        if secs < 0 && nanos > 0 {
            return write!(f, "{:.9}", self.as_secs());
        }
        write!(f, "{secs}.{nanos:09}")
    }
}

impl Serialize for FallbackTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FallbackTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Secs(f64),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(s) => s.parse().map_err(de::Error::custom),
            Wire::Secs(secs) => Self::from_secs(secs).map_err(de::Error::custom),
        }
    }
}

fn split_unsigned_decimal(s: &str) -> Option<(&str, &str)> {
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !digits(whole) || !digits(frac) {
        return None;
    }
    Some((whole, frac))
}

/// Parse an IANA timezone name like "Europe/Amsterdam".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}
