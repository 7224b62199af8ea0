// # Duration Parsing
//
// Durations in configuration use the same grammar as the host web server the
// range list is usually consumed by: a sequence of decimal numbers, each with
// an optional fraction and a mandatory unit suffix.
//
//   90s   1h30m   1.5h   250ms   2d
//
// Supported units: ns, us, µs, ms, s, m, h, d. A bare `0` is allowed.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{Error, Result};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MIN: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MIN;
const NANOS_PER_DAY: u128 = 24 * NANOS_PER_HOUR;
const MAX_NANOS: u128 = i64::MAX as u128;

/// Parse a duration string such as `2h`, `30s` or `1h30m`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |why: &str| Error::config(format!("invalid duration '{}': {}", input, why));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid("empty"));
    }

    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
        if rest.is_empty() {
            return Err(invalid("expected a number"));
        }
    } else if rest.starts_with('-') {
        return Err(invalid("negative durations are not allowed"));
    }

    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;

    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_digits, after_int) = rest.split_at(int_len);

        let (frac_digits, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_len);

        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => NANOS_PER_MIN,
            "h" => NANOS_PER_HOUR,
            "d" => NANOS_PER_DAY,
            "" => return Err(invalid("missing unit")),
            other => return Err(invalid(&format!("unknown unit '{}'", other))),
        };

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits.parse().map_err(|_| invalid("number out of range"))?
        };

        let mut component = whole
            .checked_mul(unit_nanos)
            .ok_or_else(|| invalid("overflow"))?;

        if !frac_digits.is_empty() {
            // Digits beyond nanosecond precision of the largest unit are dropped
            let digits = &frac_digits[..frac_digits.len().min(18)];
            let frac: u128 = digits.parse().map_err(|_| invalid("number out of range"))?;
            let scale = 10u128.pow(digits.len() as u32);
            component += frac * unit_nanos / scale;
        }

        total = total
            .checked_add(component)
            .ok_or_else(|| invalid("overflow"))?;
        rest = remaining;
    }

    // Same upper bound as a signed 64-bit nanosecond count (~292 years)
    if total > MAX_NANOS {
        return Err(invalid("overflow"));
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| invalid("overflow"))?;
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Serde adapter for durations in JSON configuration
///
/// Accepts either a duration string (`"2h"`) or an integer number of
/// nanoseconds, and always serializes as nanoseconds.
pub mod serde_duration {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Nanos(u64),
        Text(String),
    }

    pub fn serialize<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Nanos(nanos) if u128::from(nanos) > MAX_NANOS => Err(serde::de::Error::custom(
                format!("invalid duration '{}ns': overflow", nanos),
            )),
            Repr::Nanos(nanos) => Ok(Duration::from_nanos(nanos)),
            Repr::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
