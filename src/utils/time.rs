use std::time::Duration;

use crate::Error;
use crate::Result;

/// Parses a duration literal made of `<number><unit>` pairs, e.g. `"300ms"`,
/// `"1.5s"` or `"1h2m3s"`. Units: `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`.
/// A bare `"0"` is accepted.
pub fn parse_duration(literal: &str) -> Result<Duration> {
    let invalid = || Error::config(format!("invalid duration literal: {literal:?}"));

    let mut rest = literal.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += number * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
