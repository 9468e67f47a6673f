//! # Duration Flags
//!
//! Parses the humane interval strings accepted by `--poll` and `--sync`.

use anyhow::Result;
use regex::Regex;
use std::time::Duration;

/// Parse an interval string such as "30s", "10m", "1h" or "1d"
pub fn parse_interval(value: &str) -> Result<Duration> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Interval cannot be empty"));
    }

    let interval_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    let lower = trimmed.to_lowercase();
    let captures = interval_regex.captures(&lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid interval '{}'. Expected <number><unit> (e.g. '30s', '10m', '1h')",
            trimmed
        )
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid interval number in '{}': {}", trimmed, e))?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Interval must be greater than 0, got '{}'",
            trimmed
        ));
    }

    let seconds = match &captures["unit"] {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        "d" => number * 86_400,
        other => return Err(anyhow::anyhow!("Unsupported interval unit '{}'", other)),
    };

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval_units() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_interval(" 1H ").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_parse_interval_rejects_bad_input() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("10").is_err());
        assert!(parse_interval("ten minutes").is_err());
    }
}
