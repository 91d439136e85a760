use anyhow::{bail, Context};

/// Parses a timeout value the way `proxy_parse_timeout` does: a plain
/// integer is milliseconds, and an optional trailing unit (`us`, `ms`, `s`,
/// `m`, `h`, `d`) rescales it. `us` truncates to whole milliseconds.
pub fn parse_duration_ms(raw: &str) -> anyhow::Result<u64> {
  let raw = raw.trim();
  if raw.is_empty() {
    bail!("expects a duration, got an empty value");
  }

  let split_at = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
  let (digits, unit) = raw.split_at(split_at);
  if digits.is_empty() {
    bail!("'{raw}' is not a valid duration");
  }
  let value: u64 = digits.parse().with_context(|| format!("'{raw}' is not a valid duration"))?;

  let ms = match unit {
    "" | "ms" => value,
    "us" => value / 1_000,
    "s" => value.saturating_mul(1_000),
    "m" => value.saturating_mul(60_000),
    "h" => value.saturating_mul(3_600_000),
    "d" => value.saturating_mul(86_400_000),
    other => bail!("'{other}' is not a recognized time unit in '{raw}'"),
  };
  Ok(ms)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_integer_is_milliseconds() {
    assert_eq!(parse_duration_ms("5000").unwrap(), 5000);
  }

  #[test]
  fn suffixes_rescale_into_milliseconds() {
    assert_eq!(parse_duration_ms("3s").unwrap(), 3_000);
    assert_eq!(parse_duration_ms("2m").unwrap(), 120_000);
    assert_eq!(parse_duration_ms("1h").unwrap(), 3_600_000);
  }

  #[test]
  fn unknown_unit_is_rejected() {
    assert!(parse_duration_ms("5x").is_err());
  }

  #[test]
  fn empty_value_is_rejected() {
    assert!(parse_duration_ms("").is_err());
  }
}
