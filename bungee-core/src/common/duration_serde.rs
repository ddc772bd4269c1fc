//! Serde (de)serialization of [`Duration`] as human-readable strings
//! (`"30s"`, `"500ms"`, `"1m"`, `"2h"`), used by every config struct in this
//! crate that carries a duration field.

use std::time::Duration;

use serde::{de::Error as _, Deserializer, Serializer};

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}ms", duration.as_millis()))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(D::Error::custom)
}

/// Parse a human duration string such as `"30s"`, `"500ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration string");
    }
    if let Some(stripped) = s.strip_suffix("ms") {
        let num: u64 = stripped
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {s}"))?;
        return Ok(Duration::from_millis(num));
    }
    if let Some(stripped) = s.strip_suffix('h') {
        let num: u64 = stripped
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {s}"))?;
        return Ok(Duration::from_secs(num * 3600));
    }
    if let Some(stripped) = s.strip_suffix('m') {
        let num: u64 = stripped
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {s}"))?;
        return Ok(Duration::from_secs(num * 60));
    }
    if let Some(stripped) = s.strip_suffix('s') {
        let num: u64 = stripped
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid duration number: {s}"))?;
        return Ok(Duration::from_secs(num));
    }
    anyhow::bail!("unrecognized duration unit: {s}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(
            parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn round_trips_through_serde() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "crate::common::duration_serde")]
            d: Duration,
        }
        let w = Wrapper {
            d: Duration::from_millis(1500),
        };
        let json = serde_json::to_string(&w).unwrap();
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.d, Duration::from_millis(1500));
    }
}
