// Time - Temps de bloc au format RFC 3339 (fichiers de genèse et de blocs)
use super::primitives::Timestamp;
use chrono::{DateTime, SecondsFormat, Utc};

/// Temps invalide ou antérieur à l'époque Unix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid RFC 3339 time '{0}'")]
pub struct TimeParseError(pub String);

pub fn parse_rfc3339(s: &str) -> Result<Timestamp, TimeParseError> {
    let parsed = DateTime::parse_from_rfc3339(s).map_err(|_| TimeParseError(s.to_string()))?;
    Timestamp::try_from(parsed.timestamp()).map_err(|_| TimeParseError(s.to_string()))
}

pub fn to_rfc3339(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ts.to_string())
}

/// `#[serde(with = "rfc3339")]` pour un `Timestamp`
pub mod rfc3339 {
    use super::{parse_rfc3339, to_rfc3339};
    use crate::types::Timestamp;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_rfc3339(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_rfc3339(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339_roundtrip() {
        assert_eq!(parse_rfc3339("2025-01-01T00:00:00Z").unwrap(), 1_735_689_600);
        assert_eq!(to_rfc3339(1_735_689_600), "2025-01-01T00:00:00Z");
        assert_eq!(parse_rfc3339("2025-01-01T01:00:00+01:00").unwrap(), 1_735_689_600);
    }

    #[test]
    fn test_rejects_pre_epoch_and_garbage() {
        assert!(parse_rfc3339("1969-12-31T23:59:59Z").is_err());
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
