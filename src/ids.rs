use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Strongly typed exchange identifier backed by ULID.
///
/// Every [`Exchange`](crate::exchange::Exchange) gets one at construction; it
/// follows the exchange across dispatches so log lines from the original
/// worker and the dispatch coroutine correlate.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct ExchangeId(pub ulid::Ulid);

impl ExchangeId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse an inbound `X-Request-Id` when it is a valid ULID, otherwise mint a new id.
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.parse::<ExchangeId>().ok())
            .unwrap_or_default()
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ExchangeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExchangeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = ulid::Ulid::from_string(s)?;
        Ok(ExchangeId(id))
    }
}

impl Serialize for ExchangeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ExchangeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<ExchangeId>()
            .map_err(|_| serde::de::Error::custom("invalid exchange id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_reuses_valid_ulid() {
        let id = ExchangeId::new();
        let parsed = ExchangeId::from_header_or_new(Some(&id.to_string()));
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_from_header_generates_on_garbage() {
        let a = ExchangeId::from_header_or_new(Some("not-a-ulid"));
        let b = ExchangeId::from_header_or_new(None);
        assert_ne!(a, b);
    }
}
