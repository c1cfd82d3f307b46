//! Per-tier rate limit specifications.

use serde::{Deserialize, Serialize};

/// One tier's throughput ceiling for one model.
///
/// `None` means unlimited. The TOML wire format uses the sentinel `-1` for
/// unlimited, so `rpm = -1` and an absent field both deserialize to `None`.
///
/// # Examples
///
/// ```
/// use maestro_catalog::RateLimitSpec;
///
/// let spec = RateLimitSpec {
///     requests_per_minute: Some(10),
///     tokens_per_minute: Some(250_000),
///     requests_per_day: None,
/// };
/// assert!(spec.requests_per_day.is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub struct RateLimitSpec {
    /// Requests per minute limit (`None` = unlimited)
    #[serde(default, alias = "rpm", with = "unlimited_u32")]
    pub requests_per_minute: Option<u32>,

    /// Tokens per minute limit (`None` = unlimited)
    #[serde(default, alias = "tpm", with = "unlimited_u64")]
    pub tokens_per_minute: Option<u64>,

    /// Requests per day limit (`None` = unlimited)
    #[serde(default, alias = "rpd", with = "unlimited_u32")]
    pub requests_per_day: Option<u32>,
}

impl RateLimitSpec {
    /// A spec with no limits at all.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// True when every limit is unset.
    pub fn is_unlimited(&self) -> bool {
        self.requests_per_minute.is_none()
            && self.tokens_per_minute.is_none()
            && self.requests_per_day.is_none()
    }
}

/// Serde helpers mapping the `-1` sentinel to `None`.
mod unlimited_u32 {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(-1) => Ok(None),
            Some(value) if value >= 0 => u32::try_from(value)
                .map(Some)
                .map_err(|_| de::Error::custom(format!("limit {} out of range", value))),
            Some(value) => Err(de::Error::custom(format!(
                "limit must be >= 0 or the sentinel -1, got {}",
                value
            ))),
        }
    }

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_i64(i64::from(*v)),
            None => serializer.serialize_i64(-1),
        }
    }
}

mod unlimited_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(-1) => Ok(None),
            Some(value) if value >= 0 => Ok(Some(value as u64)),
            Some(value) => Err(de::Error::custom(format!(
                "limit must be >= 0 or the sentinel -1, got {}",
                value
            ))),
        }
    }

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_i64(*v as i64),
            None => serializer.serialize_i64(-1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Wrapper {
        limits: RateLimitSpec,
    }

    #[test]
    fn test_sentinel_maps_to_unlimited() {
        let wrapper: Wrapper = serde_json::from_str(
            r#"{"limits": {"requests_per_minute": -1, "tokens_per_minute": 20000}}"#,
        )
        .unwrap();
        assert_eq!(wrapper.limits.requests_per_minute, None);
        assert_eq!(wrapper.limits.tokens_per_minute, Some(20_000));
        assert_eq!(wrapper.limits.requests_per_day, None);
    }

    #[test]
    fn test_negative_below_sentinel_rejected() {
        let result: Result<Wrapper, _> =
            serde_json::from_str(r#"{"limits": {"requests_per_minute": -2}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unlimited_spec() {
        let spec = RateLimitSpec::unlimited();
        assert!(spec.is_unlimited());
    }
}
