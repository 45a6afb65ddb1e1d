//! AstraDNS wire types
//!
//! Decoding is lenient where the backend is loose: ids arrive as numbers,
//! empty collections arrive as `null`, and config values are stored as
//! strings server-side.

use chrono::NaiveDateTime;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Label format of QPS buckets (one bucket per minute)
pub const QPS_LABEL_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Server-assigned identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = EntityId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<EntityId, E> {
                Ok(EntityId(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EntityId, E> {
                Ok(EntityId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EntityId, E> {
                Ok(EntityId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Traffic counters from `GET /api/stats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStats")]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub blocked: u64,
    pub top_domains: HashMap<String, u64>,
}

#[derive(Deserialize)]
struct RawStats {
    #[serde(default)]
    total_requests: u64,
    #[serde(default)]
    blocked: u64,
    #[serde(default)]
    top_domains: Option<HashMap<String, u64>>,
}

impl TryFrom<RawStats> for StatsSnapshot {
    type Error = String;

    fn try_from(raw: RawStats) -> Result<Self, Self::Error> {
        if raw.blocked > raw.total_requests {
            return Err(format!(
                "blocked ({}) exceeds total_requests ({})",
                raw.blocked, raw.total_requests
            ));
        }
        Ok(Self {
            total_requests: raw.total_requests,
            blocked: raw.blocked,
            top_domains: raw.top_domains.unwrap_or_default(),
        })
    }
}

impl StatsSnapshot {
    /// Requests that were answered normally
    pub fn allowed(&self) -> u64 {
        self.total_requests.saturating_sub(self.blocked)
    }

    /// Share of blocked requests, 0-100
    pub fn blocked_percent(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        (self.blocked as f64 / self.total_requests as f64) * 100.0
    }

    /// Top domains by count, ties broken by name
    pub fn top_domains_sorted(&self) -> Vec<(&str, u64)> {
        let mut domains: Vec<_> = self
            .top_domains
            .iter()
            .map(|(d, c)| (d.as_str(), *c))
            .collect();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        domains
    }
}

/// One QPS bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QpsPoint {
    pub label: String,
    pub rate: f64,
}

impl QpsPoint {
    /// Parse the bucket label as a minute timestamp
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.label, QPS_LABEL_FORMAT).ok()
    }
}

/// Rate per time bucket from `GET /api/qps`, in the order the server sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QpsSeries(Vec<QpsPoint>);

impl QpsSeries {
    pub fn points(&self) -> &[QpsPoint] {
        &self.0
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.label.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|p| p.rate)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn peak(&self) -> Option<&QpsPoint> {
        self.0
            .iter()
            .max_by(|a, b| a.rate.partial_cmp(&b.rate).unwrap_or(std::cmp::Ordering::Equal))
    }
}

impl<'de> Deserialize<'de> for QpsSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeriesVisitor;

        impl<'de> Visitor<'de> for SeriesVisitor {
            type Value = QpsSeries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of bucket label to rate")
            }

            fn visit_unit<E: de::Error>(self) -> Result<QpsSeries, E> {
                Ok(QpsSeries::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<QpsSeries, A::Error> {
                let mut points = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((label, rate)) = map.next_entry::<String, f64>()? {
                    points.push(QpsPoint { label, rate });
                }
                Ok(QpsSeries(points))
            }
        }

        deserializer.deserialize_any(SeriesVisitor)
    }
}

/// Listener ports and signing secret from `GET /api/config`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "port_from_any", default)]
    pub dns_port: u16,
    #[serde(deserialize_with = "port_from_any", default)]
    pub api_port: u16,
    #[serde(default)]
    pub jwt_secret: String,
}

impl Config {
    /// Set a field by its wire name. Values are not range-checked here.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "dns_port" => self.dns_port = parse_port(value)?,
            "api_port" => self.api_port = parse_port(value)?,
            "jwt_secret" => self.jwt_secret = value.to_string(),
            other => return Err(format!("unknown config field: {}", other)),
        }
        Ok(())
    }
}

fn parse_port(value: &str) -> Result<u16, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("not a port number: {}", value))
}

fn port_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    struct PortVisitor;

    impl<'de> Visitor<'de> for PortVisitor {
        type Value = u16;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a port number or numeric string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u16, E> {
            u16::try_from(v).map_err(|_| E::custom(format!("port out of range: {}", v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u16, E> {
            u16::try_from(v).map_err(|_| E::custom(format!("port out of range: {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u16, E> {
            parse_port(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(PortVisitor)
}

/// Blocklist source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub id: EntityId,
    pub url: String,
}

/// Body of `POST /api/blocklists`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBlocklist {
    pub url: String,
}

/// Per-domain upstream override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub id: EntityId,
    pub domain: String,
    /// Upstream as `host:port`
    pub dns: String,
}

/// Body of `POST /api/redirects`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRedirect {
    pub domain: String,
    pub dns: String,
}

/// Body of `POST /api/block`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockDomain {
    pub domain: String,
}

/// Body of `POST /login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Response of `POST /login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Top-level tab of the authenticated view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewTab {
    #[default]
    Dashboard,
    Settings,
}

impl ViewTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Settings => "settings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stats_allowed() {
        let stats: StatsSnapshot = serde_json::from_value(json!({
            "total_requests": 100,
            "blocked": 25,
            "top_domains": {"a.com": 10}
        }))
        .unwrap();
        assert_eq!(stats.allowed(), 75);
        assert_eq!(stats.blocked_percent(), 25.0);
        assert_eq!(stats.top_domains["a.com"], 10);
    }

    #[test]
    fn test_stats_rejects_blocked_over_total() {
        let result = serde_json::from_value::<StatsSnapshot>(json!({
            "total_requests": 1,
            "blocked": 2,
            "top_domains": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_stats_null_top_domains() {
        let stats: StatsSnapshot =
            serde_json::from_value(json!({"total_requests": 0, "blocked": 0, "top_domains": null}))
                .unwrap();
        assert!(stats.top_domains.is_empty());
        assert_eq!(stats.blocked_percent(), 0.0);
    }

    #[test]
    fn test_top_domains_sorted() {
        let stats: StatsSnapshot = serde_json::from_value(json!({
            "total_requests": 30,
            "blocked": 0,
            "top_domains": {"b.com": 5, "a.com": 5, "c.com": 20}
        }))
        .unwrap();
        let sorted = stats.top_domains_sorted();
        assert_eq!(sorted, vec![("c.com", 20), ("a.com", 5), ("b.com", 5)]);
    }

    #[test]
    fn test_qps_keeps_document_order() {
        let series: QpsSeries = serde_json::from_str(
            r#"{"2024-01-01T10:02": 3, "2024-01-01T10:00": 1, "2024-01-01T10:01": 2.5}"#,
        )
        .unwrap();
        let labels: Vec<_> = series.labels().collect();
        assert_eq!(labels, vec!["2024-01-01T10:02", "2024-01-01T10:00", "2024-01-01T10:01"]);
        assert_eq!(series.values().collect::<Vec<_>>(), vec![3.0, 1.0, 2.5]);
        assert_eq!(series.peak().unwrap().label, "2024-01-01T10:02");
    }

    #[test]
    fn test_qps_order_survives_value_roundtrip() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let series: QpsSeries = serde_json::from_value(value).unwrap();
        assert_eq!(series.labels().collect::<Vec<_>>(), vec!["z", "a"]);
    }

    #[test]
    fn test_qps_timestamp() {
        let point = QpsPoint {
            label: "2024-03-05T14:07".to_string(),
            rate: 1.0,
        };
        let ts = point.timestamp().unwrap();
        assert_eq!(ts.format("%H:%M").to_string(), "14:07");

        let point = QpsPoint {
            label: "bucket-1".to_string(),
            rate: 1.0,
        };
        assert!(point.timestamp().is_none());
    }

    #[test]
    fn test_entity_id_from_number_or_string() {
        let a: BlocklistEntry = serde_json::from_value(json!({"id": 5, "url": "list.txt"})).unwrap();
        let b: BlocklistEntry =
            serde_json::from_value(json!({"id": "5", "url": "list.txt"})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id.as_str(), "5");
    }

    #[test]
    fn test_config_accepts_string_ports() {
        let config: Config = serde_json::from_value(json!({
            "dns_port": "53",
            "api_port": 8080,
            "jwt_secret": "x"
        }))
        .unwrap();
        assert_eq!(config.dns_port, 53);
        assert_eq!(config.api_port, 8080);

        assert!(serde_json::from_value::<Config>(json!({"dns_port": 70000})).is_err());
    }

    #[test]
    fn test_config_serializes_full_object() {
        let config = Config {
            dns_port: 53,
            api_port: 8080,
            jwt_secret: "x".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({"dns_port": 53, "api_port": 8080, "jwt_secret": "x"})
        );
    }

    #[test]
    fn test_config_set_field() {
        let mut config = Config::default();
        config.set_field("dns_port", "5353").unwrap();
        config.set_field("jwt_secret", "s3cret").unwrap();
        assert_eq!(config.dns_port, 5353);
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(config.set_field("dns_port", "abc").is_err());
        assert!(config.set_field("bogus", "1").is_err());
    }
}
