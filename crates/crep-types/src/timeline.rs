use crate::entity::{EntityType, Source, TierSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single record on an entity's timeline. `data` is opaque to the
/// cache tiers; by convention it carries `position`, optional
/// `velocity`, and arbitrary `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub timestamp_ms: i64,
    pub data: Value,
    pub source: Source,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TimelineEntry {
    /// Cache key shared by Memory and Networked tiers:
    /// `timeline:<entity_type>:<entity_id>:<timestamp_ms>`.
    pub fn cache_key(&self) -> String {
        cache_key(self.entity_type, &self.entity_id, self.timestamp_ms)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

pub fn cache_key(entity_type: EntityType, entity_id: &str, timestamp_ms: i64) -> String {
    format!("timeline:{entity_type}:{entity_id}:{timestamp_ms}")
}

pub fn index_key(entity_type: EntityType, entity_id: &str) -> String {
    format!("timeline:idx:{entity_type}:{entity_id}")
}

/// Filter for a range/entity query against any tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub limit: usize,
}

impl TimelineQuery {
    pub fn matches(&self, entry: &TimelineEntry) -> bool {
        if let Some(et) = self.entity_type {
            if entry.entity_type != et {
                return false;
            }
        }
        if let Some(id) = &self.entity_id {
            if &entry.entity_id != id {
                return false;
            }
        }
        if let Some(start) = self.start_time_ms {
            if entry.timestamp_ms < start {
                return false;
            }
        }
        if let Some(end) = self.end_time_ms {
            if entry.timestamp_ms > end {
                return false;
            }
        }
        if let Some(source) = self.source {
            if entry.source != source {
                return false;
            }
        }
        true
    }
}

/// Result of a query against the Cache Manager's tier waterfall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub entries: Vec<TimelineEntry>,
    pub tier: TierSource,
    pub hit: bool,
    pub latency_ms: f64,
    pub has_more: bool,
}
