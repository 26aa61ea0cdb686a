use crate::entity::{EntityType, Source};
use crate::geo::{GeoPoint, UncertaintyCone, Velocity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single leg of a flight plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<i64>,
}

impl Waypoint {
    pub fn position(&self) -> GeoPoint {
        GeoPoint { lat: self.lat, lng: self.lng, altitude: self.altitude }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub waypoints: Vec<Waypoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
}

/// Last-known ground truth for an entity, plus whichever class-specific
/// carry-ons its predictor needs. Unused fields for a given entity class
/// are simply `None` — see SPEC_FULL §9 on tagged-union-style state
/// rather than a class hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub timestamp_ms: i64,
    pub position: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_plan: Option<FlightPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tle_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tle_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EntityState {
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp_ms).unwrap_or_else(Utc::now)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }
}

/// A `TimelineEntry`-shaped forecast record: position plus confidence,
/// uncertainty, and the model that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedPosition {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub timestamp_ms: i64,
    pub position: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<UncertaintyCone>,
    pub prediction_source: Source,
    pub model_version: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub from_time_ms: i64,
    pub to_time_ms: i64,
    pub resolution_seconds: i64,
    #[serde(default)]
    pub include_uncertainty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub predictions: Vec<PredictedPosition>,
    pub source: Source,
    pub model_version: String,
    pub computation_time_ms: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}
