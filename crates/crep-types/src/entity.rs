use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of entity classes the core understands. Anything an
/// ingest source tags outside this set (a catch-all "custom" bucket, say)
/// must be filtered before it reaches the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Aircraft,
    Vessel,
    Satellite,
    Wildlife,
    Earthquake,
    Wildfire,
    Storm,
    Weather,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Aircraft => "aircraft",
            EntityType::Vessel => "vessel",
            EntityType::Satellite => "satellite",
            EntityType::Wildlife => "wildlife",
            EntityType::Earthquake => "earthquake",
            EntityType::Wildfire => "wildfire",
            EntityType::Storm => "storm",
            EntityType::Weather => "weather",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aircraft" => Ok(EntityType::Aircraft),
            "vessel" => Ok(EntityType::Vessel),
            "satellite" => Ok(EntityType::Satellite),
            "wildlife" => Ok(EntityType::Wildlife),
            "earthquake" => Ok(EntityType::Earthquake),
            "wildfire" => Ok(EntityType::Wildfire),
            "storm" => Ok(EntityType::Storm),
            "weather" => Ok(EntityType::Weather),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// Provenance tag shared by `TimelineEntry::source` and
/// `PredictedPosition::prediction_source`. The design intent (see
/// SPEC_FULL §9) is that this single tag is the discriminator between
/// ground truth and forecast sharing one timeline, not a separate
/// storage namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Live,
    Historical,
    Forecast,
    Cached,
    Extrapolation,
    FlightPlan,
    OrbitPropagation,
    RoutePlan,
    MigrationModel,
    Earth2Forecast,
    Statistical,
    HazardModel,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Live => "live",
            Source::Historical => "historical",
            Source::Forecast => "forecast",
            Source::Cached => "cached",
            Source::Extrapolation => "extrapolation",
            Source::FlightPlan => "flight_plan",
            Source::OrbitPropagation => "orbit_propagation",
            Source::RoutePlan => "route_plan",
            Source::MigrationModel => "migration_model",
            Source::Earth2Forecast => "earth2_forecast",
            Source::Statistical => "statistical",
            Source::HazardModel => "hazard_model",
        }
    }

    /// Ground-truth sources a tier promotion or prediction write must
    /// never clobber.
    pub fn is_ground_truth(&self) -> bool {
        matches!(self, Source::Live | Source::Historical)
    }

    /// Sources produced by the prediction engine; the set a
    /// `replace_existing` prediction write is permitted to delete.
    pub fn is_forecast(&self) -> bool {
        !self.is_ground_truth() && !matches!(self, Source::Cached)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tier of the three-tier cache answered a query; distinct from
/// `Source`, which records how an individual record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    Memory,
    Redis,
    Database,
    Snapshot,
}

impl fmt::Display for TierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TierSource::Memory => "memory",
            TierSource::Redis => "redis",
            TierSource::Database => "database",
            TierSource::Snapshot => "snapshot",
        };
        f.write_str(s)
    }
}
