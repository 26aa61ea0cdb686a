//! Shared data model for the CREP timeline cache and prediction engine.
//!
//! Kept deliberately free of any tier- or predictor-specific logic so
//! that `crep-cache` and `crep-prediction` can both depend on it without
//! a circular dependency.

mod entity;
mod geo;
mod prediction;
mod snapshot;
mod timeline;

pub use entity::{EntityType, Source, TierSource};
pub use geo::{GeoPoint, UncertaintyCone, Velocity};
pub use prediction::{
    EntityState, FlightPlan, PredictedPosition, PredictionRequest, PredictionResult, Waypoint,
};
pub use snapshot::{bucket_key, bucket_start, SnapshotMetadata, BUCKET_STRIDE_MS};
pub use timeline::{cache_key, index_key, QueryResult, TimelineEntry, TimelineQuery};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trips_through_str() {
        for et in [
            EntityType::Aircraft,
            EntityType::Vessel,
            EntityType::Satellite,
            EntityType::Wildlife,
            EntityType::Earthquake,
            EntityType::Wildfire,
            EntityType::Storm,
            EntityType::Weather,
        ] {
            let parsed: EntityType = et.as_str().parse().unwrap();
            assert_eq!(parsed, et);
        }
    }

    #[test]
    fn source_classifies_ground_truth_vs_forecast() {
        assert!(Source::Live.is_ground_truth());
        assert!(Source::Historical.is_ground_truth());
        assert!(!Source::Cached.is_ground_truth());
        assert!(!Source::Cached.is_forecast());
        assert!(Source::FlightPlan.is_forecast());
        assert!(Source::HazardModel.is_forecast());
    }

    #[test]
    fn bucket_key_is_deterministic_from_timestamp() {
        let ts = 1_700_000_000_000_i64;
        let k1 = bucket_key(EntityType::Aircraft, bucket_start(ts));
        let k2 = bucket_key(EntityType::Aircraft, bucket_start(ts + 1000));
        assert_eq!(k1, k2);
    }

    #[test]
    fn cache_key_uses_colon_separator() {
        let k = cache_key(EntityType::Vessel, "IMO1234567", 42);
        assert_eq!(k, "timeline:vessel:IMO1234567:42");
    }
}
