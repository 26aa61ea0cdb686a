use crate::predictor::{Predictor, PredictorParams};
use crate::state::entity_state_from_entry;
use async_trait::async_trait;
use chrono::Utc;
use crep_cache::CacheManager;
use crep_types::{EntityState, EntityType, GeoPoint, PredictedPosition, Source, TimelineQuery, Velocity};
use std::sync::Arc;
use tracing::warn;

const KNOTS_TO_MS: f64 = 0.514444;

/// Major port codes with known coordinates, used to resolve an AIS
/// destination string into a routing target. A small, fixed subset —
/// anything else falls back to course extrapolation.
const MAJOR_PORTS: &[(&str, f64, f64)] = &[
    ("USLAX", 33.7397, -118.2601),
    ("USSEA", 47.6205, -122.3493),
    ("NLRTM", 51.9244, 4.4777),
    ("SGSIN", 1.2644, 103.8198),
    ("CNSHA", 31.2304, 121.4737),
    ("JPYOK", 35.4437, 139.6380),
    ("AUBNE", -27.3841, 153.1175),
    ("GBFXT", 51.9533, 1.3500),
];

fn lookup_port(code: &str) -> Option<GeoPoint> {
    let upper = code.to_uppercase();
    MAJOR_PORTS
        .iter()
        .find(|(port_code, _, _)| *port_code == upper)
        .map(|(_, lat, lng)| GeoPoint::new(*lat, *lng))
}

/// Predicts vessel positions: routes toward a resolved AIS destination
/// port when one is known, otherwise extrapolates along current
/// course and speed.
pub struct VesselPredictor {
    cache: Option<Arc<CacheManager>>,
    params: PredictorParams,
}

impl VesselPredictor {
    pub fn new(cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            cache,
            params: PredictorParams {
                prediction_source: Source::RoutePlan,
                model_version: "1.0.0".to_string(),
                initial_confidence: 0.90,
                confidence_half_life_seconds: 3600.0,
                minimum_confidence: 0.3,
                max_prediction_horizon_seconds: 48 * 3600,
                min_resolution_seconds: 10,
                max_resolution_seconds: 3600,
                base_uncertainty_meters: 200.0,
                uncertainty_growth_rate: 0.2,
            },
        }
    }

    async fn predict_to_destination(
        &self,
        state: &EntityState,
        destination: GeoPoint,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let total_distance = crep_geodesy::distance(&state.position, &destination);
        let speed_knots = state.velocity.map_or(12.0, |v| v.speed);
        let speed_ms = speed_knots * KNOTS_TO_MS;

        let num_waypoints = ((total_distance / 100_000.0) as usize).max(2);
        let waypoints: Vec<GeoPoint> = (0..=num_waypoints)
            .map(|i| {
                let fraction = i as f64 / num_waypoints as f64;
                crep_geodesy::interpolate(&state.position, &destination, fraction)
            })
            .collect();

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let step_ms = resolution_seconds * 1000;

        for pair in waypoints.windows(2) {
            let (wp_start, wp_end) = (pair[0], pair[1]);
            let segment_distance = crep_geodesy::distance(&wp_start, &wp_end);
            let segment_time_s = if speed_ms > 0.0 { segment_distance / speed_ms } else { 0.0 };

            let mut segment_elapsed = 0.0;
            while segment_elapsed < segment_time_s && current_time_ms <= to_time_ms {
                let fraction = if segment_time_s > 0.0 { segment_elapsed / segment_time_s } else { 0.0 };
                let pos = crep_geodesy::interpolate(&wp_start, &wp_end, fraction);
                let heading = crep_geodesy::bearing(&wp_start, &wp_end);

                predictions.push(PredictedPosition {
                    entity_id: state.entity_id.clone(),
                    entity_type: EntityType::Vessel,
                    timestamp_ms: current_time_ms,
                    position: pos,
                    velocity: Some(Velocity::new(speed_knots, heading)),
                    confidence: 1.0,
                    uncertainty: None,
                    prediction_source: Source::RoutePlan,
                    model_version: self.params.model_version.clone(),
                    metadata: Default::default(),
                    created_at: Utc::now(),
                });

                current_time_ms += step_ms;
                segment_elapsed += resolution_seconds as f64;
            }
            if current_time_ms > to_time_ms {
                break;
            }
        }

        predictions
    }

    async fn predict_from_course(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let Some(velocity) = state.velocity else {
            warn!(entity_id = %state.entity_id, "no velocity data for vessel");
            return Vec::new();
        };

        let speed_ms = velocity.speed * KNOTS_TO_MS;
        let heading = velocity.heading;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let distance = speed_ms * resolution_seconds as f64;
            let new_pos = crep_geodesy::destination(&current_pos, heading, distance);

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Vessel,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: Some(Velocity::new(velocity.speed, heading)),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::Extrapolation,
                model_version: self.params.model_version.clone(),
                metadata: Default::default(),
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
        }

        predictions
    }
}

#[async_trait]
impl Predictor for VesselPredictor {
    fn entity_type(&self) -> EntityType {
        EntityType::Vessel
    }

    fn params(&self) -> &PredictorParams {
        &self.params
    }

    async fn get_current_state(&self, entity_id: &str) -> Option<EntityState> {
        let cache = self.cache.as_ref()?;
        let query = TimelineQuery {
            entity_type: Some(EntityType::Vessel),
            entity_id: Some(entity_id.to_string()),
            limit: 1,
            ..Default::default()
        };
        let result = cache.query(&query).await;
        result.entries.first().map(entity_state_from_entry)
    }

    async fn predict_positions(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        if let Some(destination_code) = &state.destination {
            if let Some(destination) = lookup_port(destination_code) {
                return self.predict_to_destination(state, destination, from_time_ms, to_time_ms, resolution_seconds).await;
            }
        }
        self.predict_from_course(state, from_time_ms, to_time_ms, resolution_seconds).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_port_case_insensitively() {
        let port = lookup_port("uslax").expect("USLAX should resolve");
        assert!((port.lat - 33.7397).abs() < 1e-6);
    }

    #[test]
    fn unknown_port_code_resolves_to_none() {
        assert!(lookup_port("ZZZZZ").is_none());
    }

    #[tokio::test]
    async fn course_extrapolation_without_velocity_returns_empty() {
        let predictor = VesselPredictor::new(None);
        let state = EntityState {
            entity_id: "MMSI1".to_string(),
            entity_type: EntityType::Vessel,
            timestamp_ms: 0,
            position: GeoPoint::new(1.0, 1.0),
            velocity: None,
            flight_plan: None,
            destination: None,
            tle_line1: None,
            tle_line2: None,
            species: None,
            metadata: Default::default(),
        };
        let predictions = predictor.predict_positions(&state, 0, 60_000, 60).await;
        assert!(predictions.is_empty());
    }
}
