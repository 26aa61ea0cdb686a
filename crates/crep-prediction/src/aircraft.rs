use crate::predictor::{Predictor, PredictorParams};
use crate::state::entity_state_from_entry;
use async_trait::async_trait;
use chrono::Utc;
use crep_cache::CacheManager;
use crep_types::{EntityState, EntityType, FlightPlan, GeoPoint, PredictedPosition, Source, TimelineQuery, Velocity};
use std::sync::Arc;
use tracing::warn;

const KNOTS_TO_MS: f64 = 0.514444;
const FEET_TO_M: f64 = 0.3048;

/// Predicts aircraft positions: follows a filed flight plan when one is
/// attached to the current state, otherwise extrapolates along current
/// heading/speed/climb rate.
pub struct AircraftPredictor {
    cache: Option<Arc<CacheManager>>,
    params: PredictorParams,
}

impl AircraftPredictor {
    pub fn new(cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            cache,
            params: PredictorParams {
                prediction_source: Source::Extrapolation,
                model_version: "1.0.0".to_string(),
                initial_confidence: 0.95,
                confidence_half_life_seconds: 600.0,
                minimum_confidence: 0.2,
                max_prediction_horizon_seconds: 4 * 3600,
                min_resolution_seconds: 10,
                max_resolution_seconds: 3600,
                base_uncertainty_meters: 50.0,
                uncertainty_growth_rate: 0.5,
            },
        }
    }

    async fn predict_from_flight_plan(
        &self,
        state: &EntityState,
        flight_plan: &FlightPlan,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        if flight_plan.waypoints.is_empty() {
            return self.predict_from_vector(state, from_time_ms, to_time_ms, resolution_seconds).await;
        }

        let mut wp_index = closest_waypoint(&state.position, flight_plan);
        let speed_knots = state.velocity.map_or(450.0, |v| v.speed);
        let speed_ms = speed_knots * KNOTS_TO_MS;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let mut current_alt = state.position.altitude.unwrap_or(35_000.0 * FEET_TO_M);
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let Some(next_wp) = flight_plan.waypoints.get(wp_index + 1) else {
                let heading = state.velocity.map_or(0.0, |v| v.heading);
                predictions.extend(self.extrapolate_to_end(
                    state, &current_pos, current_alt, speed_ms, heading, current_time_ms, to_time_ms, resolution_seconds,
                ));
                break;
            };
            let next_pos = next_wp.position();
            let dist = crep_geodesy::distance(&current_pos, &next_pos);
            let time_to_wp_s = if speed_ms > 0.0 { dist / speed_ms } else { f64::INFINITY };

            let mut elapsed = 0.0;
            while elapsed < time_to_wp_s && current_time_ms <= to_time_ms {
                let fraction = if time_to_wp_s > 0.0 { elapsed / time_to_wp_s } else { 0.0 };
                let mut pos = crep_geodesy::interpolate(&current_pos, &next_pos, fraction);
                pos.altitude = Some(match next_pos.altitude {
                    Some(wp_alt) => current_alt + fraction * (wp_alt - current_alt),
                    None => current_alt,
                });

                let heading = crep_geodesy::bearing(&current_pos, &next_pos);
                let climb_rate = next_pos.altitude.map(|wp_alt| {
                    if time_to_wp_s > 0.0 {
                        (wp_alt - current_alt) / time_to_wp_s
                    } else {
                        0.0
                    }
                });

                predictions.push(PredictedPosition {
                    entity_id: state.entity_id.clone(),
                    entity_type: EntityType::Aircraft,
                    timestamp_ms: current_time_ms,
                    position: pos,
                    velocity: Some(Velocity { speed: speed_knots, heading, climb_rate }),
                    confidence: 1.0,
                    uncertainty: None,
                    prediction_source: Source::FlightPlan,
                    model_version: self.params.model_version.clone(),
                    metadata: Default::default(),
                    created_at: Utc::now(),
                });

                current_time_ms += step_ms;
                elapsed += resolution_seconds as f64;
            }

            current_pos = next_pos;
            current_alt = next_pos.altitude.unwrap_or(current_alt);
            wp_index += 1;
        }

        predictions
    }

    #[allow(clippy::too_many_arguments)]
    fn extrapolate_to_end(
        &self,
        state: &EntityState,
        from_pos: &GeoPoint,
        altitude: f64,
        speed_ms: f64,
        heading: f64,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut pos = *from_pos;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let distance = speed_ms * resolution_seconds as f64;
            pos = crep_geodesy::destination(&pos, heading, distance);
            pos.altitude = Some(altitude);

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Aircraft,
                timestamp_ms: current_time_ms,
                position: pos,
                velocity: Some(Velocity::new(speed_ms / KNOTS_TO_MS, heading)),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::Extrapolation,
                model_version: self.params.model_version.clone(),
                metadata: Default::default(),
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
        }

        predictions
    }

    async fn predict_from_vector(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let Some(velocity) = state.velocity else {
            warn!(entity_id = %state.entity_id, "no velocity data for aircraft");
            return Vec::new();
        };

        let speed_ms = velocity.speed * KNOTS_TO_MS;
        let heading = velocity.heading;
        let climb_rate = velocity.climb_rate.unwrap_or(0.0);

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let mut current_alt = state.position.altitude.unwrap_or(10_000.0 * FEET_TO_M);
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let distance = speed_ms * resolution_seconds as f64;
            let mut new_pos = crep_geodesy::destination(&current_pos, heading, distance);
            let new_alt = (current_alt + climb_rate * resolution_seconds as f64).clamp(0.0, 45_000.0 * FEET_TO_M);
            new_pos.altitude = Some(new_alt);

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Aircraft,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: Some(Velocity { speed: velocity.speed, heading, climb_rate: Some(climb_rate) }),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::Extrapolation,
                model_version: self.params.model_version.clone(),
                metadata: Default::default(),
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
            current_alt = new_alt;
        }

        predictions
    }
}

fn closest_waypoint(current_pos: &GeoPoint, flight_plan: &FlightPlan) -> usize {
    flight_plan
        .waypoints
        .iter()
        .enumerate()
        .map(|(i, wp)| (i, crep_geodesy::distance(current_pos, &wp.position())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(i, _)| i)
}

#[async_trait]
impl Predictor for AircraftPredictor {
    fn entity_type(&self) -> EntityType {
        EntityType::Aircraft
    }

    fn params(&self) -> &PredictorParams {
        &self.params
    }

    async fn get_current_state(&self, entity_id: &str) -> Option<EntityState> {
        let cache = self.cache.as_ref()?;
        let query = TimelineQuery {
            entity_type: Some(EntityType::Aircraft),
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
        match &state.flight_plan {
            Some(plan) => self.predict_from_flight_plan(state, plan, from_time_ms, to_time_ms, resolution_seconds).await,
            None => self.predict_from_vector(state, from_time_ms, to_time_ms, resolution_seconds).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::BasePredictor;
    use crep_types::{PredictionRequest, Velocity};

    fn cruising_state() -> EntityState {
        EntityState {
            entity_id: "N12345".to_string(),
            entity_type: EntityType::Aircraft,
            timestamp_ms: 1_700_000_000_000,
            position: GeoPoint::with_altitude(47.45, -122.30, 10_000.0),
            velocity: Some(Velocity { speed: 450.0, heading: 90.0, climb_rate: Some(0.0) }),
            flight_plan: None,
            destination: None,
            tle_line1: None,
            tle_line2: None,
            species: None,
            metadata: Default::default(),
        }
    }

    struct FixedStatePredictor(AircraftPredictor, EntityState);

    #[async_trait]
    impl Predictor for FixedStatePredictor {
        fn entity_type(&self) -> EntityType {
            self.0.entity_type()
        }
        fn params(&self) -> &PredictorParams {
            self.0.params()
        }
        async fn get_current_state(&self, _entity_id: &str) -> Option<EntityState> {
            Some(self.1.clone())
        }
        async fn predict_positions(
            &self,
            state: &EntityState,
            from_time_ms: i64,
            to_time_ms: i64,
            resolution_seconds: i64,
        ) -> Vec<PredictedPosition> {
            self.0.predict_positions(state, from_time_ms, to_time_ms, resolution_seconds).await
        }
    }

    #[tokio::test]
    async fn vector_extrapolation_moves_east_and_decays_confidence() {
        let state = cruising_state();
        let predictor = BasePredictor::new(FixedStatePredictor(AircraftPredictor::new(None), state.clone()));

        let request = PredictionRequest {
            entity_type: EntityType::Aircraft,
            entity_id: state.entity_id.clone(),
            from_time_ms: state.timestamp_ms,
            to_time_ms: state.timestamp_ms + 600_000,
            resolution_seconds: 60,
            include_uncertainty: true,
        };

        let result = predictor.predict(request).await.unwrap();
        assert!(!result.predictions.is_empty());
        let first = &result.predictions[0];
        let last = result.predictions.last().unwrap();
        assert!(last.position.lng > first.position.lng);
        assert!(last.confidence <= first.confidence);
        assert!(last.uncertainty.unwrap().radius_meters > first.uncertainty.unwrap().radius_meters);
    }

    #[tokio::test]
    async fn wrong_entity_type_is_rejected() {
        let predictor = BasePredictor::new(AircraftPredictor::new(None));
        let request = PredictionRequest {
            entity_type: EntityType::Vessel,
            entity_id: "X".to_string(),
            from_time_ms: 0,
            to_time_ms: 60_000,
            resolution_seconds: 60,
            include_uncertainty: false,
        };
        assert!(predictor.predict(request).await.is_err());
    }

    #[tokio::test]
    async fn missing_state_reports_zero_predictions_with_warning() {
        let predictor = BasePredictor::new(AircraftPredictor::new(None));
        let request = PredictionRequest {
            entity_type: EntityType::Aircraft,
            entity_id: "N00000".to_string(),
            from_time_ms: 0,
            to_time_ms: 60_000,
            resolution_seconds: 60,
            include_uncertainty: false,
        };
        let result = predictor.predict(request).await.unwrap();
        assert!(result.predictions.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }
}
