use crate::predictor::{Predictor, PredictorParams};
use async_trait::async_trait;
use chrono::Utc;
use crep_types::{EntityState, EntityType, GeoPoint, PredictedPosition, Source, Velocity};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::warn;

fn meta_f64(state: &EntityState, key: &str, default: f64) -> f64 {
    state.metadata_f64(key).unwrap_or(default)
}

fn meta_str<'a>(state: &'a EntityState, key: &str, default: &'static str) -> String {
    state.metadata_str(key).unwrap_or(default).to_string()
}

/// Routes an environmental hazard to the model matching its
/// `metadata["hazard_type"]` tag: earthquake aftershocks (Omori's law),
/// wildfire spread, storm tracks, tsunami wave fronts, or volcanic ash
/// dispersion. Entity type on the returned positions reflects the
/// hazard, not the generic `entity_type` this predictor is registered
/// under.
pub struct HazardPredictor {
    params: PredictorParams,
}

impl Default for HazardPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardPredictor {
    pub fn new() -> Self {
        Self {
            params: PredictorParams {
                prediction_source: Source::HazardModel,
                model_version: "1.0.0".to_string(),
                initial_confidence: 0.60,
                confidence_half_life_seconds: 1800.0,
                minimum_confidence: 0.1,
                max_prediction_horizon_seconds: 72 * 3600,
                min_resolution_seconds: 10,
                max_resolution_seconds: 3600,
                base_uncertainty_meters: 0.0,
                uncertainty_growth_rate: 0.0,
            },
        }
    }

    fn predict_aftershocks(&self, state: &EntityState, from_time_ms: i64, to_time_ms: i64, resolution_seconds: i64) -> Vec<PredictedPosition> {
        let mut rng = rand::thread_rng();
        let magnitude = meta_f64(state, "magnitude", 6.0);
        let mainshock_time_ms = state.timestamp_ms;

        let k = 10f64.powf(magnitude - 3.5);
        let c = 0.1;
        let p = 1.1;
        let zone_radius_m = 10.0 * (magnitude - 4.0) * 1000.0;
        let max_aftershock_mag = magnitude - 1.2;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let t_days = (current_time_ms - mainshock_time_ms) as f64 / 86_400_000.0;
            let rate = if t_days > 0.0 { k / (c + t_days).powf(p) } else { k };
            let window_days = resolution_seconds as f64 / 86_400.0;
            let expected_count = rate * window_days;

            let distance = rng.gen_range(0.0..zone_radius_m.max(0.0));
            let bearing = rng.gen_range(0.0..360.0);
            let location = crep_geodesy::destination(&state.position, bearing, distance);
            let aftershock_mag = rng.gen_range((magnitude - 3.0).max(2.0)..max_aftershock_mag.max((magnitude - 3.0).max(2.0) + 0.01));

            let mut metadata = Map::new();
            metadata.insert("hazard_type".to_string(), Value::String("earthquake".to_string()));
            metadata.insert("type".to_string(), Value::String("aftershock".to_string()));
            metadata.insert("expected_magnitude".to_string(), serde_json::json!((aftershock_mag * 10.0).round() / 10.0));
            metadata.insert("expected_count".to_string(), serde_json::json!((expected_count * 1000.0).round() / 1000.0));
            metadata.insert("mainshock_id".to_string(), Value::String(state.entity_id.clone()));

            predictions.push(PredictedPosition {
                entity_id: format!("{}_aftershock_{}", state.entity_id, current_time_ms / 1000),
                entity_type: EntityType::Earthquake,
                timestamp_ms: current_time_ms,
                position: location,
                velocity: None,
                confidence: expected_count.min(0.8),
                uncertainty: None,
                prediction_source: Source::Statistical,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
        }

        predictions
    }

    fn predict_wildfire_spread(&self, state: &EntityState, from_time_ms: i64, to_time_ms: i64, resolution_seconds: i64) -> Vec<PredictedPosition> {
        let wind_speed_kmh = meta_f64(state, "wind_speed_kmh", 20.0);
        let wind_direction = meta_f64(state, "wind_direction", 180.0);
        let fuel_moisture = meta_f64(state, "fuel_moisture", 0.2);
        let mut current_area_ha = meta_f64(state, "area_hectares", 10.0);

        let base_rate_mps = 0.1;
        let wind_factor = 1.0 + wind_speed_kmh / 30.0;
        let moisture_factor = (1.0 - fuel_moisture * 2.0).max(0.1);
        let spread_rate = base_rate_mps * wind_factor * moisture_factor;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let mut current_perimeter_m = (current_area_ha * 10_000.0 / std::f64::consts::PI).sqrt() * 2.0 * std::f64::consts::PI;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let downwind_spread = spread_rate * resolution_seconds as f64 * 1.5;
            let crosswind_spread = spread_rate * resolution_seconds as f64 * 0.5;

            let center_shift = downwind_spread * 0.3;
            let new_center = crep_geodesy::destination(&current_pos, (wind_direction + 180.0).rem_euclid(360.0), center_shift);

            let avg_radius = (downwind_spread + crosswind_spread) / 2.0;
            let new_perimeter_m = current_perimeter_m + 2.0 * std::f64::consts::PI * avg_radius;
            let new_area_ha = (new_perimeter_m / (2.0 * std::f64::consts::PI)).powi(2) * std::f64::consts::PI / 10_000.0;

            let mut metadata = Map::new();
            metadata.insert("hazard_type".to_string(), Value::String("wildfire".to_string()));
            metadata.insert("area_hectares".to_string(), serde_json::json!((new_area_ha * 10.0).round() / 10.0));
            metadata.insert("perimeter_km".to_string(), serde_json::json!((new_perimeter_m / 1000.0 * 100.0).round() / 100.0));
            metadata.insert("spread_rate_mps".to_string(), serde_json::json!((spread_rate * 1000.0).round() / 1000.0));
            metadata.insert("wind_speed_kmh".to_string(), serde_json::json!(wind_speed_kmh));
            metadata.insert("wind_direction".to_string(), serde_json::json!(wind_direction));

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Wildfire,
                timestamp_ms: current_time_ms,
                position: new_center,
                velocity: None,
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::HazardModel,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_center;
            current_perimeter_m = new_perimeter_m;
            current_area_ha = new_area_ha;
        }

        predictions
    }

    fn predict_storm_track(&self, state: &EntityState, from_time_ms: i64, to_time_ms: i64, resolution_seconds: i64) -> Vec<PredictedPosition> {
        let storm_speed_kmh = state.velocity.map_or(20.0, |v| v.speed);
        let mut current_heading = state.velocity.map_or(315.0, |v| v.heading);
        let intensity = meta_str(state, "intensity", "tropical_storm");
        let mut wind_speed_kmh = meta_f64(state, "max_wind_kmh", 100.0);

        let speed_ms = storm_speed_kmh * 1000.0 / 3600.0;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            if current_pos.lat > 25.0 {
                current_heading = (current_heading + 0.5).rem_euclid(360.0);
            }

            let distance = speed_ms * resolution_seconds as f64;
            let new_pos = crep_geodesy::destination(&current_pos, current_heading, distance);

            if current_pos.lat > 30.0 {
                wind_speed_kmh *= 0.99;
            }

            let mut metadata = Map::new();
            metadata.insert("hazard_type".to_string(), Value::String("storm".to_string()));
            metadata.insert("intensity".to_string(), Value::String(intensity.clone()));
            metadata.insert("max_wind_kmh".to_string(), serde_json::json!(wind_speed_kmh.round()));

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Storm,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: Some(Velocity::new(storm_speed_kmh, current_heading)),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::HazardModel,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
        }

        predictions
    }

    fn predict_tsunami(&self, state: &EntityState, from_time_ms: i64, to_time_ms: i64, resolution_seconds: i64) -> Vec<PredictedPosition> {
        const WAVE_SPEED_MS: f64 = 200.0;
        let origin = state.position;

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let dt_s = (current_time_ms - state.timestamp_ms) as f64 / 1000.0;
            let radius_m = WAVE_SPEED_MS * dt_s;

            let mut bearing = 0.0;
            while bearing < 360.0 {
                let wave_point = crep_geodesy::destination(&origin, bearing, radius_m);

                let mut metadata = Map::new();
                metadata.insert("hazard_type".to_string(), Value::String("tsunami".to_string()));
                metadata.insert("wave_radius_km".to_string(), serde_json::json!((radius_m / 1000.0 * 10.0).round() / 10.0));
                metadata.insert("bearing".to_string(), serde_json::json!(bearing));
                metadata.insert("origin".to_string(), serde_json::json!({"lat": origin.lat, "lng": origin.lng}));

                predictions.push(PredictedPosition {
                    entity_id: format!("{}_front_{}", state.entity_id, bearing as i64),
                    entity_type: EntityType::Earthquake,
                    timestamp_ms: current_time_ms,
                    position: wave_point,
                    velocity: None,
                    confidence: 1.0,
                    uncertainty: None,
                    prediction_source: Source::HazardModel,
                    model_version: self.params.model_version.clone(),
                    metadata,
                    created_at: Utc::now(),
                });

                bearing += 30.0;
            }

            current_time_ms += step_ms;
        }

        predictions
    }

    fn predict_ash_cloud(&self, state: &EntityState, from_time_ms: i64, to_time_ms: i64, resolution_seconds: i64) -> Vec<PredictedPosition> {
        let wind_speed_ms = meta_f64(state, "wind_speed_ms", 15.0);
        let wind_direction = meta_f64(state, "wind_direction", 270.0);
        let eruption_height_m = meta_f64(state, "plume_height_m", 10_000.0);

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut cloud_center = state.position;
        let cloud_width_km = 5.0;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let distance = wind_speed_ms * resolution_seconds as f64;
            let new_center = crep_geodesy::destination(&cloud_center, (wind_direction + 180.0).rem_euclid(360.0), distance);

            let dt_hours = (current_time_ms - from_time_ms) as f64 / 3_600_000.0;
            let new_width_km = cloud_width_km + dt_hours * 2.0;
            let descent_rate_m_per_hour = 500.0;
            let current_height_m = (eruption_height_m - descent_rate_m_per_hour * dt_hours).max(1000.0);

            let mut metadata = Map::new();
            metadata.insert("hazard_type".to_string(), Value::String("volcanic_ash".to_string()));
            metadata.insert("cloud_width_km".to_string(), serde_json::json!((new_width_km * 10.0).round() / 10.0));
            metadata.insert("plume_height_m".to_string(), serde_json::json!(current_height_m.round()));
            metadata.insert("source_volcano".to_string(), Value::String(state.entity_id.clone()));

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Weather,
                timestamp_ms: current_time_ms,
                position: GeoPoint::with_altitude(new_center.lat, new_center.lng, current_height_m),
                velocity: Some(Velocity::new(wind_speed_ms, (wind_direction + 180.0).rem_euclid(360.0))),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::HazardModel,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            cloud_center = new_center;
        }

        predictions
    }
}

#[async_trait]
impl Predictor for HazardPredictor {
    fn entity_type(&self) -> EntityType {
        EntityType::Earthquake
    }

    fn params(&self) -> &PredictorParams {
        &self.params
    }

    async fn get_current_state(&self, _entity_id: &str) -> Option<EntityState> {
        None
    }

    async fn predict_positions(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let hazard_type = meta_str(state, "hazard_type", "generic");

        match hazard_type.as_str() {
            "earthquake" => self.predict_aftershocks(state, from_time_ms, to_time_ms, resolution_seconds),
            "wildfire" => self.predict_wildfire_spread(state, from_time_ms, to_time_ms, resolution_seconds),
            "storm" => self.predict_storm_track(state, from_time_ms, to_time_ms, resolution_seconds),
            "tsunami" => self.predict_tsunami(state, from_time_ms, to_time_ms, resolution_seconds),
            "volcano" => self.predict_ash_cloud(state, from_time_ms, to_time_ms, resolution_seconds),
            other => {
                warn!(hazard_type = %other, "unknown hazard type");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crep_types::GeoPoint;

    fn hazard_state(hazard_type: &str) -> EntityState {
        let mut metadata = Map::new();
        metadata.insert("hazard_type".to_string(), Value::String(hazard_type.to_string()));
        EntityState {
            entity_id: "hz-1".to_string(),
            entity_type: EntityType::Earthquake,
            timestamp_ms: 0,
            position: GeoPoint::new(35.0, 139.0),
            velocity: None,
            flight_plan: None,
            destination: None,
            tle_line1: None,
            tle_line2: None,
            species: None,
            metadata,
        }
    }

    #[tokio::test]
    async fn unknown_hazard_type_returns_empty_not_error() {
        let predictor = HazardPredictor::new();
        let state = hazard_state("volcano_unknown_variant");
        let predictions = predictor.predict_positions(&state, 0, 3_600_000, 600).await;
        assert!(predictions.is_empty());
    }

    #[tokio::test]
    async fn earthquake_generates_aftershocks_tagged_with_mainshock_id() {
        let predictor = HazardPredictor::new();
        let mut state = hazard_state("earthquake");
        state.metadata.insert("magnitude".to_string(), serde_json::json!(6.5));
        let predictions = predictor.predict_positions(&state, 0, 3_600_000, 600).await;
        assert!(!predictions.is_empty());
        assert!(predictions.iter().all(|p| p.metadata.get("mainshock_id").and_then(Value::as_str) == Some("hz-1")));
    }

    #[tokio::test]
    async fn tsunami_generates_twelve_points_per_timestep() {
        let predictor = HazardPredictor::new();
        let state = hazard_state("tsunami");
        let predictions = predictor.predict_positions(&state, 0, 0, 600).await;
        assert_eq!(predictions.len(), 12);
    }
}
