use crate::predictor::{Predictor, PredictorParams};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use crep_types::{EntityState, EntityType, PredictedPosition, Source, Velocity};
use rand::Rng;

struct MigrationPattern {
    month_start: u32,
    month_end: u32,
    direction: &'static str,
    lat_change: Option<f64>,
    lng_change: Option<f64>,
    end_lat: Option<f64>,
    end_lng: Option<f64>,
}

const fn lat(month_start: u32, month_end: u32, direction: &'static str, lat_change: f64) -> MigrationPattern {
    MigrationPattern { month_start, month_end, direction, lat_change: Some(lat_change), lng_change: None, end_lat: None, end_lng: None }
}

const fn lng(month_start: u32, month_end: u32, direction: &'static str, lng_change: f64) -> MigrationPattern {
    MigrationPattern { month_start, month_end, direction, lat_change: None, lng_change: Some(lng_change), end_lat: None, end_lng: None }
}

const fn target(month_start: u32, month_end: u32, direction: &'static str, end_lat: f64, end_lng: f64) -> MigrationPattern {
    MigrationPattern { month_start, month_end, direction, lat_change: None, lng_change: None, end_lat: Some(end_lat), end_lng: Some(end_lng) }
}

/// Known seasonal migration routes, keyed by species (lowercase,
/// spaces replaced with underscores). Month ranges may wrap the year
/// (e.g. `month_start > month_end` means "spans the new year").
fn migration_routes(species: &str) -> &'static [MigrationPattern] {
    const ARCTIC_TERN: &[MigrationPattern] = &[lat(8, 10, "south", -50.0), lat(3, 5, "north", 50.0)];
    const MONARCH_BUTTERFLY: &[MigrationPattern] =
        &[target(9, 11, "south", 19.5, -100.0), target(3, 5, "north", 45.0, -90.0)];
    const HUMPBACK_WHALE: &[MigrationPattern] = &[lat(10, 1, "equator", -30.0), lat(4, 7, "poles", 30.0)];
    const WILDEBEEST: &[MigrationPattern] = &[lat(1, 3, "south", -2.0), lat(5, 7, "north", 2.0), lng(8, 10, "west", -1.0)];

    match species {
        "arctic_tern" => ARCTIC_TERN,
        "monarch_butterfly" => MONARCH_BUTTERFLY,
        "humpback_whale" => HUMPBACK_WHALE,
        "wildebeest" => WILDEBEEST,
        _ => &[],
    }
}

fn species_speed_km_per_day(species: &str) -> f64 {
    match species {
        "elephant" => 20.0,
        "lion" => 10.0,
        "wildebeest" => 30.0,
        "zebra" => 25.0,
        "bird" => 200.0,
        "whale" => 100.0,
        "arctic_tern" => 500.0,
        "monarch_butterfly" => 80.0,
        "humpback_whale" => 50.0,
        _ => 15.0,
    }
}

fn normalize_species(species: &str) -> String {
    species.to_lowercase().replace(' ', "_")
}

fn active_migration(species: &str, time: DateTime<Utc>) -> Option<&'static MigrationPattern> {
    let month = time.month();
    migration_routes(species).iter().find(|pattern| {
        if pattern.month_start <= pattern.month_end {
            pattern.month_start <= month && month <= pattern.month_end
        } else {
            month >= pattern.month_start || month <= pattern.month_end
        }
    })
}

/// Box-Muller transform, matching the distribution of Python's
/// `random.gauss(mu, sigma)`.
fn gauss(rng: &mut impl Rng, mu: f64, sigma: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mu + sigma * z0
}

/// Predicts wildlife movement: known migration routes by season,
/// recent-trajectory continuation for tracked individuals, or a
/// behavioral random walk when nothing else is known. Substantially
/// less certain than the other entity classes.
pub struct WildlifePredictor {
    params: PredictorParams,
}

impl Default for WildlifePredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl WildlifePredictor {
    pub fn new() -> Self {
        Self {
            params: PredictorParams {
                prediction_source: Source::MigrationModel,
                model_version: "1.0.0".to_string(),
                initial_confidence: 0.70,
                confidence_half_life_seconds: 3600.0,
                minimum_confidence: 0.1,
                max_prediction_horizon_seconds: 7 * 86_400,
                min_resolution_seconds: 10,
                max_resolution_seconds: 3600,
                base_uncertainty_meters: 5000.0,
                uncertainty_growth_rate: 2.0,
            },
        }
    }

    fn predict_migration(
        &self,
        state: &EntityState,
        migration: &MigrationPattern,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let mut rng = rand::thread_rng();
        let species = state.species.clone().unwrap_or_else(|| "default".to_string());
        let speed_ms = species_speed_km_per_day(&normalize_species(&species)) * 1000.0 / 86_400.0;

        let heading = if let (Some(end_lat), Some(end_lng)) = (migration.end_lat, migration.end_lng) {
            crep_geodesy::bearing(&state.position, &crep_types::GeoPoint::new(end_lat, end_lng))
        } else if let Some(lat_change) = migration.lat_change {
            if lat_change > 0.0 { 0.0 } else { 180.0 }
        } else if let Some(lng_change) = migration.lng_change {
            if lng_change > 0.0 { 90.0 } else { 270.0 }
        } else {
            0.0
        };

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let jitter_heading = (heading + gauss(&mut rng, 0.0, 15.0)).rem_euclid(360.0);
            let jitter_speed = speed_ms * rng.gen_range(0.7..1.3);
            let distance = jitter_speed * resolution_seconds as f64;
            let new_pos = crep_geodesy::destination(&current_pos, jitter_heading, distance);

            let mut metadata = serde_json::Map::new();
            metadata.insert("species".to_string(), serde_json::Value::String(species.clone()));
            metadata.insert("migration_direction".to_string(), serde_json::Value::String(migration.direction.to_string()));

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Wildlife,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: Some(Velocity::new(jitter_speed, jitter_heading)),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::MigrationModel,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
        }

        predictions
    }

    fn predict_from_trajectory(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let mut rng = rand::thread_rng();
        let speed_ms = state.velocity.map_or(0.5, |v| v.speed);
        let mut heading = state.velocity.map_or_else(|| rng.gen_range(0.0..360.0), |v| v.heading);

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let jitter_heading = (heading + gauss(&mut rng, 0.0, 20.0)).rem_euclid(360.0);
            let jitter_speed = speed_ms * rng.gen_range(0.5..1.5);
            let distance = jitter_speed * resolution_seconds as f64;
            let new_pos = crep_geodesy::destination(&current_pos, jitter_heading, distance);

            let mut metadata = serde_json::Map::new();
            if let Some(species) = &state.species {
                metadata.insert("species".to_string(), serde_json::Value::String(species.clone()));
            }

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Wildlife,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: Some(Velocity::new(jitter_speed, jitter_heading)),
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::Extrapolation,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
            heading = (heading + gauss(&mut rng, 0.0, 5.0)).rem_euclid(360.0);
        }

        predictions
    }

    fn predict_random_walk(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let mut rng = rand::thread_rng();
        let species = state.species.clone().unwrap_or_else(|| "default".to_string());
        let speed_ms = species_speed_km_per_day(&normalize_species(&species)) * 0.3 * 1000.0 / 86_400.0;

        let mut heading = rng.gen_range(0.0..360.0);
        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let mut current_pos = state.position;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            heading = (heading + gauss(&mut rng, 0.0, 45.0)).rem_euclid(360.0);
            let step_speed = speed_ms * rng.gen_range(0.0..2.0);
            let distance = step_speed * resolution_seconds as f64;
            let new_pos = crep_geodesy::destination(&current_pos, heading, distance);

            let mut metadata = serde_json::Map::new();
            metadata.insert("species".to_string(), serde_json::Value::String(species.clone()));
            metadata.insert("method".to_string(), serde_json::Value::String("random_walk".to_string()));

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Wildlife,
                timestamp_ms: current_time_ms,
                position: new_pos,
                velocity: if step_speed > 0.0 { Some(Velocity::new(step_speed, heading)) } else { None },
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::Statistical,
                model_version: self.params.model_version.clone(),
                metadata,
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
            current_pos = new_pos;
        }

        predictions
    }
}

#[async_trait]
impl Predictor for WildlifePredictor {
    fn entity_type(&self) -> EntityType {
        EntityType::Wildlife
    }

    fn params(&self) -> &PredictorParams {
        &self.params
    }

    /// Wildlife observations never come from a cache lookup on their
    /// own; callers must supply the current state out of band.
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
        let species = state.species.clone().unwrap_or_else(|| "default".to_string());
        let normalized = normalize_species(&species);

        if let Some(migration) = active_migration(&normalized, DateTime::from_timestamp_millis(from_time_ms).unwrap_or_else(Utc::now)) {
            self.predict_migration(state, migration, from_time_ms, to_time_ms, resolution_seconds)
        } else if state.velocity.is_some() {
            self.predict_from_trajectory(state, from_time_ms, to_time_ms, resolution_seconds)
        } else {
            self.predict_random_walk(state, from_time_ms, to_time_ms, resolution_seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crep_types::GeoPoint;

    fn base_state() -> EntityState {
        EntityState {
            entity_id: "tag-1".to_string(),
            entity_type: EntityType::Wildlife,
            timestamp_ms: 0,
            position: GeoPoint::new(10.0, 10.0),
            velocity: None,
            flight_plan: None,
            destination: None,
            tle_line1: None,
            tle_line2: None,
            species: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn random_walk_used_when_no_species_or_velocity() {
        let predictor = WildlifePredictor::new();
        let predictions = predictor.predict_positions(&base_state(), 0, 3_600_000, 600).await;
        assert!(!predictions.is_empty());
    }

    #[tokio::test]
    async fn trajectory_continuation_used_when_velocity_present() {
        let predictor = WildlifePredictor::new();
        let mut state = base_state();
        state.velocity = Some(Velocity::new(5.0, 90.0));
        let predictions = predictor.predict_positions(&state, 0, 3_600_000, 600).await;
        assert!(predictions.iter().all(|p| p.velocity.is_some()));
    }

    #[test]
    fn known_species_speed_overrides_default() {
        assert_eq!(species_speed_km_per_day("elephant"), 20.0);
        assert_eq!(species_speed_km_per_day("unknown_species"), 15.0);
    }

    #[test]
    fn migration_pattern_handles_year_wrap() {
        let dec = DateTime::from_timestamp(1_735_689_600, 0).unwrap();
        let pattern = active_migration("humpback_whale", dec);
        assert!(pattern.is_some());
    }
}
