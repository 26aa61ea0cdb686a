use crate::error::PredictionError;
use crate::predictor::{Predictor, PredictorParams};
use crate::state::entity_state_from_entry;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use crep_cache::CacheManager;
use crep_types::{EntityState, EntityType, GeoPoint, PredictedPosition, Source, TimelineQuery, Velocity};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::warn;

const EARTH_RADIUS_KM: f64 = 6378.137;
const MU_KM3_S2: f64 = 398_600.4418;

#[derive(Debug, Clone)]
struct TleElements {
    inclination: f64,
    raan: f64,
    mean_anomaly: f64,
    mean_motion: f64,
    altitude_km: f64,
    epoch: DateTime<Utc>,
}

/// Fixed-column TLE parser (NORAD two-line element format). Line 2
/// columns follow the standard spec; line 1 supplies only the epoch.
fn parse_tle_elements(line1: &str, line2: &str) -> Result<TleElements, PredictionError> {
    let col = |s: &str, start: usize, end: usize| -> Result<&str, PredictionError> {
        s.get(start..end)
            .map(str::trim)
            .ok_or_else(|| PredictionError::malformed_tle(format!("line too short for columns {start}..{end}")))
    };
    let parse_f64 = |s: &str| -> Result<f64, PredictionError> {
        s.parse().map_err(|_| PredictionError::malformed_tle(format!("not a number: {s:?}")))
    };

    let inclination = parse_f64(col(line2, 8, 16)?)?;
    let raan = parse_f64(col(line2, 17, 25)?)?;
    let mean_anomaly = parse_f64(col(line2, 43, 51)?)?;
    let mean_motion = parse_f64(col(line2, 52, 63)?)?;

    let n_rad_per_sec = mean_motion * 2.0 * std::f64::consts::PI / 86_400.0;
    let semi_major_axis_km = (MU_KM3_S2 / (n_rad_per_sec * n_rad_per_sec)).cbrt();
    let altitude_km = semi_major_axis_km - EARTH_RADIUS_KM;

    let epoch_year: i32 = col(line1, 18, 20)?.parse().map_err(|_| PredictionError::malformed_tle("bad epoch year".to_string()))?;
    let epoch_day: f64 = parse_f64(col(line1, 20, 32)?)?;
    let full_year = if epoch_year < 57 { epoch_year + 2000 } else { epoch_year + 1900 };
    let epoch = Utc
        .with_ymd_and_hms(full_year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| PredictionError::malformed_tle("bad epoch".to_string()))?
        + Duration::milliseconds(((epoch_day - 1.0) * 86_400_000.0) as i64);

    Ok(TleElements { inclination, raan, mean_anomaly, mean_motion, altitude_km, epoch })
}

fn gmst_degrees(time: DateTime<Utc>) -> f64 {
    let jd = (time - Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).single().unwrap()).num_milliseconds() as f64
        / 86_400_000.0
        + 2_451_545.0;
    let t = (jd - 2_451_545.0) / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * (jd - 2_451_545.0) + 0.000_387_933 * t * t;
    gmst.rem_euclid(360.0)
}

fn eci_to_geodetic(r_km: Vector3<f64>, time: DateTime<Utc>) -> (f64, f64, f64) {
    let lst = gmst_degrees(time);
    let mut lng = r_km.y.atan2(r_km.x).to_degrees() - lst;
    lng = ((lng + 180.0).rem_euclid(360.0)) - 180.0;

    let r_xy = (r_km.x * r_km.x + r_km.y * r_km.y).sqrt();
    let lat = r_km.z.atan2(r_xy).to_degrees();

    let r_mag = r_km.norm();
    let alt_km = r_mag - EARTH_RADIUS_KM;

    (lat, lng, alt_km)
}

/// Predicts satellite positions via SGP4 orbit propagation from a TLE.
/// Falls back to a simplified circular-orbit ground-track model (tagged
/// with a `-simplified` model version suffix) if the TLE fails to parse
/// into valid SGP4 elements, or propagation errors at every requested
/// timestep.
pub struct SatellitePredictor {
    cache: Option<Arc<CacheManager>>,
    params: PredictorParams,
}

impl SatellitePredictor {
    pub fn new(cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            cache,
            params: PredictorParams {
                prediction_source: Source::OrbitPropagation,
                model_version: "1.0.0".to_string(),
                initial_confidence: 0.99,
                confidence_half_life_seconds: 86_400.0,
                minimum_confidence: 0.8,
                max_prediction_horizon_seconds: 7 * 86_400,
                min_resolution_seconds: 10,
                max_resolution_seconds: 3600,
                base_uncertainty_meters: 10.0,
                uncertainty_growth_rate: 0.001,
            },
        }
    }

    fn predict_with_sgp4(
        &self,
        state: &EntityState,
        line1: &str,
        line2: &str,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Option<Vec<PredictedPosition>> {
        let elements = sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes()).ok()?;
        let constants = sgp4::Constants::from_elements(&elements).ok()?;
        let epoch = elements.datetime.and_utc();

        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let step_ms = resolution_seconds * 1000;

        while current_time_ms <= to_time_ms {
            let current_time = DateTime::from_timestamp_millis(current_time_ms).unwrap_or(epoch);
            let minutes_since_epoch = (current_time - epoch).num_milliseconds() as f64 / 60_000.0;

            match constants.propagate(sgp4::MinutesSinceEpoch(minutes_since_epoch)) {
                Ok(prediction) => {
                    let r = Vector3::new(prediction.position[0], prediction.position[1], prediction.position[2]);
                    let v = Vector3::new(prediction.velocity[0], prediction.velocity[1], prediction.velocity[2]);
                    let (lat, lng, alt_km) = eci_to_geodetic(r, current_time);
                    let speed_km_s = v.norm();

                    predictions.push(PredictedPosition {
                        entity_id: state.entity_id.clone(),
                        entity_type: EntityType::Satellite,
                        timestamp_ms: current_time_ms,
                        position: GeoPoint::with_altitude(lat, lng, alt_km * 1000.0),
                        velocity: Some(Velocity::new(speed_km_s * 1000.0, 0.0)),
                        confidence: 1.0,
                        uncertainty: None,
                        prediction_source: Source::OrbitPropagation,
                        model_version: self.params.model_version.clone(),
                        metadata: Default::default(),
                        created_at: Utc::now(),
                    });
                }
                Err(err) => {
                    warn!(entity_id = %state.entity_id, error = %err, "sgp4 propagation step failed, skipping");
                }
            }

            current_time_ms += step_ms;
        }

        Some(predictions)
    }

    fn predict_simplified(
        &self,
        state: &EntityState,
        elements: &TleElements,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition> {
        let period_seconds = 86_400.0 / elements.mean_motion;
        let mut predictions = Vec::new();
        let mut current_time_ms = from_time_ms;
        let step_ms = resolution_seconds * 1000;
        let epoch_ms = elements.epoch.timestamp_millis();

        while current_time_ms <= to_time_ms {
            let dt_s = (current_time_ms - epoch_ms) as f64 / 1000.0;
            let mean_anomaly_deg = (elements.mean_anomaly + 360.0 * (dt_s / period_seconds)).rem_euclid(360.0);
            let theta = mean_anomaly_deg.to_radians();

            let lat = (elements.inclination.to_radians().sin() * theta.sin()).asin().to_degrees();
            let mut lng = (elements.raan + theta.to_degrees() - (dt_s / 86_400.0) * 360.985_647_366_29).rem_euclid(360.0);
            if lng > 180.0 {
                lng -= 360.0;
            }

            predictions.push(PredictedPosition {
                entity_id: state.entity_id.clone(),
                entity_type: EntityType::Satellite,
                timestamp_ms: current_time_ms,
                position: GeoPoint::with_altitude(lat, lng, elements.altitude_km * 1000.0),
                velocity: None,
                confidence: 1.0,
                uncertainty: None,
                prediction_source: Source::OrbitPropagation,
                model_version: format!("{}-simplified", self.params.model_version),
                metadata: Default::default(),
                created_at: Utc::now(),
            });

            current_time_ms += step_ms;
        }

        predictions
    }
}

#[async_trait]
impl Predictor for SatellitePredictor {
    fn entity_type(&self) -> EntityType {
        EntityType::Satellite
    }

    fn params(&self) -> &PredictorParams {
        &self.params
    }

    async fn get_current_state(&self, entity_id: &str) -> Option<EntityState> {
        let cache = self.cache.as_ref()?;
        let query = TimelineQuery {
            entity_type: Some(EntityType::Satellite),
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
        let (Some(line1), Some(line2)) = (&state.tle_line1, &state.tle_line2) else {
            warn!(entity_id = %state.entity_id, "no TLE data for satellite");
            return Vec::new();
        };

        if let Some(predictions) = self.predict_with_sgp4(state, line1, line2, from_time_ms, to_time_ms, resolution_seconds) {
            if !predictions.is_empty() {
                return predictions;
            }
        }

        match parse_tle_elements(line1, line2) {
            Ok(elements) => self.predict_simplified(state, &elements, from_time_ms, to_time_ms, resolution_seconds),
            Err(err) => {
                warn!(entity_id = %state.entity_id, error = %err, "failed to parse TLE, no prediction possible");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE1: &str = "1 25544U 98067A   24045.12345678  .00016717  00000-0  10270-3 0  9994";
    const LINE2: &str = "2 25544  51.6400 208.9163 0007417 297.7184 192.2590 15.49560561432234";

    #[test]
    fn parses_fixed_column_tle() {
        let elements = parse_tle_elements(LINE1, LINE2).unwrap();
        assert!((elements.inclination - 51.64).abs() < 0.01);
        assert!(elements.mean_motion > 15.0 && elements.mean_motion < 16.0);
        assert!(elements.altitude_km > 300.0 && elements.altitude_km < 500.0);
    }

    #[test]
    fn epoch_year_uses_century_pivot_57() {
        let elements = parse_tle_elements(LINE1, LINE2).unwrap();
        assert_eq!(elements.epoch.format("%Y").to_string(), "2024");
    }

    #[test]
    fn malformed_tle_is_rejected_not_panicked() {
        let result = parse_tle_elements("too short", "also short");
        assert!(result.is_err());
    }
}
