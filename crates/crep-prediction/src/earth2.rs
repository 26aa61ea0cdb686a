use crate::error::Result;
use chrono::{DateTime, Timelike, Utc};
use crep_types::GeoPoint;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_GPU_GATEWAY_URL: &str = "http://localhost:8100";
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const FORECAST_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One entry in the Earth-2 model catalogue: resolution and maximum
/// forecast horizon, mirroring the upstream gateway's `/models` listing.
#[derive(Debug, Clone, Copy)]
pub struct ModelInfo {
    pub name: &'static str,
    pub resolution_km: u32,
    pub max_horizon_hours: u32,
}

/// Known forecast models, matching `GET /models` on the reference
/// GPU gateway. Unknown model names are passed through to the
/// gateway as-is; this table is advisory, not validated against.
pub fn model_info(model: &str) -> Option<ModelInfo> {
    match model {
        "fcn" => Some(ModelInfo { name: "FourCastNet", resolution_km: 25, max_horizon_hours: 240 }),
        "pangu" => Some(ModelInfo { name: "Pangu-Weather", resolution_km: 25, max_horizon_hours: 168 }),
        "graphcast" => Some(ModelInfo { name: "GraphCast", resolution_km: 28, max_horizon_hours: 240 }),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub precipitation_probability: f64,
    pub wind_speed_kmh: f64,
    pub wind_direction_deg: f64,
    pub cloud_cover_percent: f64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StormTrack {
    pub storm_id: String,
    pub path: Vec<GeoPoint>,
    pub max_wind_kmh: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WildfireRing {
    pub hour: u32,
    pub timestamp: DateTime<Utc>,
    pub center: GeoPoint,
    pub downwind_radius_km: f64,
    pub crosswind_radius_km: f64,
    pub upwind_radius_km: f64,
    pub area_km2: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastEnvelope {
    #[serde(default)]
    forecasts: Vec<WeatherForecastPoint>,
}

#[derive(Debug, Deserialize)]
struct StormEnvelope {
    #[serde(default)]
    storms: Vec<StormTrack>,
}

/// Adapter over an external GPU-backed weather forecasting service
/// (the reference deployment runs NVIDIA Earth-2 / Earth2Studio
/// models behind a small HTTP gateway). Falls back to a synthetic
/// generator for point weather when the gateway is unreachable;
/// wildfire spread is always computed locally; storm tracks have no
/// synthetic fallback.
pub struct Earth2Forecaster {
    client: reqwest::Client,
    gateway_url: String,
    available: bool,
}

impl Earth2Forecaster {
    /// Probes the gateway's health endpoint once at construction time.
    /// `available()` reflects that one-shot check for the lifetime of
    /// this instance; it is not re-probed per call.
    pub async fn new() -> Self {
        let gateway_url = env::var("GPU_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GPU_GATEWAY_URL.to_string());
        let client = reqwest::Client::new();

        let available = match client
            .get(format!("{gateway_url}/health"))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(gateway_url = %gateway_url, "earth-2 gpu gateway available");
                true
            }
            Ok(response) => {
                warn!(gateway_url = %gateway_url, status = %response.status(), "earth-2 health probe returned non-success");
                false
            }
            Err(err) => {
                warn!(gateway_url = %gateway_url, error = %err, "earth-2 gpu gateway unavailable");
                false
            }
        };

        Self { client, gateway_url, available }
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub async fn get_weather_forecast(
        &self,
        location: GeoPoint,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
        resolution_hours: i64,
        model: &str,
    ) -> Vec<WeatherForecastPoint> {
        if self.available {
            match self.fetch_weather_forecast(location, from_time, to_time, resolution_hours, model).await {
                Ok(forecasts) if !forecasts.is_empty() => return forecasts,
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to fetch earth-2 forecast, generating synthetic"),
            }
        }
        generate_synthetic_weather(location, from_time, to_time, resolution_hours)
    }

    async fn fetch_weather_forecast(
        &self,
        location: GeoPoint,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
        resolution_hours: i64,
        model: &str,
    ) -> Result<Vec<WeatherForecastPoint>> {
        let response = self
            .client
            .post(format!("{}/forecast/point", self.gateway_url))
            .json(&serde_json::json!({
                "lat": location.lat,
                "lng": location.lng,
                "from_time": from_time.to_rfc3339(),
                "to_time": to_time.to_rfc3339(),
                "resolution_hours": resolution_hours,
                "model": model,
            }))
            .timeout(FORECAST_FETCH_TIMEOUT)
            .send()
            .await?;

        let envelope: ForecastEnvelope = response.json().await?;
        Ok(envelope.forecasts)
    }

    /// Storm tracks have no synthetic fallback: a single-location
    /// sinusoid cannot usefully approximate multi-entity regional
    /// track data, so unavailability yields an empty list.
    pub async fn get_storm_tracks(
        &self,
        bbox: (f64, f64, f64, f64),
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
    ) -> Vec<StormTrack> {
        if !self.available {
            return Vec::new();
        }

        let (min_lat, min_lng, max_lat, max_lng) = bbox;
        let result = self
            .client
            .post(format!("{}/forecast/storms", self.gateway_url))
            .json(&serde_json::json!({
                "bounds": {"min_lat": min_lat, "min_lng": min_lng, "max_lat": max_lat, "max_lng": max_lng},
                "from_time": from_time.to_rfc3339(),
                "to_time": to_time.to_rfc3339(),
            }))
            .timeout(FORECAST_FETCH_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => match response.json::<StormEnvelope>().await {
                Ok(envelope) => envelope.storms,
                Err(err) => {
                    warn!(error = %err, "failed to parse storm track response");
                    Vec::new()
                }
            },
            Err(err) => {
                warn!(error = %err, "failed to fetch storm tracks");
                Vec::new()
            }
        }
    }

    /// Always computed locally from wind/fuel conditions; never calls
    /// the external gateway.
    pub fn get_wildfire_spread(
        &self,
        fire_location: GeoPoint,
        wind_speed_kmh: f64,
        wind_direction_deg: f64,
        fuel_moisture: f64,
        hours_ahead: u32,
    ) -> Vec<WildfireRing> {
        let base_spread_rate_kmh = 0.5;
        let wind_factor = 1.0 + wind_speed_kmh / 20.0;
        let moisture_factor = 1.0 - fuel_moisture;
        let spread_rate = base_spread_rate_kmh * wind_factor * moisture_factor;

        let now = Utc::now();
        (1..=hours_ahead)
            .map(|hour| {
                let downwind = spread_rate * hour as f64 * 1.5;
                let crosswind = spread_rate * hour as f64 * 0.5;
                let upwind = spread_rate * hour as f64 * 0.2;
                WildfireRing {
                    hour,
                    timestamp: now + chrono::Duration::hours(hour as i64),
                    center: fire_location,
                    downwind_radius_km: downwind,
                    crosswind_radius_km: crosswind,
                    upwind_radius_km: upwind,
                    area_km2: std::f64::consts::PI * downwind * crosswind,
                }
            })
            .collect()
    }

    /// Returns `None` when the gateway is unreachable or the tile is
    /// missing; there is no synthetic tile image.
    pub async fn get_forecast_tile(&self, variable: &str, time: DateTime<Utc>, zoom: u32, tile_x: u32, tile_y: u32, model: &str) -> Option<Vec<u8>> {
        if !self.available {
            return None;
        }

        let response = self
            .client
            .get(format!("{}/forecast/tiles/{model}/{variable}", self.gateway_url))
            .query(&[("time", time.to_rfc3339()), ("z", zoom.to_string()), ("x", tile_x.to_string()), ("y", tile_y.to_string())])
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.bytes().await.ok().map(|b| b.to_vec())
    }
}

fn generate_synthetic_weather(location: GeoPoint, from_time: DateTime<Utc>, to_time: DateTime<Utc>, resolution_hours: i64) -> Vec<WeatherForecastPoint> {
    let mut rng = rand::thread_rng();
    let base_temp = 15.0 + 20.0 * location.lat.to_radians().cos();

    let mut forecasts = Vec::new();
    let mut current_time = from_time;
    let step = chrono::Duration::hours(resolution_hours.max(1));

    while current_time <= to_time {
        let hour = current_time.hour() as f64;
        let temp_variation = 5.0 * ((hour - 6.0) * 15.0).to_radians().sin();
        let random_var: f64 = rng.gen_range(-4.0..4.0);
        let temperature = base_temp + temp_variation + random_var;

        let precip_prob = 0.1 + 0.2 * rng.gen_range(0.0..1.0);
        let precipitation = if rng.gen_range(0.0..1.0) < precip_prob { precip_prob * rng.gen_range(0.0..10.0) } else { 0.0 };

        let wind_speed = 5.0 + rng.gen_range(0.0..15.0);
        let wind_direction = rng.gen_range(0.0..360.0);

        forecasts.push(WeatherForecastPoint {
            timestamp: current_time,
            location,
            temperature_c: (temperature * 10.0).round() / 10.0,
            precipitation_mm: (precipitation * 10.0).round() / 10.0,
            precipitation_probability: (precip_prob * 100.0).round() / 100.0,
            wind_speed_kmh: (wind_speed * 10.0).round() / 10.0,
            wind_direction_deg: wind_direction.round(),
            cloud_cover_percent: rng.gen_range(0.0..100.0).round(),
            model: "synthetic".to_string(),
        });

        current_time += step;
    }

    forecasts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_catalogue_known_entries() {
        let fcn = model_info("fcn").unwrap();
        assert_eq!(fcn.max_horizon_hours, 240);
        assert!(model_info("unknown-model").is_none());
    }

    #[test]
    fn synthetic_weather_spans_requested_window() {
        let from = Utc::now();
        let to = from + chrono::Duration::hours(6);
        let forecasts = generate_synthetic_weather(GeoPoint::new(10.0, 10.0), from, to, 1);
        assert_eq!(forecasts.len(), 7);
    }

    #[test]
    fn wildfire_spread_grows_with_hour() {
        let forecaster_rings = {
            let base_spread_rate_kmh = 0.5 * (1.0 + 10.0 / 20.0) * (1.0 - 0.3);
            (1..=3).map(|h| base_spread_rate_kmh * h as f64 * 1.5).collect::<Vec<_>>()
        };
        assert!(forecaster_rings[2] > forecaster_rings[0]);
    }
}
