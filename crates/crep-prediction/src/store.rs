use crate::error::Result;
use chrono::{DateTime, Utc};
use crep_types::{EntityType, GeoPoint, PredictedPosition, PredictionResult, Source, Velocity};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::env;
use std::str::FromStr;
use tokio_postgres::NoTls;
use tracing::{info, warn};

const DEFAULT_MAX_POOL_SIZE: usize = 10;
const MIN_POOL_SIZE: usize = 2;

/// One table per persisted stream, shared by ground-truth history and
/// forecast rows alike, distinguished only by the `source` column.
fn table_for(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Aircraft => "aircraft_tracks",
        EntityType::Vessel => "vessel_tracks",
        EntityType::Satellite => "satellite_tracks",
        EntityType::Wildlife => "wildlife_observations",
        EntityType::Earthquake | EntityType::Wildfire | EntityType::Storm => "environmental_events",
        EntityType::Weather => "earth2_forecasts",
    }
}

/// Persists predicted positions alongside ground-truth history in the
/// same per-entity-class tables, and mirrors reads/writes through the
/// same `source` discriminator the cache tiers use.
pub struct PredictionStore {
    pool: Pool,
}

impl PredictionStore {
    pub async fn new() -> Result<Self> {
        let mut config = Config::new();
        config.host = Some(env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string()));
        config.port = Some(env::var("POSTGRES_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(5432));
        config.user = Some(env::var("POSTGRES_USER").unwrap_or_else(|_| "postgres".to_string()));
        config.password = Some(env::var("POSTGRES_PASSWORD").unwrap_or_default());
        config.dbname = Some(env::var("POSTGRES_DB").unwrap_or_else(|_| "mycosoft".to_string()));
        config.manager = Some(ManagerConfig { recycling_method: RecyclingMethod::Fast });
        config.pool = Some(PoolConfig::new(DEFAULT_MAX_POOL_SIZE));

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;
        info!(min_size = MIN_POOL_SIZE, max_size = DEFAULT_MAX_POOL_SIZE, "prediction store pool created");
        Ok(Self { pool })
    }

    /// Writes predicted positions. When `replace_existing`, first
    /// deletes existing forecast-source rows for the same entity in
    /// `[from_time, to_time]` — never touching `live`/`historical`
    /// rows — then inserts in chunks of 100.
    pub async fn store_predictions(&self, result: &PredictionResult, replace_existing: bool) -> Result<usize> {
        if result.predictions.is_empty() {
            return Ok(0);
        }

        let table = table_for(result.entity_type);
        let mut client = self.pool.get().await?;

        if replace_existing {
            let from_time_ms = result.predictions.iter().map(|p| p.timestamp_ms).min().unwrap_or(0);
            let to_time_ms = result.predictions.iter().map(|p| p.timestamp_ms).max().unwrap_or(0);
            let forecast_sources: Vec<&str> = all_forecast_sources().iter().map(Source::as_str).collect();

            let delete_sql = format!(
                "DELETE FROM {table} WHERE entity_id = $1 AND timestamp_ms BETWEEN $2 AND $3 AND source = ANY($4)"
            );
            client.execute(&delete_sql, &[&result.entity_id, &from_time_ms, &to_time_ms, &forecast_sources]).await?;
        }

        let transaction = client.transaction().await?;
        let mut written = 0;

        for chunk in result.predictions.chunks(100) {
            for prediction in chunk {
                let insert_sql = format!(
                    "INSERT INTO {table} (entity_id, entity_type, timestamp_ms, lat, lng, altitude, speed, heading, confidence, source, model_version, metadata, created_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                     ON CONFLICT (entity_id, timestamp_ms) DO UPDATE SET \
                     lat = EXCLUDED.lat, lng = EXCLUDED.lng, altitude = EXCLUDED.altitude, \
                     confidence = EXCLUDED.confidence, source = EXCLUDED.source"
                );
                transaction
                    .execute(
                        &insert_sql,
                        &[
                            &prediction.entity_id,
                            &prediction.entity_type.as_str(),
                            &prediction.timestamp_ms,
                            &prediction.position.lat,
                            &prediction.position.lng,
                            &prediction.position.altitude,
                            &prediction.velocity.map(|v| v.speed),
                            &prediction.velocity.map(|v| v.heading),
                            &prediction.confidence,
                            &prediction.prediction_source.as_str(),
                            &prediction.model_version,
                            &serde_json::to_value(&prediction.metadata).unwrap_or(serde_json::Value::Null),
                            &prediction.created_at,
                        ],
                    )
                    .await?;
                written += 1;
            }
        }

        transaction.commit().await?;
        Ok(written)
    }

    /// Returns forecast-tagged rows in `[from_time, to_time]`, ordered
    /// by timestamp, for a single entity.
    pub async fn get_predictions(&self, entity_type: EntityType, entity_id: &str, from_time_ms: i64, to_time_ms: i64, limit: i64) -> Result<Vec<PredictedPosition>> {
        let table = table_for(entity_type);
        let client = self.pool.get().await?;
        let forecast_sources: Vec<&str> = all_forecast_sources().iter().map(Source::as_str).collect();

        let query_sql = format!(
            "SELECT entity_id, entity_type, timestamp_ms, lat, lng, altitude, speed, heading, confidence, source, model_version, metadata, created_at \
             FROM {table} WHERE entity_id = $1 AND timestamp_ms BETWEEN $2 AND $3 AND source = ANY($4) \
             ORDER BY timestamp_ms ASC LIMIT $5"
        );
        let rows = client
            .query(&query_sql, &[&entity_id, &from_time_ms, &to_time_ms, &forecast_sources, &limit])
            .await?;

        Ok(rows.iter().filter_map(row_to_prediction).collect())
    }

    /// Deletes forecast-source rows older than `older_than`. Returns
    /// the number of rows removed.
    pub async fn cleanup_old_predictions(&self, entity_type: EntityType, older_than: DateTime<Utc>) -> Result<u64> {
        let table = table_for(entity_type);
        let client = self.pool.get().await?;
        let forecast_sources: Vec<&str> = all_forecast_sources().iter().map(Source::as_str).collect();

        let delete_sql = format!("DELETE FROM {table} WHERE created_at < $1 AND source = ANY($2)");
        let deleted = client.execute(&delete_sql, &[&older_than, &forecast_sources]).await?;
        if deleted > 0 {
            warn!(table, deleted, "cleaned up stale forecast rows");
        }
        Ok(deleted)
    }
}

fn all_forecast_sources() -> Vec<Source> {
    [
        Source::Forecast,
        Source::Extrapolation,
        Source::FlightPlan,
        Source::OrbitPropagation,
        Source::RoutePlan,
        Source::MigrationModel,
        Source::Earth2Forecast,
        Source::Statistical,
        Source::HazardModel,
    ]
    .into_iter()
    .collect()
}

fn parse_source(s: &str) -> Option<Source> {
    match s {
        "live" => Some(Source::Live),
        "historical" => Some(Source::Historical),
        "forecast" => Some(Source::Forecast),
        "cached" => Some(Source::Cached),
        "extrapolation" => Some(Source::Extrapolation),
        "flight_plan" => Some(Source::FlightPlan),
        "orbit_propagation" => Some(Source::OrbitPropagation),
        "route_plan" => Some(Source::RoutePlan),
        "migration_model" => Some(Source::MigrationModel),
        "earth2_forecast" => Some(Source::Earth2Forecast),
        "statistical" => Some(Source::Statistical),
        "hazard_model" => Some(Source::HazardModel),
        _ => None,
    }
}

fn row_to_prediction(row: &tokio_postgres::Row) -> Option<PredictedPosition> {
    let entity_type_str: String = row.try_get("entity_type").ok()?;
    let source_str: String = row.try_get("source").ok()?;
    let speed: Option<f64> = row.try_get("speed").ok().flatten();
    let heading: Option<f64> = row.try_get("heading").ok().flatten();

    Some(PredictedPosition {
        entity_id: row.try_get("entity_id").ok()?,
        entity_type: EntityType::from_str(&entity_type_str).ok()?,
        timestamp_ms: row.try_get("timestamp_ms").ok()?,
        position: GeoPoint { lat: row.try_get("lat").ok()?, lng: row.try_get("lng").ok()?, altitude: row.try_get("altitude").ok() },
        velocity: match (speed, heading) {
            (Some(speed), Some(heading)) => Some(Velocity::new(speed, heading)),
            _ => None,
        },
        confidence: row.try_get("confidence").ok()?,
        uncertainty: None,
        prediction_source: parse_source(&source_str).unwrap_or(Source::Forecast),
        model_version: row.try_get("model_version").ok()?,
        metadata: row
            .try_get::<_, Option<serde_json::Value>>("metadata")
            .ok()
            .flatten()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default(),
        created_at: row.try_get("created_at").ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_types_map_to_expected_tables() {
        assert_eq!(table_for(EntityType::Aircraft), "aircraft_tracks");
        assert_eq!(table_for(EntityType::Earthquake), "environmental_events");
        assert_eq!(table_for(EntityType::Wildfire), "environmental_events");
        assert_eq!(table_for(EntityType::Storm), "environmental_events");
        assert_eq!(table_for(EntityType::Weather), "earth2_forecasts");
    }

    #[test]
    fn forecast_source_set_excludes_ground_truth() {
        let sources = all_forecast_sources();
        assert!(!sources.contains(&Source::Live));
        assert!(!sources.contains(&Source::Historical));
        assert!(!sources.contains(&Source::Cached));
        assert_eq!(sources.len(), 9);
    }
}
