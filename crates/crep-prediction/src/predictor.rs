use crate::error::{PredictionError, Result};
use async_trait::async_trait;
use crep_types::{EntityState, EntityType, PredictedPosition, PredictionRequest, PredictionResult, Source, UncertaintyCone};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Tunables a concrete predictor exposes to the shared confidence-decay
/// and uncertainty-growth machinery in [`BasePredictor::predict`].
#[derive(Debug, Clone)]
pub struct PredictorParams {
    pub prediction_source: Source,
    pub model_version: String,
    pub initial_confidence: f64,
    pub confidence_half_life_seconds: f64,
    pub minimum_confidence: f64,
    pub max_prediction_horizon_seconds: i64,
    pub min_resolution_seconds: i64,
    pub max_resolution_seconds: i64,
    pub base_uncertainty_meters: f64,
    pub uncertainty_growth_rate: f64,
}

/// Domain-specific half of a predictor. Implementors supply state
/// lookup and the raw position projection; [`BasePredictor`] supplies
/// the request validation, caching, and confidence/uncertainty math
/// common to every entity class.
#[async_trait]
pub trait Predictor: Send + Sync {
    fn entity_type(&self) -> EntityType;
    fn params(&self) -> &PredictorParams;

    async fn get_current_state(&self, entity_id: &str) -> Option<EntityState>;

    async fn predict_positions(
        &self,
        state: &EntityState,
        from_time_ms: i64,
        to_time_ms: i64,
        resolution_seconds: i64,
    ) -> Vec<PredictedPosition>;
}

/// Exponential confidence decay: `C(t) = C0 * 0.5^(t/half_life)`,
/// floored at `minimum_confidence`.
pub fn calculate_confidence(age_seconds: f64, params: &PredictorParams) -> f64 {
    if age_seconds <= 0.0 {
        return params.initial_confidence;
    }
    let decay = 0.5f64.powf(age_seconds / params.confidence_half_life_seconds);
    (params.initial_confidence * decay).max(params.minimum_confidence)
}

/// Linear uncertainty growth: `radius = base + growth_rate * t`.
pub fn calculate_uncertainty(age_seconds: f64, params: &PredictorParams) -> UncertaintyCone {
    UncertaintyCone::new(params.base_uncertainty_meters + params.uncertainty_growth_rate * age_seconds)
}

fn apply_confidence_decay(predictions: &mut [PredictedPosition], reference_time_ms: i64, params: &PredictorParams) {
    for pred in predictions.iter_mut() {
        let age = (pred.timestamp_ms - reference_time_ms) as f64 / 1000.0;
        pred.confidence = calculate_confidence(age, params);
    }
}

fn apply_uncertainty_growth(predictions: &mut [PredictedPosition], reference_time_ms: i64, params: &PredictorParams) {
    for pred in predictions.iter_mut() {
        let age = (pred.timestamp_ms - reference_time_ms) as f64 / 1000.0;
        pred.uncertainty = Some(calculate_uncertainty(age, params));
    }
}

/// Wraps a concrete [`Predictor`] with the request pipeline every
/// entity class shares: validation, horizon/resolution clamping,
/// a short-lived per-request result cache, and confidence/uncertainty
/// post-processing.
pub struct BasePredictor<P> {
    inner: P,
    cache: Mutex<HashMap<String, (PredictionResult, Instant)>>,
    cache_ttl: Duration,
}

impl<P: Predictor> BasePredictor<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: Duration::from_secs(60),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResult> {
        let wall_start = Instant::now();

        if request.entity_type != self.inner.entity_type() {
            return Err(PredictionError::wrong_entity_type(request.entity_type.to_string()));
        }
        if request.resolution_seconds <= 0 {
            return Err(PredictionError::InvalidResolution(request.resolution_seconds));
        }

        let params = self.inner.params();
        let cache_key = format!(
            "{}:{}:{}:{}",
            request.entity_id, request.from_time_ms, request.to_time_ms, request.resolution_seconds
        );

        {
            let cache = self.cache.lock().await;
            if let Some((cached, inserted_at)) = cache.get(&cache_key) {
                if inserted_at.elapsed() < self.cache_ttl && !cached.predictions.is_empty() {
                    return Ok(cached.clone());
                }
            }
        }

        let mut warnings = Vec::new();
        let max_to_time_ms = request.from_time_ms + params.max_prediction_horizon_seconds * 1000;
        let to_time_ms = request.to_time_ms.min(max_to_time_ms);
        if to_time_ms < request.to_time_ms {
            warnings.push(format!(
                "prediction horizon clamped to {}s",
                params.max_prediction_horizon_seconds
            ));
        }

        let resolution_seconds = request
            .resolution_seconds
            .clamp(params.min_resolution_seconds, params.max_resolution_seconds);

        let state = self.inner.get_current_state(&request.entity_id).await;
        let Some(state) = state else {
            return Ok(PredictionResult {
                entity_id: request.entity_id,
                entity_type: request.entity_type,
                predictions: Vec::new(),
                source: params.prediction_source,
                model_version: params.model_version.clone(),
                computation_time_ms: wall_start.elapsed().as_secs_f64() * 1000.0,
                warnings: vec!["entity not found or no current state available".to_string()],
            });
        };

        let mut predictions = self
            .inner
            .predict_positions(&state, request.from_time_ms, to_time_ms, resolution_seconds)
            .await;

        apply_confidence_decay(&mut predictions, state.timestamp_ms, params);
        if request.include_uncertainty {
            apply_uncertainty_growth(&mut predictions, state.timestamp_ms, params);
        }

        let result = PredictionResult {
            entity_id: request.entity_id,
            entity_type: request.entity_type,
            predictions,
            source: params.prediction_source,
            model_version: params.model_version.clone(),
            computation_time_ms: wall_start.elapsed().as_secs_f64() * 1000.0,
            warnings,
        };

        let mut cache = self.cache.lock().await;
        if cache.len() > 4096 {
            warn!("prediction cache exceeded 4096 entries, clearing");
            cache.clear();
        }
        cache.insert(cache_key, (result.clone(), Instant::now()));
        Ok(result)
    }
}
