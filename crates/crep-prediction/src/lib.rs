//! Per-entity-class position prediction: confidence decay, uncertainty
//! growth, and the aircraft/vessel/satellite/wildlife/hazard predictors
//! that sit behind the shared [`predictor::BasePredictor`] pipeline.

mod aircraft;
mod earth2;
mod error;
mod hazard;
mod predictor;
mod satellite;
mod state;
mod store;
mod vessel;
mod wildlife;

pub use aircraft::AircraftPredictor;
pub use earth2::{Earth2Forecaster, ModelInfo, StormTrack, WeatherForecastPoint, WildfireRing, model_info};
pub use error::{PredictionError, Result};
pub use hazard::HazardPredictor;
pub use predictor::{BasePredictor, PredictorParams, Predictor, calculate_confidence, calculate_uncertainty};
pub use satellite::SatellitePredictor;
pub use state::entity_state_from_entry;
pub use store::PredictionStore;
pub use vessel::VesselPredictor;
pub use wildlife::WildlifePredictor;
