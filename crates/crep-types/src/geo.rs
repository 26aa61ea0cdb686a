use serde::{Deserialize, Serialize};

/// WGS84 latitude/longitude, optional altitude in meters. Negative
/// altitude is permitted (sub-sea entities).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, altitude: None }
    }

    pub fn with_altitude(lat: f64, lng: f64, altitude: f64) -> Self {
        Self { lat, lng, altitude: Some(altitude) }
    }
}

/// Scalar speed (unit documented by the producing predictor — knots for
/// aircraft/vessel, m/s elsewhere), heading in degrees clockwise from
/// true north, optional climb rate in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub speed: f64,
    pub heading: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub climb_rate: Option<f64>,
}

impl Velocity {
    pub fn new(speed: f64, heading: f64) -> Self {
        Self { speed, heading, climb_rate: None }
    }
}

/// Radius of positional uncertainty around a predicted point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyCone {
    pub radius_meters: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
}

impl UncertaintyCone {
    pub fn new(radius_meters: f64) -> Self {
        Self { radius_meters, altitude_meters: None }
    }
}
