use crep_types::{EntityState, FlightPlan, GeoPoint, TimelineEntry, Velocity, Waypoint};
use serde_json::Value;

/// Reconstructs an [`EntityState`] from a cache tier's opaque
/// `TimelineEntry::data`. By convention (SPEC_FULL §4.6) that payload
/// carries `position`, optional `velocity`, and whichever class-specific
/// fields the producing ingest source attached.
pub fn entity_state_from_entry(entry: &TimelineEntry) -> EntityState {
    let data = &entry.data;
    EntityState {
        entity_id: entry.entity_id.clone(),
        entity_type: entry.entity_type,
        timestamp_ms: entry.timestamp_ms,
        position: parse_position(data.get("position")),
        velocity: data.get("velocity").and_then(parse_velocity),
        flight_plan: data.get("flight_plan").and_then(parse_flight_plan),
        destination: data.get("destination").and_then(Value::as_str).map(String::from),
        tle_line1: data.get("tle_line1").and_then(Value::as_str).map(String::from),
        tle_line2: data.get("tle_line2").and_then(Value::as_str).map(String::from),
        species: data.get("species").and_then(Value::as_str).map(String::from),
        metadata: data.get("metadata").and_then(Value::as_object).cloned().unwrap_or_default(),
    }
}

fn parse_position(v: Option<&Value>) -> GeoPoint {
    let Some(v) = v else {
        return GeoPoint::new(0.0, 0.0);
    };
    GeoPoint {
        lat: v.get("lat").and_then(Value::as_f64).unwrap_or(0.0),
        lng: v.get("lng").and_then(Value::as_f64).unwrap_or(0.0),
        altitude: v.get("altitude").and_then(Value::as_f64),
    }
}

fn parse_velocity(v: &Value) -> Option<Velocity> {
    Some(Velocity {
        speed: v.get("speed").and_then(Value::as_f64).unwrap_or(0.0),
        heading: v.get("heading").and_then(Value::as_f64).unwrap_or(0.0),
        climb_rate: v.get("climb_rate").and_then(Value::as_f64),
    })
}

fn parse_flight_plan(v: &Value) -> Option<FlightPlan> {
    let waypoints = v
        .get("waypoints")?
        .as_array()?
        .iter()
        .map(|wp| Waypoint {
            lat: wp.get("lat").and_then(Value::as_f64).unwrap_or(0.0),
            lng: wp.get("lng").and_then(Value::as_f64).unwrap_or(0.0),
            altitude: wp.get("altitude").and_then(Value::as_f64),
            time_ms: wp.get("time_ms").and_then(Value::as_i64),
        })
        .collect();
    Some(FlightPlan {
        waypoints,
        departure: v.get("departure").and_then(Value::as_str).map(String::from),
        arrival: v.get("arrival").and_then(Value::as_str).map(String::from),
    })
}
