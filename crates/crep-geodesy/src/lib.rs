//! Pure spherical-Earth geodesy: great-circle distance, bearing,
//! destination point, and slerp interpolation over `GeoPoint`.
//!
//! Every function here is total — callers are trusted to pass in-range
//! coordinates, and there is no failure mode to propagate.

use crep_types::GeoPoint;

/// Mean Earth radius, meters. Fixed by convention for this service; all
/// distances and destinations assume a perfect sphere of this radius.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn to_radians(deg: f64) -> f64 {
    deg.to_radians()
}

fn to_degrees(rad: f64) -> f64 {
    rad.to_degrees()
}

fn normalize_degrees_0_360(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Great-circle distance between two points, in meters, via the
/// haversine formula.
pub fn distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let phi1 = to_radians(p1.lat);
    let phi2 = to_radians(p2.lat);
    let d_phi = to_radians(p2.lat - p1.lat);
    let d_lambda = to_radians(p2.lng - p1.lng);

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `p1` to `p2`, degrees clockwise from true north
/// in `[0, 360)`.
pub fn bearing(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let phi1 = to_radians(p1.lat);
    let phi2 = to_radians(p2.lat);
    let d_lambda = to_radians(p2.lng - p1.lng);

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    normalize_degrees_0_360(to_degrees(y.atan2(x)))
}

/// Spherical forward solution: the point `distance_m` meters from
/// `start` along initial bearing `bearing_deg`. Altitude passes through
/// unchanged.
pub fn destination(start: &GeoPoint, bearing_deg: f64, distance_m: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = to_radians(bearing_deg);
    let phi1 = to_radians(start.lat);
    let lambda1 = to_radians(start.lng);

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    GeoPoint {
        lat: to_degrees(phi2),
        lng: to_degrees(lambda2),
        altitude: start.altitude,
    }
}

/// Great-circle slerp between `p1` and `p2` at fraction `f`. `f <= 0`
/// returns `p1`, `f >= 1` returns `p2`; if the two points are closer
/// than 1e-10 radians apart, returns `p1`. Altitude is linearly
/// interpolated when both points carry one.
pub fn interpolate(p1: &GeoPoint, p2: &GeoPoint, f: f64) -> GeoPoint {
    if f <= 0.0 {
        return *p1;
    }
    if f >= 1.0 {
        return *p2;
    }

    let delta = distance(p1, p2) / EARTH_RADIUS_M;
    if delta < 1e-10 {
        return *p1;
    }

    let phi1 = to_radians(p1.lat);
    let lambda1 = to_radians(p1.lng);
    let phi2 = to_radians(p2.lat);
    let lambda2 = to_radians(p2.lng);

    let a = ((1.0 - f) * delta).sin() / delta.sin();
    let b = (f * delta).sin() / delta.sin();

    let x = a * phi1.cos() * lambda1.cos() + b * phi2.cos() * lambda2.cos();
    let y = a * phi1.cos() * lambda1.sin() + b * phi2.cos() * lambda2.sin();
    let z = a * phi1.sin() + b * phi2.sin();

    let phi_i = z.atan2((x * x + y * y).sqrt());
    let lambda_i = y.atan2(x);

    let altitude = match (p1.altitude, p2.altitude) {
        (Some(a1), Some(a2)) => Some(a1 + (a2 - a1) * f),
        _ => None,
    };

    GeoPoint {
        lat: to_degrees(phi_i),
        lng: to_degrees(lambda_i),
        altitude,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_seattle_to_portland_is_about_230km() {
        let seattle = GeoPoint::new(47.6062, -122.3321);
        let portland = GeoPoint::new(45.5152, -122.6784);
        let d = distance(&seattle, &portland);
        assert_relative_eq!(d, 233_000.0, epsilon = 5_000.0);
    }

    #[test]
    fn bearing_due_north_is_zero() {
        let p1 = GeoPoint::new(0.0, 0.0);
        let p2 = GeoPoint::new(1.0, 0.0);
        assert_relative_eq!(bearing(&p1, &p2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn bearing_due_east_is_ninety() {
        let p1 = GeoPoint::new(0.0, 0.0);
        let p2 = GeoPoint::new(0.0, 1.0);
        assert_relative_eq!(bearing(&p1, &p2), 90.0, epsilon = 1e-6);
    }

    #[test]
    fn destination_at_zero_distance_is_a_no_op() {
        let p = GeoPoint::new(47.45, -122.30);
        let d = destination(&p, 90.0, 0.0);
        assert_relative_eq!(d.lat, p.lat, epsilon = 1e-9);
        assert_relative_eq!(d.lng, p.lng, epsilon = 1e-9);
    }

    #[test]
    fn destination_and_bearing_are_consistent() {
        let p1 = GeoPoint::new(47.45, -122.30);
        let d = destination(&p1, 45.0, 100_000.0);
        let back_bearing = bearing(&p1, &d);
        assert_relative_eq!(back_bearing, 45.0, epsilon = 0.5);
        assert_relative_eq!(distance(&p1, &d), 100_000.0, epsilon = 1.0);
    }

    #[test]
    fn interpolate_identical_points_returns_same_point() {
        let p = GeoPoint::new(10.0, 20.0);
        let mid = interpolate(&p, &p, 0.5);
        assert_relative_eq!(mid.lat, p.lat, epsilon = 1e-9);
        assert_relative_eq!(mid.lng, p.lng, epsilon = 1e-9);
    }

    #[test]
    fn interpolate_clamps_fraction_to_endpoints() {
        let p1 = GeoPoint::new(0.0, 0.0);
        let p2 = GeoPoint::new(10.0, 10.0);
        assert_eq!(interpolate(&p1, &p2, -0.5), p1);
        assert_eq!(interpolate(&p1, &p2, 1.5), p2);
    }

    #[test]
    fn interpolate_midpoint_is_roughly_halfway() {
        let p1 = GeoPoint::new(0.0, 0.0);
        let p2 = GeoPoint::new(0.0, 10.0);
        let mid = interpolate(&p1, &p2, 0.5);
        assert_relative_eq!(mid.lat, 0.0, epsilon = 1e-6);
        assert_relative_eq!(mid.lng, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn interpolate_carries_altitude_linearly() {
        let p1 = GeoPoint::with_altitude(0.0, 0.0, 1000.0);
        let p2 = GeoPoint::with_altitude(0.0, 10.0, 2000.0);
        let mid = interpolate(&p1, &p2, 0.5);
        assert_relative_eq!(mid.altitude.unwrap(), 1500.0, epsilon = 1.0);
    }
}
