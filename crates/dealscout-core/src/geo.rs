//! Great-circle distance helpers.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for every distance in the system.
pub const EARTH_RADIUS_MILES: f64 = 3_959.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Haversine distance between two points, in miles.
#[must_use]
pub fn haversine_miles(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards asin against h drifting a hair above 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}
