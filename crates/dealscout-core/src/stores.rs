use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deals::StoreChain;
use crate::geo::GeoPoint;

/// A physical store belonging to a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreLocation {
    pub id: Uuid,
    pub chain: StoreChain,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Weekday name (`"monday"`) to opening hours text (`"07:00-22:00"`).
    pub weekly_hours: BTreeMap<String, String>,
    pub is_active: bool,
}

impl StoreLocation {
    /// Coordinates of the store, when both are known.
    #[must_use]
    pub fn geo_point(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }
}
