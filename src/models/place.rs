use serde::{Deserialize, Serialize};

/// WGS84 coordinates as returned by the geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub coords: Coordinates,
}

/// Distance and travel time for one resolved route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
}
