use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::emissions::TransportMode;
use crate::models::place::Coordinates;

/// One saved journey. Trips live as a JSON array in a per-user file, so the
/// record has to stay self-contained and forward-readable.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub user_uuid: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub destination: String,
    pub source_coords: Coordinates,
    pub destination_coords: Coordinates,
    pub mode: TransportMode,
    pub distance_km: f64,
    pub duration_s: Option<f64>,
    pub co2_grams: f64,
}

impl Trip {
    pub fn new(user_uuid: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_uuid: user_uuid.into(),
            created_at: Utc::now(),
            source: String::new(),
            destination: String::new(),
            source_coords: Coordinates { lat: 0.0, lon: 0.0 },
            destination_coords: Coordinates { lat: 0.0, lon: 0.0 },
            mode: TransportMode::Car,
            distance_km: 0.0,
            duration_s: None,
            co2_grams: 0.0,
        }
    }

    pub fn co2_kg(&self) -> f64 {
        self.co2_grams / 1000.0
    }

    pub fn route_label(&self) -> String {
        format!("{} → {}", self.source, self.destination)
    }
}
