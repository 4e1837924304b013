use serde::Serialize;

use crate::emissions::TransportMode;

/// Aggregates rendered by the dashboards and served by the insights API.
#[derive(Debug, Clone, Serialize)]
pub struct TravelInsights {
    pub total_trips: usize,
    pub total_distance_km: f64,
    pub total_co2_grams: f64,
    /// Grams avoided compared to driving every recorded trip by car.
    pub co2_saved_grams: f64,
    pub by_mode: Vec<ModeBreakdown>,
    pub monthly: Vec<MonthlyPoint>,
    /// True when the series is locally generated demo data, not user trips.
    pub demo: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeBreakdown {
    pub mode: TransportMode,
    pub trips: usize,
    pub distance_km: f64,
    pub co2_grams: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPoint {
    pub label: String,
    pub co2_grams: f64,
}
