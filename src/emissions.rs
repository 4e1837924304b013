//! Per-mode CO₂ arithmetic: the fixed emissions-factor table, route
//! comparisons, and the "real-world equivalent" figures shown next to a
//! result.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::place::Coordinates;

/// Grams of CO₂ absorbed by one tree per day.
const TREE_ABSORPTION_G_PER_DAY: f64 = 60.0;
/// Grams of CO₂ emitted by one full smartphone charge.
const PHONE_CHARGE_G: f64 = 8.22;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    #[serde(rename = "car")]
    Car,
    #[serde(rename = "motorcycle")]
    Motorcycle,
    #[serde(rename = "bus")]
    Bus,
    #[serde(rename = "train")]
    Train,
    #[serde(rename = "bicycle")]
    Bicycle,
    #[serde(rename = "walking")]
    Walking,
}

pub const ALL_MODES: [TransportMode; 6] = [
    TransportMode::Car,
    TransportMode::Motorcycle,
    TransportMode::Bus,
    TransportMode::Train,
    TransportMode::Bicycle,
    TransportMode::Walking,
];

impl TransportMode {
    /// Grams of CO₂ per passenger-kilometre.
    pub fn factor(&self) -> f64 {
        match self {
            TransportMode::Car => 170.0,
            TransportMode::Motorcycle => 103.0,
            TransportMode::Bus => 68.0,
            TransportMode::Train => 35.0,
            TransportMode::Bicycle => 0.0,
            TransportMode::Walking => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Car => "car",
            TransportMode::Motorcycle => "motorcycle",
            TransportMode::Bus => "bus",
            TransportMode::Train => "train",
            TransportMode::Bicycle => "bicycle",
            TransportMode::Walking => "walking",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Car => "Car",
            TransportMode::Motorcycle => "Motorcycle",
            TransportMode::Bus => "Bus",
            TransportMode::Train => "Train",
            TransportMode::Bicycle => "Bicycle",
            TransportMode::Walking => "Walking",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "car" => Some(TransportMode::Car),
            "motorcycle" => Some(TransportMode::Motorcycle),
            "bus" => Some(TransportMode::Bus),
            "train" => Some(TransportMode::Train),
            "bicycle" => Some(TransportMode::Bicycle),
            "walking" => Some(TransportMode::Walking),
            _ => None,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn co2_grams(mode: TransportMode, distance_km: f64) -> f64 {
    distance_km.max(0.0) * mode.factor()
}

/// One row of the mode comparison table.
#[derive(Debug, Clone, Serialize)]
pub struct ModeEmission {
    pub mode: TransportMode,
    pub co2_grams: f64,
    /// Percent saved versus the selected mode; `None` when the selected mode
    /// already emits nothing.
    pub savings_percent: Option<f64>,
    pub selected: bool,
}

/// Emissions for every mode over the same distance, with savings relative to
/// the selected one. The selected mode is always present in the output.
pub fn compare_modes(selected: TransportMode, distance_km: f64) -> Vec<ModeEmission> {
    let baseline = co2_grams(selected, distance_km);
    ALL_MODES
        .iter()
        .map(|&mode| {
            let grams = co2_grams(mode, distance_km);
            let savings_percent = if baseline > 0.0 {
                Some((baseline - grams) / baseline * 100.0)
            } else {
                None
            };
            ModeEmission {
                mode,
                co2_grams: grams,
                savings_percent,
                selected: mode == selected,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TripEquivalents {
    /// Days a single tree needs to absorb this much CO₂.
    pub tree_days: f64,
    /// Number of full smartphone charges with the same footprint.
    pub phone_charges: f64,
}

pub fn equivalents(co2_grams: f64) -> TripEquivalents {
    TripEquivalents {
        tree_days: co2_grams / TREE_ABSORPTION_G_PER_DAY,
        phone_charges: co2_grams / PHONE_CHARGE_G,
    }
}

/// Great-circle distance in kilometres. Used where the routing service has no
/// matching profile (rail).
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = (to.lat - from.lat).to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co2_is_distance_times_factor() {
        assert_eq!(co2_grams(TransportMode::Car, 10.0), 1700.0);
        assert_eq!(co2_grams(TransportMode::Bus, 10.0), 680.0);
        assert_eq!(co2_grams(TransportMode::Train, 10.0), 350.0);
        assert_eq!(co2_grams(TransportMode::Walking, 10.0), 0.0);
    }

    #[test]
    fn co2_is_monotonic_in_distance() {
        let mut previous = 0.0;
        for step in 0..100 {
            let grams = co2_grams(TransportMode::Car, step as f64 * 1.5);
            assert!(grams >= previous);
            previous = grams;
        }
    }

    #[test]
    fn negative_distance_is_clamped() {
        assert_eq!(co2_grams(TransportMode::Car, -5.0), 0.0);
    }

    #[test]
    fn comparison_covers_every_mode_once() {
        let rows = compare_modes(TransportMode::Car, 25.0);
        assert_eq!(rows.len(), ALL_MODES.len());
        assert_eq!(rows.iter().filter(|row| row.selected).count(), 1);
    }

    #[test]
    fn savings_are_relative_to_selected_mode() {
        let rows = compare_modes(TransportMode::Car, 100.0);
        let train = rows
            .iter()
            .find(|row| row.mode == TransportMode::Train)
            .unwrap();
        // 170 -> 35 g/km saves just under 80 percent.
        let savings = train.savings_percent.unwrap();
        assert!((savings - 79.41).abs() < 0.01);

        let car = rows
            .iter()
            .find(|row| row.mode == TransportMode::Car)
            .unwrap();
        assert_eq!(car.savings_percent.unwrap(), 0.0);
    }

    #[test]
    fn zero_emission_selection_has_no_savings_percentages() {
        let rows = compare_modes(TransportMode::Bicycle, 10.0);
        assert!(rows.iter().all(|row| row.savings_percent.is_none()));
    }

    #[test]
    fn equivalents_use_fixed_divisors() {
        let eq = equivalents(600.0);
        assert!((eq.tree_days - 10.0).abs() < f64::EPSILON);
        assert!((eq.phone_charges - 72.99).abs() < 0.01);
    }

    #[test]
    fn haversine_matches_known_city_pair() {
        // Paris to London, roughly 344 km great-circle.
        let paris = Coordinates {
            lat: 48.8566,
            lon: 2.3522,
        };
        let london = Coordinates {
            lat: 51.5074,
            lon: -0.1278,
        };
        let km = haversine_km(paris, london);
        assert!((km - 344.0).abs() < 2.0, "got {km}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        let p = Coordinates {
            lat: 52.52,
            lon: 13.405,
        };
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn mode_round_trips_through_parse() {
        for mode in ALL_MODES {
            assert_eq!(TransportMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(TransportMode::parse("rocket"), None);
    }
}
