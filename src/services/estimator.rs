use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    emissions::{self, ModeEmission, TransportMode, TripEquivalents},
    error::AppError,
    models::place::Place,
    services::routing::RoutingProfile,
    state::AppState,
};

/// Full calculator output for one source/destination pair.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub source: Place,
    pub destination: Place,
    pub mode: TransportMode,
    pub distance_km: f64,
    pub duration_s: Option<f64>,
    pub co2_grams: f64,
    pub emissions: Vec<ModeEmission>,
    pub equivalents: TripEquivalents,
}

/// Resolves both place names, fetches a route, and prices every transport
/// mode. Any upstream failure or empty result set aborts the whole
/// calculation; there is no retry and no partial result.
pub async fn estimate_route(
    state: &AppState,
    source: &str,
    destination: &str,
    mode: TransportMode,
) -> Result<Estimate, AppError> {
    let source = source.trim();
    let destination = destination.trim();
    if source.is_empty() {
        return Err(AppError::BadRequest("please enter a starting point".into()));
    }
    if destination.is_empty() {
        return Err(AppError::BadRequest("please enter a destination".into()));
    }

    let src_place = first_match(state, source).await?;
    let dst_place = first_match(state, destination).await?;

    let (distance_km, duration_s) = match RoutingProfile::for_mode(mode) {
        Some(profile) => {
            let summary = state
                .routing
                .route(profile, src_place.coords, dst_place.coords)
                .await?;
            (summary.distance_m / 1000.0, Some(summary.duration_s))
        }
        None => (
            emissions::haversine_km(src_place.coords, dst_place.coords),
            None,
        ),
    };

    Ok(estimate_for_distance(
        src_place,
        dst_place,
        mode,
        distance_km,
        duration_s,
    ))
}

/// Prices a route whose distance is already known. Switching the transport
/// mode on a computed result goes through here so distance and duration stay
/// exactly as fetched.
pub fn estimate_for_distance(
    source: Place,
    destination: Place,
    mode: TransportMode,
    distance_km: f64,
    duration_s: Option<f64>,
) -> Estimate {
    let co2 = emissions::co2_grams(mode, distance_km);
    Estimate {
        source,
        destination,
        mode,
        distance_km,
        duration_s,
        co2_grams: co2,
        emissions: emissions::compare_modes(mode, distance_km),
        equivalents: emissions::equivalents(co2),
    }
}

async fn first_match(state: &AppState, query: &str) -> Result<Place, AppError> {
    state
        .geocoder
        .search(query, 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest(format!("no places found for \"{query}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::place::Coordinates;

    fn place(name: &str) -> Place {
        Place {
            display_name: name.into(),
            coords: Coordinates {
                lat: 52.52,
                lon: 13.405,
            },
        }
    }

    #[test]
    fn switching_mode_keeps_distance_and_duration() {
        let by_car = estimate_for_distance(
            place("Berlin"),
            place("Hamburg"),
            TransportMode::Car,
            289.0,
            Some(10_440.0),
        );
        let by_train = estimate_for_distance(
            place("Berlin"),
            place("Hamburg"),
            TransportMode::Train,
            by_car.distance_km,
            by_car.duration_s,
        );

        assert_eq!(by_train.distance_km, by_car.distance_km);
        assert_eq!(by_train.duration_s, by_car.duration_s);
        assert!(by_train.co2_grams < by_car.co2_grams);
        assert!((by_car.co2_grams - 289.0 * 170.0).abs() < f64::EPSILON);
        assert!((by_train.co2_grams - 289.0 * 35.0).abs() < f64::EPSILON);
    }

    #[test]
    fn estimate_carries_a_row_for_every_mode() {
        let estimate = estimate_for_distance(
            place("Berlin"),
            place("Potsdam"),
            TransportMode::Bus,
            35.0,
            None,
        );
        assert_eq!(estimate.emissions.len(), 6);
        assert!(estimate
            .emissions
            .iter()
            .any(|row| row.selected && row.mode == TransportMode::Bus));
        assert!(estimate.duration_s.is_none());
    }
}
