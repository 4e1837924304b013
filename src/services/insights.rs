use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::{
    emissions::{self, TransportMode, ALL_MODES},
    models::{
        insights::{ModeBreakdown, MonthlyPoint, TravelInsights},
        trip::Trip,
    },
};

const MONTH_WINDOW: usize = 6;

/// Aggregates a user's saved trips for the dashboards and the insights API.
pub fn summarize_trips(trips: &[Trip], now: DateTime<Utc>) -> TravelInsights {
    let total_distance_km: f64 = trips.iter().map(|t| t.distance_km).sum();
    let total_co2_grams: f64 = trips.iter().map(|t| t.co2_grams).sum();
    // Savings are measured against driving every recorded trip by car.
    let co2_saved_grams: f64 = trips
        .iter()
        .map(|t| emissions::co2_grams(TransportMode::Car, t.distance_km) - t.co2_grams)
        .sum();

    let by_mode = ALL_MODES
        .iter()
        .filter_map(|&mode| {
            let matching: Vec<&Trip> = trips.iter().filter(|t| t.mode == mode).collect();
            if matching.is_empty() {
                return None;
            }
            Some(ModeBreakdown {
                mode,
                trips: matching.len(),
                distance_km: matching.iter().map(|t| t.distance_km).sum(),
                co2_grams: matching.iter().map(|t| t.co2_grams).sum(),
            })
        })
        .collect();

    let monthly = month_window(now)
        .into_iter()
        .map(|(year, month)| {
            let co2_grams = trips
                .iter()
                .filter(|t| t.created_at.year() == year && t.created_at.month() == month)
                .map(|t| t.co2_grams)
                .sum();
            MonthlyPoint {
                label: month_label(year, month),
                co2_grams,
            }
        })
        .collect();

    TravelInsights {
        total_trips: trips.len(),
        total_distance_km,
        total_co2_grams,
        co2_saved_grams: co2_saved_grams.max(0.0),
        by_mode,
        monthly,
        demo: false,
    }
}

/// Locally generated demo series, shown when the user has no trips yet so
/// the charts are not empty.
pub fn demo_insights(now: DateTime<Utc>) -> TravelInsights {
    const DEMO_MONTHLY_G: [f64; MONTH_WINDOW] = [48600.0, 36200.0, 51400.0, 29800.0, 40250.0, 33100.0];

    let monthly: Vec<MonthlyPoint> = month_window(now)
        .into_iter()
        .zip(DEMO_MONTHLY_G)
        .map(|((year, month), co2_grams)| MonthlyPoint {
            label: month_label(year, month),
            co2_grams,
        })
        .collect();

    let by_mode = vec![
        ModeBreakdown {
            mode: TransportMode::Car,
            trips: 9,
            distance_km: 612.0,
            co2_grams: 104_040.0,
        },
        ModeBreakdown {
            mode: TransportMode::Bus,
            trips: 14,
            distance_km: 388.0,
            co2_grams: 26_384.0,
        },
        ModeBreakdown {
            mode: TransportMode::Train,
            trips: 6,
            distance_km: 1_240.0,
            co2_grams: 43_400.0,
        },
        ModeBreakdown {
            mode: TransportMode::Bicycle,
            trips: 11,
            distance_km: 96.0,
            co2_grams: 0.0,
        },
    ];

    TravelInsights {
        total_trips: by_mode.iter().map(|m| m.trips).sum(),
        total_distance_km: by_mode.iter().map(|m| m.distance_km).sum(),
        total_co2_grams: by_mode.iter().map(|m| m.co2_grams).sum(),
        co2_saved_grams: 221_616.0,
        by_mode,
        monthly,
        demo: true,
    }
}

/// The last six calendar months, oldest first.
fn month_window(now: DateTime<Utc>) -> Vec<(i32, u32)> {
    let mut year = now.year();
    let mut month = now.month();
    let mut window = Vec::with_capacity(MONTH_WINDOW);
    for _ in 0..MONTH_WINDOW {
        window.push((year, month));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    window.reverse();
    window
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|date| date.format("%b %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trip_with(mode: TransportMode, distance_km: f64, at: DateTime<Utc>) -> Trip {
        let mut trip = Trip::new("user-1");
        trip.mode = mode;
        trip.distance_km = distance_km;
        trip.co2_grams = emissions::co2_grams(mode, distance_km);
        trip.created_at = at;
        trip
    }

    #[test]
    fn summary_totals_add_up() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let trips = vec![
            trip_with(TransportMode::Car, 10.0, now),
            trip_with(TransportMode::Train, 100.0, now),
        ];
        let insights = summarize_trips(&trips, now);
        assert_eq!(insights.total_trips, 2);
        assert!((insights.total_distance_km - 110.0).abs() < f64::EPSILON);
        assert!((insights.total_co2_grams - (1700.0 + 3500.0)).abs() < f64::EPSILON);
        // The train leg would have cost 17000 g by car.
        assert!((insights.co2_saved_grams - 13500.0).abs() < f64::EPSILON);
        assert!(!insights.demo);
    }

    #[test]
    fn breakdown_only_lists_used_modes() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let trips = vec![trip_with(TransportMode::Bus, 12.0, now)];
        let insights = summarize_trips(&trips, now);
        assert_eq!(insights.by_mode.len(), 1);
        assert_eq!(insights.by_mode[0].mode, TransportMode::Bus);
        assert_eq!(insights.by_mode[0].trips, 1);
    }

    #[test]
    fn monthly_window_spans_six_months_and_buckets_by_month() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();
        let in_window = Utc.with_ymd_and_hms(2026, 1, 2, 8, 0, 0).unwrap();
        let out_of_window = Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap();
        let trips = vec![
            trip_with(TransportMode::Car, 10.0, in_window),
            trip_with(TransportMode::Car, 10.0, out_of_window),
        ];
        let insights = summarize_trips(&trips, now);
        assert_eq!(insights.monthly.len(), 6);
        assert_eq!(insights.monthly.last().unwrap().label, "Mar 2026");
        assert_eq!(insights.monthly.first().unwrap().label, "Oct 2025");
        let january: f64 = insights
            .monthly
            .iter()
            .filter(|p| p.label == "Jan 2026")
            .map(|p| p.co2_grams)
            .sum();
        assert!((january - 1700.0).abs() < f64::EPSILON);
    }

    #[test]
    fn demo_series_is_flagged_and_covers_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        let insights = demo_insights(now);
        assert!(insights.demo);
        assert_eq!(insights.monthly.len(), 6);
        assert!(insights.total_trips > 0);
    }
}
