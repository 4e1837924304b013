use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{Local, Utc};
use serde::Deserialize;

use crate::{
    auth::CurrentUser,
    emissions::{self, TransportMode},
    error::AppError,
    models::{
        insights::TravelInsights,
        place::{Coordinates, Place},
        trip::Trip,
        user::{DashboardKind, Theme},
    },
    services::{
        estimator::{self, Estimate},
        insights,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/calculator", get(calculator_form).post(calculator_submit))
        .route("/calculator/mode", post(calculator_switch_mode))
        .route("/trips", get(trips_list).post(trip_save))
        .route("/trips/:id/delete", post(trip_delete))
        .route("/trips/clear", post(trips_clear))
        .route("/insights", get(insights_page))
        .route("/profile", get(profile_form).post(profile_submit))
        .route("/settings", get(settings_form).post(settings_submit))
}

#[derive(Clone)]
struct TripRow {
    id: String,
    date: String,
    route: String,
    mode_label: String,
    distance_text: String,
    co2_text: String,
}

#[derive(Clone)]
struct ModeRow {
    label: String,
    trips: usize,
    distance_text: String,
    co2_text: String,
}

#[derive(Clone)]
struct MonthRow {
    label: String,
    co2_text: String,
    bar_percent: u32,
}

#[derive(Template)]
#[template(path = "user/dashboard_professional.html")]
struct ProfessionalDashboardTemplate {
    theme: String,
    display_name: String,
    demo: bool,
    total_trips: usize,
    distance_text: String,
    co2_text: String,
    saved_text: String,
    has_trips: bool,
    recent: Vec<TripRow>,
}

#[derive(Template)]
#[template(path = "user/dashboard_enterprise.html")]
struct EnterpriseDashboardTemplate {
    theme: String,
    display_name: String,
    demo: bool,
    total_trips: usize,
    distance_text: String,
    co2_text: String,
    saved_text: String,
    has_trips: bool,
    recent: Vec<TripRow>,
    by_mode: Vec<ModeRow>,
    monthly: Vec<MonthRow>,
}

async fn dashboard(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.load_user_trips(&user.uuid).await?;
    let summary = if trips.is_empty() {
        insights::demo_insights(Utc::now())
    } else {
        insights::summarize_trips(&trips, Utc::now())
    };
    let recent = trips.iter().take(5).map(trip_row).collect::<Vec<_>>();

    match user.dashboard {
        DashboardKind::Professional => Ok(AskamaTemplateResponse::into_response(
            ProfessionalDashboardTemplate {
                theme: user.theme.to_string(),
                display_name: user.full_name.clone(),
                demo: summary.demo,
                total_trips: summary.total_trips,
                distance_text: fmt_km(summary.total_distance_km),
                co2_text: fmt_co2(summary.total_co2_grams),
                saved_text: fmt_co2(summary.co2_saved_grams),
                has_trips: !recent.is_empty(),
                recent,
            },
        )),
        DashboardKind::Enterprise => Ok(AskamaTemplateResponse::into_response(
            EnterpriseDashboardTemplate {
                theme: user.theme.to_string(),
                display_name: user.full_name.clone(),
                demo: summary.demo,
                total_trips: summary.total_trips,
                distance_text: fmt_km(summary.total_distance_km),
                co2_text: fmt_co2(summary.total_co2_grams),
                saved_text: fmt_co2(summary.co2_saved_grams),
                has_trips: !recent.is_empty(),
                recent,
                by_mode: mode_rows(&summary),
                monthly: month_rows(&summary),
            },
        )),
    }
}

#[derive(Clone, Default)]
struct EmissionRow {
    mode: String,
    label: String,
    co2_text: String,
    savings_text: String,
    has_savings: bool,
    selected: bool,
}

#[derive(Clone, Default)]
struct ResultView {
    source_label: String,
    destination_label: String,
    mode_label: String,
    distance_text: String,
    duration_text: String,
    has_duration: bool,
    co2_text: String,
    tree_days_text: String,
    phone_charges_text: String,
    rows: Vec<EmissionRow>,
    // Raw values carried through the save and mode-switch forms.
    source_name: String,
    destination_name: String,
    src_lat: String,
    src_lon: String,
    dst_lat: String,
    dst_lon: String,
    mode: String,
    distance_km: String,
    duration_s: String,
}

#[derive(Template)]
#[template(path = "user/calculator.html")]
struct CalculatorTemplate {
    theme: String,
    show_error: bool,
    error_message: String,
    source: String,
    destination: String,
    mode: String,
    has_result: bool,
    result: ResultView,
}

async fn calculator_form(current: CurrentUser) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    Ok(AskamaTemplateResponse::into_response(CalculatorTemplate {
        theme: user.theme.to_string(),
        show_error: false,
        error_message: String::new(),
        source: String::new(),
        destination: String::new(),
        mode: TransportMode::Car.to_string(),
        has_result: false,
        result: ResultView::default(),
    }))
}

#[derive(Deserialize)]
struct CalculatorForm {
    source: String,
    destination: String,
    mode: String,
}

async fn calculator_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<CalculatorForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let theme = user.theme.to_string();
    let Some(mode) = TransportMode::parse(&form.mode) else {
        return Ok(render_calculator_error(
            theme,
            form,
            "unknown transport mode".into(),
        ));
    };

    match estimator::estimate_route(&state, &form.source, &form.destination, mode).await {
        Ok(estimate) => Ok(AskamaTemplateResponse::into_response(CalculatorTemplate {
            theme,
            show_error: false,
            error_message: String::new(),
            source: form.source,
            destination: form.destination,
            mode: mode.to_string(),
            has_result: true,
            result: result_view(&estimate),
        })),
        Err(AppError::BadRequest(msg)) | Err(AppError::Upstream(msg)) => {
            Ok(render_calculator_error(theme, form, msg))
        }
        Err(err) => Err(err),
    }
}

fn render_calculator_error(theme: String, form: CalculatorForm, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(CalculatorTemplate {
            theme,
            show_error: true,
            error_message: message,
            source: form.source,
            destination: form.destination,
            mode: form.mode,
            has_result: false,
            result: ResultView::default(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ComputedRouteForm {
    source_name: String,
    destination_name: String,
    src_lat: f64,
    src_lon: f64,
    dst_lat: f64,
    dst_lon: f64,
    mode: String,
    distance_km: f64,
    duration_s: Option<String>,
}

/// Re-prices an already-computed route for a different mode. Distance and
/// duration come from the form, untouched; nothing is fetched again.
async fn calculator_switch_mode(
    current: CurrentUser,
    Form(form): Form<ComputedRouteForm>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let mode = TransportMode::parse(&form.mode)
        .ok_or_else(|| AppError::BadRequest("unknown transport mode".into()))?;
    let duration_s = parse_optional_seconds(&form.duration_s);

    let estimate = estimator::estimate_for_distance(
        Place {
            display_name: form.source_name.clone(),
            coords: Coordinates {
                lat: form.src_lat,
                lon: form.src_lon,
            },
        },
        Place {
            display_name: form.destination_name.clone(),
            coords: Coordinates {
                lat: form.dst_lat,
                lon: form.dst_lon,
            },
        },
        mode,
        form.distance_km,
        duration_s,
    );

    Ok(AskamaTemplateResponse::into_response(CalculatorTemplate {
        theme: user.theme.to_string(),
        show_error: false,
        error_message: String::new(),
        source: form.source_name,
        destination: form.destination_name,
        mode: mode.to_string(),
        has_result: true,
        result: result_view(&estimate),
    }))
}

#[derive(Template)]
#[template(path = "user/trips_list.html")]
struct TripsListTemplate {
    theme: String,
    has_trips: bool,
    trips: Vec<TripRow>,
}

async fn trips_list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let mut items = state.trips.load_user_trips(&user.uuid).await?;
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let rows = items.iter().map(trip_row).collect::<Vec<_>>();
    Ok(AskamaTemplateResponse::into_response(TripsListTemplate {
        theme: user.theme.to_string(),
        has_trips: !rows.is_empty(),
        trips: rows,
    }))
}

async fn trip_save(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ComputedRouteForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let mode = TransportMode::parse(&form.mode)
        .ok_or_else(|| AppError::BadRequest("unknown transport mode".into()))?;

    let mut trip = Trip::new(&user.uuid);
    trip.source = form.source_name;
    trip.destination = form.destination_name;
    trip.source_coords = Coordinates {
        lat: form.src_lat,
        lon: form.src_lon,
    };
    trip.destination_coords = Coordinates {
        lat: form.dst_lat,
        lon: form.dst_lon,
    };
    trip.mode = mode;
    trip.distance_km = form.distance_km;
    trip.duration_s = parse_optional_seconds(&form.duration_s);
    trip.co2_grams = emissions::co2_grams(mode, form.distance_km);

    state.trips.append_trip(&user.uuid, trip).await?;

    Ok(Redirect::to("/me/trips"))
}

async fn trip_delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    if !state.trips.delete_trip(&user.uuid, &trip_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/me/trips"))
}

async fn trips_clear(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    state.trips.clear_trips(&user.uuid).await?;
    Ok(Redirect::to("/me/trips"))
}

#[derive(Template)]
#[template(path = "user/insights.html")]
struct InsightsTemplate {
    theme: String,
    demo: bool,
    total_trips: usize,
    distance_text: String,
    co2_text: String,
    saved_text: String,
    by_mode: Vec<ModeRow>,
    monthly: Vec<MonthRow>,
}

async fn insights_page(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let trips = state.trips.load_user_trips(&user.uuid).await?;
    let summary = if trips.is_empty() {
        insights::demo_insights(Utc::now())
    } else {
        insights::summarize_trips(&trips, Utc::now())
    };
    Ok(AskamaTemplateResponse::into_response(InsightsTemplate {
        theme: user.theme.to_string(),
        demo: summary.demo,
        total_trips: summary.total_trips,
        distance_text: fmt_km(summary.total_distance_km),
        co2_text: fmt_co2(summary.total_co2_grams),
        saved_text: fmt_co2(summary.co2_saved_grams),
        by_mode: mode_rows(&summary),
        monthly: month_rows(&summary),
    }))
}

#[derive(Template)]
#[template(path = "auth/profile.html")]
struct ProfileTemplate {
    theme: String,
    full_name: String,
    occupation: String,
    industry: String,
    dashboard: String,
}

async fn profile_form(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let row: Option<(Option<String>, Option<String>)> =
        sqlx::query_as("SELECT occupation, industry FROM users WHERE id = ?1")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?;
    let (occupation, industry) = row.unwrap_or_default();
    Ok(AskamaTemplateResponse::into_response(ProfileTemplate {
        theme: user.theme.to_string(),
        full_name: user.full_name.clone(),
        occupation: occupation.unwrap_or_default(),
        industry: industry.unwrap_or_default(),
        dashboard: user.dashboard.to_string(),
    }))
}

#[derive(Deserialize)]
struct ProfileForm {
    occupation: String,
    industry: String,
    dashboard: String,
}

async fn profile_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let Some(dashboard) = DashboardKind::parse(&form.dashboard) else {
        return Err(AppError::BadRequest("unknown dashboard type".into()));
    };
    sqlx::query("UPDATE users SET occupation = ?1, industry = ?2, dashboard = ?3 WHERE id = ?4")
        .bind(normalize_optional(Some(form.occupation)))
        .bind(normalize_optional(Some(form.industry)))
        .bind(dashboard.as_str())
        .bind(user.id)
        .execute(&state.db)
        .await?;
    Ok(Redirect::to("/me"))
}

#[derive(Template)]
#[template(path = "user/settings.html")]
struct SettingsTemplate {
    theme: String,
    show_notice: bool,
    full_name: String,
    occupation: String,
    industry: String,
    dashboard: String,
}

#[derive(Deserialize)]
struct SettingsParams {
    saved: Option<String>,
}

async fn settings_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<SettingsParams>,
) -> Result<impl IntoResponse, AppError> {
    let user = current.require_user()?;
    let row: Option<(Option<String>, Option<String>)> =
        sqlx::query_as("SELECT occupation, industry FROM users WHERE id = ?1")
            .bind(user.id)
            .fetch_optional(&state.db)
            .await?;
    let (occupation, industry) = row.unwrap_or_default();
    Ok(AskamaTemplateResponse::into_response(SettingsTemplate {
        theme: user.theme.to_string(),
        show_notice: params.saved.is_some(),
        full_name: user.full_name.clone(),
        occupation: occupation.unwrap_or_default(),
        industry: industry.unwrap_or_default(),
        dashboard: user.dashboard.to_string(),
    }))
}

#[derive(Deserialize)]
struct SettingsForm {
    full_name: String,
    occupation: String,
    industry: String,
    dashboard: String,
    theme: String,
}

async fn settings_submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<SettingsForm>,
) -> Result<Redirect, AppError> {
    let user = current.require_user()?;
    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("please enter your name".into()));
    }
    let Some(dashboard) = DashboardKind::parse(&form.dashboard) else {
        return Err(AppError::BadRequest("unknown dashboard type".into()));
    };
    let Some(theme) = Theme::parse(&form.theme) else {
        return Err(AppError::BadRequest("unknown theme".into()));
    };
    sqlx::query(
        "UPDATE users SET full_name = ?1, occupation = ?2, industry = ?3, dashboard = ?4, theme = ?5 \
         WHERE id = ?6",
    )
    .bind(full_name)
    .bind(normalize_optional(Some(form.occupation)))
    .bind(normalize_optional(Some(form.industry)))
    .bind(dashboard.as_str())
    .bind(theme.as_str())
    .bind(user.id)
    .execute(&state.db)
    .await?;
    Ok(Redirect::to("/me/settings?saved=1"))
}

fn result_view(estimate: &Estimate) -> ResultView {
    let rows = estimate
        .emissions
        .iter()
        .map(|row| EmissionRow {
            mode: row.mode.to_string(),
            label: row.mode.label().to_string(),
            co2_text: fmt_co2(row.co2_grams),
            savings_text: row.savings_percent.map(fmt_savings).unwrap_or_default(),
            has_savings: row.savings_percent.is_some() && !row.selected,
            selected: row.selected,
        })
        .collect();

    ResultView {
        source_label: estimate.source.display_name.clone(),
        destination_label: estimate.destination.display_name.clone(),
        mode_label: estimate.mode.label().to_string(),
        distance_text: fmt_km(estimate.distance_km),
        duration_text: estimate.duration_s.map(fmt_duration).unwrap_or_default(),
        has_duration: estimate.duration_s.is_some(),
        co2_text: fmt_co2(estimate.co2_grams),
        tree_days_text: format!("{:.1}", estimate.equivalents.tree_days),
        phone_charges_text: format!("{:.0}", estimate.equivalents.phone_charges),
        rows,
        source_name: estimate.source.display_name.clone(),
        destination_name: estimate.destination.display_name.clone(),
        src_lat: estimate.source.coords.lat.to_string(),
        src_lon: estimate.source.coords.lon.to_string(),
        dst_lat: estimate.destination.coords.lat.to_string(),
        dst_lon: estimate.destination.coords.lon.to_string(),
        mode: estimate.mode.to_string(),
        distance_km: estimate.distance_km.to_string(),
        duration_s: estimate
            .duration_s
            .map(|d| d.to_string())
            .unwrap_or_default(),
    }
}

fn trip_row(trip: &Trip) -> TripRow {
    TripRow {
        id: trip.id.clone(),
        date: format_timestamp(trip.created_at),
        route: trip.route_label(),
        mode_label: trip.mode.label().to_string(),
        distance_text: fmt_km(trip.distance_km),
        co2_text: fmt_co2(trip.co2_grams),
    }
}

fn mode_rows(summary: &TravelInsights) -> Vec<ModeRow> {
    summary
        .by_mode
        .iter()
        .map(|entry| ModeRow {
            label: entry.mode.label().to_string(),
            trips: entry.trips,
            distance_text: fmt_km(entry.distance_km),
            co2_text: fmt_co2(entry.co2_grams),
        })
        .collect()
}

fn month_rows(summary: &TravelInsights) -> Vec<MonthRow> {
    let max = summary
        .monthly
        .iter()
        .map(|point| point.co2_grams)
        .fold(0.0_f64, f64::max);
    summary
        .monthly
        .iter()
        .map(|point| MonthRow {
            label: point.label.clone(),
            co2_text: fmt_co2(point.co2_grams),
            bar_percent: if max > 0.0 {
                (point.co2_grams / max * 100.0).round() as u32
            } else {
                0
            },
        })
        .collect()
}

fn parse_optional_seconds(input: &Option<String>) -> Option<f64> {
    normalize_optional(input.clone()).and_then(|value| value.parse::<f64>().ok())
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn fmt_km(km: f64) -> String {
    format!("{km:.1} km")
}

fn fmt_co2(grams: f64) -> String {
    if grams >= 1000.0 {
        format!("{:.2} kg", grams / 1000.0)
    } else {
        format!("{grams:.0} g")
    }
}

fn fmt_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    if minutes >= 60 {
        format!("{} h {} min", minutes / 60, minutes % 60)
    } else {
        format!("{minutes} min")
    }
}

fn fmt_savings(percent: f64) -> String {
    if percent >= 0.0 {
        format!("saves {percent:.0}%")
    } else {
        format!("{:.0}% more", -percent)
    }
}

fn format_timestamp(ts: chrono::DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d %b %Y %H:%M")
        .to_string()
}
