use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{
    emissions::TransportMode,
    error::AppError,
    models::place::{Coordinates, RouteSummary},
    services::geocode::upstream_error,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Profiles exposed by an OSRM-compatible router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingProfile {
    Driving,
    Cycling,
    Walking,
}

impl RoutingProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingProfile::Driving => "driving",
            RoutingProfile::Cycling => "cycling",
            RoutingProfile::Walking => "walking",
        }
    }

    /// OSRM has no rail profile, so train trips fall back to great-circle
    /// distance instead of a routed path.
    pub fn for_mode(mode: TransportMode) -> Option<Self> {
        match mode {
            TransportMode::Car | TransportMode::Motorcycle | TransportMode::Bus => {
                Some(RoutingProfile::Driving)
            }
            TransportMode::Bicycle => Some(RoutingProfile::Cycling),
            TransportMode::Walking => Some(RoutingProfile::Walking),
            TransportMode::Train => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
}

/// Client for an OSRM-compatible routing endpoint.
#[derive(Clone)]
pub struct RoutingClient {
    client: Client,
    base_url: Url,
}

impl RoutingClient {
    pub fn new(base_url: Url) -> Result<Self, AppError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    pub async fn route(
        &self,
        profile: RoutingProfile,
        from: Coordinates,
        to: Coordinates,
    ) -> Result<RouteSummary, AppError> {
        // OSRM expects lon,lat pairs.
        let path = format!(
            "route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            profile.as_str(),
            from.lon,
            from.lat,
            to.lon,
            to.lat
        );
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|err| AppError::Config(format!("invalid routing url: {err}")))?;
        url.query_pairs_mut().append_pair("overview", "false");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| upstream_error("router", err))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "router returned {}",
                response.status()
            )));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| upstream_error("router", err))?;
        if body.code != "Ok" {
            return Err(AppError::Upstream(format!(
                "router rejected the request: {}",
                body.code
            )));
        }
        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream("router found no route".into()))?;

        Ok(RouteSummary {
            distance_m: route.distance,
            duration_s: route.duration,
        })
    }
}
