use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::{
    error::AppError,
    models::place::{Coordinates, Place},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
// Nominatim's usage policy requires an identifying agent string.
const USER_AGENT: &str = concat!("ecotrack/", env!("CARGO_PKG_VERSION"));

/// Client for a Nominatim-compatible geocoding endpoint.
#[derive(Clone)]
pub struct GeoClient {
    client: Client,
    base_url: Url,
}

/// Raw search result; Nominatim serialises coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: String,
    lat: String,
    lon: String,
}

impl GeoClient {
    pub fn new(base_url: Url) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Resolves a free-text place name. An empty result list is not an error
    /// here; callers decide whether that aborts their flow.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>, AppError> {
        let mut url = self
            .base_url
            .join("search")
            .map_err(|err| AppError::Config(format!("invalid geocoder url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "jsonv2")
            .append_pair("limit", &limit.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| upstream_error("geocoder", err))?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let raw: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|err| upstream_error("geocoder", err))?;

        let places = raw
            .into_iter()
            .filter_map(|entry| {
                let lat = entry.lat.parse::<f64>();
                let lon = entry.lon.parse::<f64>();
                match (lat, lon) {
                    (Ok(lat), Ok(lon)) => Some(Place {
                        display_name: entry.display_name,
                        coords: Coordinates { lat, lon },
                    }),
                    _ => {
                        warn!(place = %entry.display_name, "geocoder result had unparsable coordinates");
                        None
                    }
                }
            })
            .collect();
        Ok(places)
    }
}

pub(crate) fn upstream_error(service: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Upstream(format!("{service} timed out"))
    } else if err.is_connect() {
        AppError::Upstream(format!("{service} is unreachable"))
    } else if err.is_decode() {
        AppError::Upstream(format!("{service} sent a malformed reply"))
    } else {
        AppError::Http(err)
    }
}
