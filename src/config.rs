use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub data_root: PathBuf,
    pub cookie_secret: String,
    pub geocoder_url: Url,
    pub routing_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://ecotrack.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let data_root = env::var("DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-ecotrack-cookie-secret".to_string());

        let geocoder_url = parse_base_url("GEOCODER_URL", "https://nominatim.openstreetmap.org")?;
        let routing_url = parse_base_url("ROUTING_URL", "https://router.project-osrm.org")?;

        Ok(Self {
            database_url,
            listen_addr,
            data_root,
            cookie_secret,
            geocoder_url,
            routing_url,
        })
    }
}

fn parse_base_url(var: &str, default: &str) -> Result<Url, AppError> {
    let raw = env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|err| AppError::Config(format!("invalid {var}: {err}")))
}
