use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        geocode::GeoClient, mailer::MailerService, routing::RoutingClient, storage::TripStore,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub trips: TripStore,
    pub geocoder: GeoClient,
    pub routing: RoutingClient,
    pub mailer: MailerService,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        trips: TripStore,
        geocoder: GeoClient,
        routing: RoutingClient,
        mailer: MailerService,
    ) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            config,
            db,
            trips,
            geocoder,
            routing,
            mailer,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}
