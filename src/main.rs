use ecotrack::config::AppConfig;
use ecotrack::db::init_pool;
use ecotrack::error::AppError;
use ecotrack::routes::create_router;
use ecotrack::services::{
    geocode::GeoClient, mailer::MailerService, routing::RoutingClient, storage::TripStore,
};
use ecotrack::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&db).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }

    let trips = TripStore::new(config.data_root.clone());
    trips.ensure_structure().await?;

    let geocoder = GeoClient::new(config.geocoder_url.clone())?;
    let routing = RoutingClient::new(config.routing_url.clone())?;
    let mailer = MailerService::new();

    let state = AppState::new(config.clone(), db.clone(), trips, geocoder, routing, mailer);

    let app = create_router(state.clone());

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,ecotrack=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
