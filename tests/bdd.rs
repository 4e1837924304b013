use std::{fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use cucumber::{given, then, when, World as _};
use ecotrack::{
    auth,
    config::AppConfig,
    db::init_pool,
    emissions::{self, TransportMode},
    error::AppError,
    models::{place::Coordinates, trip::Trip, user::User},
    services::{
        geocode::GeoClient, mailer::MailerService, routing::RoutingClient, storage::TripStore,
    },
    state::AppState,
};
use tempfile::TempDir;
use url::Url;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    current_user: Option<User>,
    last_error: Option<String>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self) -> &User {
        self.current_user
            .as_ref()
            .expect("a user must be registered first")
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let data_root = root.path().join("data");
        std::fs::create_dir_all(&data_root)?;

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        // The outbound endpoints are never called by these scenarios.
        let unreachable = Url::parse("http://127.0.0.1:9")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_root: data_root.clone(),
            cookie_secret: "bdd-cookie-secret".into(),
            geocoder_url: unreachable.clone(),
            routing_url: unreachable,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let trips = TripStore::new(config.data_root.clone());
        trips.ensure_structure().await?;

        let geocoder = GeoClient::new(config.geocoder_url.clone())?;
        let routing = RoutingClient::new(config.routing_url.clone())?;
        let mailer = MailerService::new();

        let app = AppState::new(config, db, trips, geocoder, routing, mailer);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.current_user = None;
    world.last_error = None;
}

#[when(
    regex = r#"^I register a user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn when_register_user(
    world: &mut AppWorld,
    full_name: String,
    email: String,
    password: String,
) {
    let user = auth::register_user(world.app_state(), &full_name, &email, &password)
        .await
        .expect("register user");
    auth::issue_verification(world.app_state(), &user.email, &user.full_name)
        .await
        .expect("issue verification");
    world.current_user = Some(user);
}

#[when(
    regex = r#"^I try to register a user \"([^\"]+)\" with email \"([^\"]+)\" and password \"([^\"]+)\"$"#
)]
async fn when_try_register_user(
    world: &mut AppWorld,
    full_name: String,
    email: String,
    password: String,
) {
    match auth::register_user(world.app_state(), &full_name, &email, &password).await {
        Ok(user) => world.current_user = Some(user),
        Err(err) => world.last_error = Some(err.to_string()),
    }
}

#[then(regex = r#"^registration fails with \"([^\"]+)\"$"#)]
async fn then_registration_fails(world: &mut AppWorld, message: String) {
    let error = world
        .last_error
        .as_ref()
        .expect("an error should have been recorded");
    assert_eq!(error, &message);
}

#[then(regex = r#"^no user account exists for \"([^\"]+)\"$"#)]
async fn then_no_account(world: &mut AppWorld, email: String) {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
        .bind(auth::normalize_email(&email))
        .fetch_one(&world.app_state().db)
        .await
        .expect("count users");
    assert_eq!(count, 0);
}

#[then(regex = r#"^a verification code is pending for \"([^\"]+)\"$"#)]
async fn then_code_pending(world: &mut AppWorld, email: String) {
    let code = pending_code(world, &email).await;
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[when(regex = r#"^I verify \"([^\"]+)\" with the issued code$"#)]
async fn when_verify_with_code(world: &mut AppWorld, email: String) {
    let code = pending_code(world, &email).await;
    let user = auth::verify_email_code(world.app_state(), &email, &code)
        .await
        .expect("verify email");
    assert!(user.email_verified);
    world.current_user = Some(user);
}

#[then(regex = r#"^I can authenticate as \"([^\"]+)\" using password \"([^\"]+)\"$"#)]
async fn then_can_authenticate(world: &mut AppWorld, email: String, password: String) {
    let user = auth::authenticate_user(world.app_state(), &email, &password)
        .await
        .expect("authentication");
    assert_eq!(user.email, auth::normalize_email(&email));
}

#[then(regex = r#"^authentication fails for \"([^\"]+)\" using password \"([^\"]+)\"$"#)]
async fn then_authentication_fails(world: &mut AppWorld, email: String, password: String) {
    let result = auth::authenticate_user(world.app_state(), &email, &password).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[given(regex = r#"^a verified user \"([^\"]+)\" with password \"([^\"]+)\"$"#)]
async fn given_verified_user(world: &mut AppWorld, email: String, password: String) {
    let user = auth::register_user(world.app_state(), "Test User", &email, &password)
        .await
        .expect("register user");
    sqlx::query("UPDATE users SET email_verified = 1 WHERE id = ?1")
        .bind(user.id)
        .execute(&world.app_state().db)
        .await
        .expect("mark verified");
    world.current_user = Some(user);
}

#[when(regex = r#"^I save a ([0-9.]+) km (\w+) trip from \"([^\"]+)\" to \"([^\"]+)\"$"#)]
async fn when_save_trip(
    world: &mut AppWorld,
    distance_km: f64,
    mode: String,
    source: String,
    destination: String,
) {
    let mode = TransportMode::parse(&mode).expect("known transport mode");
    let user_uuid = world.user().uuid.clone();

    let mut trip = Trip::new(&user_uuid);
    trip.source = source;
    trip.destination = destination;
    trip.source_coords = Coordinates { lat: 0.0, lon: 0.0 };
    trip.destination_coords = Coordinates { lat: 0.0, lon: 0.0 };
    trip.mode = mode;
    trip.distance_km = distance_km;
    trip.co2_grams = emissions::co2_grams(mode, distance_km);

    world
        .app_state()
        .trips
        .append_trip(&user_uuid, trip)
        .await
        .expect("append trip");
}

#[then(regex = r"^the user has (\d+) stored trips$")]
async fn then_user_has_trips(world: &mut AppWorld, expected: usize) {
    let trips = load_trips(world).await;
    assert_eq!(trips.len(), expected);
}

#[then(regex = r#"^the stored trip from \"([^\"]+)\" to \"([^\"]+)\" emits ([0-9.]+) grams of CO2$"#)]
async fn then_trip_emissions(
    world: &mut AppWorld,
    source: String,
    destination: String,
    expected_grams: f64,
) {
    let trips = load_trips(world).await;
    let trip = trips
        .iter()
        .find(|t| t.source == source && t.destination == destination)
        .expect("trip should be stored");
    assert!((trip.co2_grams - expected_grams).abs() < 1e-9);
    assert!((trip.co2_grams - trip.distance_km * trip.mode.factor()).abs() < 1e-9);
}

#[when(regex = r#"^I delete the trip from \"([^\"]+)\" to \"([^\"]+)\"$"#)]
async fn when_delete_trip(world: &mut AppWorld, source: String, destination: String) {
    let user_uuid = world.user().uuid.clone();
    let trips = load_trips(world).await;
    let trip = trips
        .iter()
        .find(|t| t.source == source && t.destination == destination)
        .expect("trip should exist before deleting");
    let deleted = world
        .app_state()
        .trips
        .delete_trip(&user_uuid, &trip.id)
        .await
        .expect("delete trip");
    assert!(deleted);
}

#[then(regex = r#"^the trip from \"([^\"]+)\" to \"([^\"]+)\" is still stored$"#)]
async fn then_trip_still_stored(world: &mut AppWorld, source: String, destination: String) {
    let trips = load_trips(world).await;
    assert!(trips
        .iter()
        .any(|t| t.source == source && t.destination == destination));
}

#[when("I clear all trips")]
async fn when_clear_trips(world: &mut AppWorld) {
    let user_uuid = world.user().uuid.clone();
    world
        .app_state()
        .trips
        .clear_trips(&user_uuid)
        .await
        .expect("clear trips");
}

async fn load_trips(world: &AppWorld) -> Vec<Trip> {
    world
        .app_state()
        .trips
        .load_user_trips(&world.user().uuid)
        .await
        .expect("load trips")
}

async fn pending_code(world: &AppWorld, email: &str) -> String {
    sqlx::query_scalar("SELECT code FROM email_verifications WHERE email = ?1")
        .bind(auth::normalize_email(email))
        .fetch_one(&world.app_state().db)
        .await
        .expect("pending verification code")
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
