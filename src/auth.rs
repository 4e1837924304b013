use argon2::{
    password_hash::{
        rand_core::{OsRng, RngCore},
        SaltString,
    },
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::Session,
        user::{DashboardKind, Theme, User},
    },
    state::AppState,
};

pub const SESSION_COOKIE: &str = "ecotrack_session";

const SESSION_TTL_DAYS: i64 = 30;
const VERIFICATION_TTL_MINUTES: i64 = 15;

const USER_COLUMNS: &str = "id, uuid, full_name, email, password_hash, occupation, industry, \
     dashboard, theme, email_verified, created_at, last_login_at";

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub full_name: String,
    pub dashboard: DashboardKind,
    pub theme: Theme,
    pub profile_complete: bool,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            dashboard: user.dashboard_kind(),
            theme: user.theme_kind(),
            profile_complete: user.profile_complete(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let jar = PrivateCookieJar::from_headers(&parts.headers, app.cookie_key.clone());
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        Ok(Self(load_session_user(&app, cookie.value()).await?))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        })
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "please enter a valid email address".into(),
        ))
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters long".into(),
        ));
    }
    Ok(())
}

pub async fn register_user(
    state: &AppState,
    full_name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("please enter your name".into()));
    }
    validate_email(email)?;
    validate_password(password)?;
    let email = normalize_email(email);

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if existing > 0 {
        return Err(AppError::BadRequest(
            "an account with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(password)?;
    let uuid = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (uuid, full_name, email, password_hash, dashboard, theme, email_verified, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
    )
    .bind(&uuid)
    .bind(full_name)
    .bind(&email)
    .bind(&password_hash)
    .bind(DashboardKind::default().as_str())
    .bind(Theme::default().as_str())
    .bind(Utc::now())
    .execute(&state.db)
    .await?;

    fetch_user_by_email(state, &email)
        .await?
        .ok_or(AppError::NotFound)
}

/// Checks credentials only. Callers decide what an unverified email means
/// for the flow they are in.
pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    validate_email(email)?;
    validate_password(password)?;
    let email = normalize_email(email);

    let Some(user) = fetch_user_by_email(state, &email).await? else {
        return Err(AppError::Unauthorized);
    };
    let parsed = PasswordHash::new(&user.password_hash)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash invalid: {err}")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_err()
    {
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

pub async fn touch_last_login(state: &AppState, user_id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(now + Duration::days(SESSION_TTL_DAYS))
    .execute(&state.db)
    .await?;
    Ok(session_id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

async fn load_session_user(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, user_id, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&state.db)
    .await?;
    let Some(session) = session else {
        return Ok(None);
    };

    if let Some(expires_at) = session.expires_at {
        if expires_at < Utc::now() {
            destroy_session(state, &session.id).await?;
            return Ok(None);
        }
    }

    sqlx::query("UPDATE sessions SET last_seen_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
    ))
    .bind(session.user_id)
    .fetch_optional(&state.db)
    .await?;
    Ok(user.map(AuthenticatedUser::from))
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    jar.remove(cookie)
}

/// Creates (or replaces) the pending verification code for an address and
/// hands it to the mailer stub.
pub async fn issue_verification(
    state: &AppState,
    email: &str,
    full_name: &str,
) -> Result<(), AppError> {
    let email = normalize_email(email);
    let code = generate_code();
    let now = Utc::now();
    sqlx::query(
        "INSERT OR REPLACE INTO email_verifications (email, code, created_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&email)
    .bind(&code)
    .bind(now)
    .bind(now + Duration::minutes(VERIFICATION_TTL_MINUTES))
    .execute(&state.db)
    .await?;

    state
        .mailer
        .send_verification_code(&email, full_name, &code)
        .await
}

pub async fn verify_email_code(
    state: &AppState,
    email: &str,
    code: &str,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let row: Option<(String, chrono::DateTime<Utc>)> =
        sqlx::query_as("SELECT code, expires_at FROM email_verifications WHERE email = ?1")
            .bind(&email)
            .fetch_optional(&state.db)
            .await?;
    let Some((expected, expires_at)) = row else {
        return Err(AppError::BadRequest(
            "no pending verification for this email".into(),
        ));
    };
    if expires_at < Utc::now() {
        return Err(AppError::BadRequest(
            "this code has expired, please request a new one".into(),
        ));
    }
    if code.trim() != expected {
        return Err(AppError::BadRequest("incorrect verification code".into()));
    }

    sqlx::query("UPDATE users SET email_verified = 1 WHERE email = ?1")
        .bind(&email)
        .execute(&state.db)
        .await?;
    sqlx::query("DELETE FROM email_verifications WHERE email = ?1")
        .bind(&email)
        .execute(&state.db)
        .await?;

    fetch_user_by_email(state, &email)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn fetch_user_by_email(
    state: &AppState,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
    ))
    .bind(email)
    .fetch_optional(&state.db)
    .await?;
    Ok(user)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))
}

fn generate_code() -> String {
    format!("{:06}", OsRng.next_u32() % 1_000_000)
}
