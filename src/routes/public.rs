use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;

use crate::{
    auth::{self, CurrentUser},
    error::AppError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(login_form).post(login_submit))
        .route("/register", get(register_form).post(register_submit))
        .route("/verify", get(verify_form).post(verify_submit))
        .route("/verify/resend", post(verify_resend))
        .route("/logout", post(logout))
}

#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate {
    logged_in: bool,
}

async fn landing(current: CurrentUser) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LandingTemplate {
        logged_in: current.0.is_some(),
    })
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    show_error: bool,
    error_message: String,
    email: String,
}

async fn login_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(LoginTemplate {
        show_error: false,
        error_message: String::new(),
        email: String::new(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate_user(&state, &form.email, &form.password).await {
        Ok(user) if !user.email_verified => {
            auth::issue_verification(&state, &user.email, &user.full_name).await?;
            Ok(Redirect::to(&verify_location(&user.email, false)).into_response())
        }
        Ok(user) => {
            auth::touch_last_login(&state, user.id).await?;
            let session_id = auth::create_session(&state, user.id).await?;
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to("/me"),
            )
                .into_response())
        }
        Err(AppError::Unauthorized) => Ok(render_login_error(
            form.email,
            "we couldn't sign you in, please check your email and password".into(),
        )),
        Err(AppError::BadRequest(msg)) => Ok(render_login_error(form.email, msg)),
        Err(err) => Err(err),
    }
}

fn render_login_error(email: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(LoginTemplate {
            show_error: true,
            error_message: message,
            email,
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    show_error: bool,
    error_message: String,
    full_name: String,
    email: String,
}

async fn register_form() -> impl IntoResponse {
    AskamaTemplateResponse::into_response(RegisterTemplate {
        show_error: false,
        error_message: String::new(),
        full_name: String::new(),
        email: String::new(),
    })
}

#[derive(Deserialize)]
struct RegisterForm {
    full_name: String,
    email: String,
    password: String,
    password_confirm: String,
}

async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if form.password != form.password_confirm {
        return Ok(render_register_error(
            form.full_name,
            form.email,
            "the passwords don't match".into(),
        ));
    }

    match auth::register_user(&state, &form.full_name, &form.email, &form.password).await {
        Ok(user) => {
            auth::issue_verification(&state, &user.email, &user.full_name).await?;
            Ok(Redirect::to(&verify_location(&user.email, false)).into_response())
        }
        Err(AppError::BadRequest(msg)) => {
            Ok(render_register_error(form.full_name, form.email, msg))
        }
        Err(err) => Err(err),
    }
}

fn render_register_error(full_name: String, email: String, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        AskamaTemplateResponse::into_response(RegisterTemplate {
            show_error: true,
            error_message: message,
            full_name,
            email,
        }),
    )
        .into_response()
}

#[derive(Template)]
#[template(path = "auth/verify.html")]
pub struct VerifyTemplate {
    show_error: bool,
    error_message: String,
    show_notice: bool,
    email: String,
}

#[derive(Deserialize)]
struct VerifyParams {
    email: Option<String>,
    resent: Option<String>,
}

async fn verify_form(Query(params): Query<VerifyParams>) -> impl IntoResponse {
    AskamaTemplateResponse::into_response(VerifyTemplate {
        show_error: false,
        error_message: String::new(),
        show_notice: params.resent.is_some(),
        email: params.email.unwrap_or_default(),
    })
}

#[derive(Deserialize)]
struct VerifyForm {
    email: String,
    code: String,
}

async fn verify_submit(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Form(form): Form<VerifyForm>,
) -> Result<Response, AppError> {
    match auth::verify_email_code(&state, &form.email, &form.code).await {
        Ok(user) => {
            auth::touch_last_login(&state, user.id).await?;
            let session_id = auth::create_session(&state, user.id).await?;
            let next = if user.profile_complete() {
                "/me"
            } else {
                "/me/profile"
            };
            Ok((
                auth::apply_session_cookie(jar, &session_id),
                Redirect::to(next),
            )
                .into_response())
        }
        Err(AppError::BadRequest(msg)) => Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(VerifyTemplate {
                show_error: true,
                error_message: msg,
                show_notice: false,
                email: form.email,
            }),
        )
            .into_response()),
        Err(err) => Err(err),
    }
}

#[derive(Deserialize)]
struct ResendForm {
    email: String,
}

async fn verify_resend(
    State(state): State<AppState>,
    Form(form): Form<ResendForm>,
) -> Result<Response, AppError> {
    let Some(user) = auth::fetch_user_by_email(&state, &auth::normalize_email(&form.email)).await?
    else {
        return Ok((
            StatusCode::BAD_REQUEST,
            AskamaTemplateResponse::into_response(VerifyTemplate {
                show_error: true,
                error_message: "no account found for this email".into(),
                show_notice: false,
                email: form.email,
            }),
        )
            .into_response());
    };
    if user.email_verified {
        return Ok(Redirect::to("/login").into_response());
    }
    auth::issue_verification(&state, &user.email, &user.full_name).await?;
    Ok(Redirect::to(&verify_location(&user.email, true)).into_response())
}

async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        auth::destroy_session(&state, cookie.value()).await?;
    }
    Ok((auth::clear_session_cookie(jar), Redirect::to("/")))
}

fn verify_location(email: &str, resent: bool) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("email", email);
    if resent {
        query.append_pair("resent", "1");
    }
    format!("/verify?{}", query.finish())
}
