use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Browser flows land on the login page instead of a bare 401 body.
        if matches!(self, AppError::Unauthorized) {
            return Redirect::to("/login").into_response();
        }

        let status = match self {
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Database(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Http(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}
