#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DashboardKind {
    #[default]
    #[serde(rename = "professional")]
    Professional,
    #[serde(rename = "enterprise")]
    Enterprise,
}

impl DashboardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashboardKind::Professional => "professional",
            DashboardKind::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "professional" => Some(DashboardKind::Professional),
            "enterprise" => Some(DashboardKind::Enterprise),
            _ => None,
        }
    }
}

impl fmt::Display for DashboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "dark")]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub occupation: Option<String>,
    pub industry: Option<String>,
    pub dashboard: String,
    pub theme: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn dashboard_kind(&self) -> DashboardKind {
        DashboardKind::parse(&self.dashboard).unwrap_or_default()
    }

    pub fn theme_kind(&self) -> Theme {
        Theme::parse(&self.theme).unwrap_or_default()
    }

    pub fn profile_complete(&self) -> bool {
        self.occupation.is_some() && self.industry.is_some()
    }
}
