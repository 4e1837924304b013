use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;

use crate::{error::AppError, models::trip::Trip};

const TRIPS_FILE: &str = "trips.json";

/// Trip history storage: one JSON array per user under the data root.
/// Single-writer semantics, whole-file rewrite on every mutation.
#[derive(Clone)]
pub struct TripStore {
    root: Arc<PathBuf>,
}

impl TripStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        let users = self.root().join("users");
        fs::create_dir_all(users).await?;
        Ok(())
    }

    pub fn user_dir(&self, user_uuid: &str) -> PathBuf {
        self.root().join("users").join(user_uuid)
    }

    pub async fn ensure_user_dir(&self, user_uuid: &str) -> Result<PathBuf, AppError> {
        let dir = self.user_dir(user_uuid);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn load_user_trips(&self, user_uuid: &str) -> Result<Vec<Trip>, AppError> {
        let path = self.user_dir(user_uuid).join(TRIPS_FILE);
        if !fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        let trips: Vec<Trip> =
            serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(trips)
    }

    pub async fn save_user_trips(&self, user_uuid: &str, trips: &[Trip]) -> Result<(), AppError> {
        let dir = self.ensure_user_dir(user_uuid).await?;
        let path = dir.join(TRIPS_FILE);
        let data = serde_json::to_vec_pretty(trips).map_err(|err| AppError::Other(err.into()))?;
        fs::write(path, data).await?;
        Ok(())
    }

    pub async fn append_trip(&self, user_uuid: &str, trip: Trip) -> Result<Trip, AppError> {
        let mut items = self.load_user_trips(user_uuid).await?;
        items.push(trip.clone());
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.save_user_trips(user_uuid, &items).await?;
        Ok(trip)
    }

    /// Removes exactly the trip with the given id. Returns false when no such
    /// trip exists; the rest of the list is left untouched either way.
    pub async fn delete_trip(&self, user_uuid: &str, trip_id: &str) -> Result<bool, AppError> {
        let mut items = self.load_user_trips(user_uuid).await?;
        let before = items.len();
        items.retain(|trip| trip.id != trip_id);
        if items.len() == before {
            return Ok(false);
        }
        self.save_user_trips(user_uuid, &items).await?;
        Ok(true)
    }

    pub async fn clear_trips(&self, user_uuid: &str) -> Result<(), AppError> {
        self.save_user_trips(user_uuid, &[]).await
    }
}
