pub mod activity;
pub mod album;
pub mod artist;
pub mod auth;
pub mod media_store;
pub mod music;
pub mod player;
pub mod playlist;
pub mod review;
pub mod upload;
pub mod user;

use serde::{Deserialize, Deserializer};

use crate::entities;
use crate::error::{AppError, AppResult};

/// Allow `owner` (or an admin) to touch a record.
pub(crate) fn ensure_owner_or_admin(
    actor: &entities::user::Model,
    owner_id: Option<i64>,
) -> AppResult<()> {
    if actor.is_admin() || owner_id == Some(actor.id) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You do not have permission to modify this resource",
        ))
    }
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
