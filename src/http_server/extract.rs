use std::sync::Arc;

use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::entities;
use crate::error::AppError;
use crate::http_server::state::AppState;
use crate::services::auth::AuthService;

/// JSON body whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// The authenticated caller, resolved from an `Authorization: Bearer` header.
pub struct CurrentUser {
    pub user: entities::user::Model,
    pub token: String,
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("Missing or invalid bearer token"))?;

        let token = bearer.token().to_string();
        let user = AuthService::new(state.db.clone(), state.config.session_ttl_hours)
            .authenticate(&token)
            .await?;

        Ok(Self { user, token })
    }
}

/// Like [`CurrentUser`] for routes that also serve anonymous callers.
/// A header that is present but invalid is still rejected.
pub struct MaybeUser(pub Option<entities::user::Model>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(Self(None));
        }
        let current = CurrentUser::from_request_parts(parts, state).await?;
        Ok(Self(Some(current.user)))
    }
}
