//! Request actor.
//!
//! Sessions are handled upstream; the auth proxy forwards the user id in
//! `x-user-id` and sets `x-user-role: admin` for back-office users.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::services::Actor;
use crate::CommerceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Any signed-in user.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub Actor);

/// A signed-in back-office user.
#[derive(Clone, Copy, Debug)]
pub struct AdminUser(pub Actor);

fn actor(parts: &Parts) -> Result<Actor, CommerceError> {
    let user_id = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or(CommerceError::Unauthorized)?;
    let is_admin = parts
        .headers
        .get(USER_ROLE_HEADER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|role| role.trim().eq_ignore_ascii_case("admin"));
    Ok(Actor { user_id, is_admin })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor(parts).map(Self)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = CommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = actor(parts)?;
        if !actor.is_admin {
            tracing::warn!(user_id = %actor.user_id, uri = %parts.uri, "admin route refused");
            return Err(CommerceError::Unauthorized);
        }
        Ok(Self(actor))
    }
}

/// JSON body that has passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CommerceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| CommerceError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
