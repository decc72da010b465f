use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::errors::ApiError;

pub const AUTHOR_ID_HEADER: &str = "x-author-id";
pub const AUTHOR_ROLE_HEADER: &str = "x-author-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Writer,
    User,
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "writer" => Ok(Role::Writer),
            "user" => Ok(Role::User),
            other => Err(ApiError::BadRequest(format!("Unknown author role '{other}'"))),
        }
    }
}

/// Verified caller, as forwarded by the gateway in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Authors may change their own items; admins may change anything.
    pub fn ensure_can_modify(&self, owner: &str) -> Result<(), ApiError> {
        if self.role == Role::Admin || self.id == owner {
            return Ok(());
        }
        debug!(caller = %self.id, owner = %owner, "Caller does not own this item");
        Err(ApiError::Forbidden)
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, AUTHOR_ID_HEADER).ok_or(ApiError::Unauthenticated)?;
        let role = match header(parts, AUTHOR_ROLE_HEADER) {
            Some(role) => role.parse()?,
            None => Role::User,
        };
        Ok(Caller::new(id, role))
    }
}
