use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

use crate::error::AppError;
use crate::model::role::Role;

/// Caller identity, put into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string())),
        )
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".to_string()))
        }
    }

    pub fn require_self_or_admin(&self, username: &str) -> Result<(), AppError> {
        if self.is_admin() || self.username == username {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to access another user's records".to_string()))
        }
    }

    /// `requested` when the caller may see it, otherwise the caller's own name.
    /// Defaults to the caller.
    pub fn resolve_target(&self, requested: Option<&str>) -> Result<String, AppError> {
        match requested {
            Some(username) => {
                self.require_self_or_admin(username)?;
                Ok(username.to_string())
            }
            None => Ok(self.username.clone()),
        }
    }
}
