//! Request identity

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A user resolved by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub display_name: String,
}

impl AuthUser {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Who is invoking an operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Caller {
    #[default]
    Anonymous,
    User(AuthUser),
}

impl Caller {
    /// The resolved user, or `Unauthenticated` for anonymous callers
    pub fn require_user(&self) -> Result<&AuthUser> {
        match self {
            Self::User(user) => Ok(user),
            Self::Anonymous => Err(Error::Unauthenticated(
                "a signed-in user is required".to_string(),
            )),
        }
    }
}

impl From<AuthUser> for Caller {
    fn from(user: AuthUser) -> Self {
        Self::User(user)
    }
}
