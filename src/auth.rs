use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::{MediaId, MediaRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Listener,
    Premium,
    Admin,
}

/// Identity of whoever is asking to stream.
///
/// Authentication happens upstream: a layer that has verified the request
/// inserts a `Caller` into the request extensions. Requests without one are
/// anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Caller {
    #[default]
    Anonymous,
    Authenticated { subject: String, roles: Vec<Role> },
}

impl Caller {
    pub fn authenticated(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Caller::Authenticated {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated { .. })
    }

    pub fn has_role(&self, role: Role) -> bool {
        match self {
            Caller::Anonymous => false,
            Caller::Authenticated { roles, .. } => roles.contains(&role),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

/// Decides whether a caller may stream a media item.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn can_stream(&self, id: MediaId, caller: &Caller) -> bool;
}

/// Lets everyone stream everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationGate for AllowAll {
    async fn can_stream(&self, _id: MediaId, _caller: &Caller) -> bool {
        true
    }
}

/// Restricts premium items to authenticated callers holding the
/// [`Role::Premium`] or [`Role::Admin`] role.
///
/// Unknown ids are allowed so that the lookup can answer with a 404.
#[derive(Debug, Clone)]
pub struct PremiumGate<R> {
    repository: R,
}

impl<R: MediaRepository> PremiumGate<R> {
    pub fn new(repository: R) -> Self {
        PremiumGate { repository }
    }
}

#[async_trait]
impl<R: MediaRepository> AuthorizationGate for PremiumGate<R> {
    async fn can_stream(&self, id: MediaId, caller: &Caller) -> bool {
        let Some(media) = self.repository.find_by_id(id).await else {
            return true;
        };

        if !media.premium {
            return true;
        }

        caller.has_role(Role::Premium) || caller.has_role(Role::Admin)
    }
}
