//! Bearer-credential contract and an in-memory stand-in identity provider.
//!
//! Token issuance and verification belong to an external collaborator; the
//! core only depends on the [`TokenVerifier`] contract. [`MemoryAuth`] stands
//! in for that collaborator so the server runs self-contained: it keeps users
//! and issued tokens in process memory and makes no durability promises.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Participant;

/// Resolves a bearer token to the identity it was issued for.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns `Unauthorized` for unknown, malformed, or expired tokens.
    async fn verify(&self, token: &str) -> Result<Participant>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub token_type: String,
}

struct StoredUser {
    user: User,
    password: String,
}

#[derive(Default)]
struct AuthInner {
    users: HashMap<String, StoredUser>,
    // token -> user id
    tokens: HashMap<String, String>,
}

/// In-memory identity provider.
pub struct MemoryAuth {
    inner: RwLock<AuthInner>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AuthInner::default()),
        }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<AuthResponse> {
        if req.username.trim().len() < 3 {
            return Err(Error::validation("username must be at least 3 characters"));
        }
        if !req.email.contains('@') {
            return Err(Error::validation("email is not valid"));
        }
        if req.password.len() < 8 {
            return Err(Error::validation("password must be at least 8 characters"));
        }

        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.user.email == req.email) {
            return Err(Error::validation("email is already registered"));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: req.username.trim().to_string(),
            email: req.email,
            created_at: Utc::now(),
        };
        inner.users.insert(
            user.id.clone(),
            StoredUser {
                user: user.clone(),
                password: req.password,
            },
        );

        let token = issue(&mut inner, &user.id);
        Ok(AuthResponse {
            user,
            access_token: token,
            token_type: "bearer".to_string(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .values()
            .find(|u| u.user.email == req.email && u.password == req.password)
            .map(|u| u.user.clone())
            .ok_or_else(|| Error::unauthorized("invalid email or password"))?;

        let token = issue(&mut inner, &user.id);
        Ok(AuthResponse {
            user,
            access_token: token,
            token_type: "bearer".to_string(),
        })
    }

    /// Invalidates one issued token.
    pub async fn logout(&self, token: &str) {
        self.inner.write().await.tokens.remove(token);
    }
}

fn issue(inner: &mut AuthInner, user_id: &str) -> String {
    let token = Uuid::new_v4().to_string();
    inner.tokens.insert(token.clone(), user_id.to_string());
    token
}

#[async_trait]
impl TokenVerifier for MemoryAuth {
    async fn verify(&self, token: &str) -> Result<Participant> {
        let inner = self.inner.read().await;
        let user_id = inner
            .tokens
            .get(token)
            .ok_or_else(|| Error::unauthorized("invalid or expired token"))?;
        let stored = inner
            .users
            .get(user_id)
            .ok_or_else(|| Error::unauthorized("token refers to an unknown user"))?;
        Ok(Participant {
            user_id: stored.user.id.clone(),
            username: stored.user.username.clone(),
        })
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}
