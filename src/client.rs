//! Typed HTTP client for the session API.
//!
//! The credential is injected explicitly at construction; there is no
//! process-wide auth state.

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use serde::de::DeserializeOwned;

use crate::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::error::{Error, ErrorBody, Result};
use crate::executor::{ExecutionRequest, ExecutionResult};
use crate::store::{Language, Participant, Session, SessionPage, SessionUpdate};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        }
    }

    /// Registers a user against the identity provider and returns the issued
    /// credential. No token required.
    pub async fn signup(base_url: &str, req: &SignupRequest) -> Result<AuthResponse> {
        let res = reqwest::Client::new()
            .post(format!("{base_url}/auth/signup"))
            .json(req)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn login(base_url: &str, req: &LoginRequest) -> Result<AuthResponse> {
        let res = reqwest::Client::new()
            .post(format!("{base_url}/auth/login"))
            .json(req)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn create_session(
        &self,
        title: &str,
        language: Language,
        description: Option<&str>,
    ) -> Result<Session> {
        let body = serde_json::json!({
            "title": title,
            "language": language,
            "description": description,
        });
        let res = self
            .http
            .post(self.url("/sessions"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn list_sessions(&self, limit: usize, offset: usize) -> Result<SessionPage> {
        let res = self
            .http
            .get(self.url("/sessions"))
            .query(&[("limit", limit), ("offset", offset)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Session> {
        let res = self
            .http
            .get(self.url(&format!("/sessions/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn update_session(&self, id: &str, update: &SessionUpdate) -> Result<Session> {
        let res = self
            .http
            .put(self.url(&format!("/sessions/{id}")))
            .bearer_auth(&self.token)
            .json(update)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<()> {
        let res = self
            .http
            .delete(self.url(&format!("/sessions/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    pub async fn execute(&self, id: &str, req: &ExecutionRequest) -> Result<ExecutionResult> {
        let res = self
            .http
            .post(self.url(&format!("/sessions/{id}/execute")))
            .bearer_auth(&self.token)
            .json(req)
            .send()
            .await?;
        decode(res).await
    }

    pub async fn participants(&self, id: &str) -> Result<Vec<Participant>> {
        let res = self
            .http
            .get(self.url(&format!("/sessions/{id}/participants")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(res).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Fails non-2xx responses, mapping the status and server-reported message
/// back into the shared error taxonomy.
async fn check(res: reqwest::Response) -> Result<reqwest::Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let message = match res.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    // reqwest and axum share the same `http` status type.
    Err(Error::from_status(status, message))
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let res = check(res).await?;
    let value = res
        .json::<T>()
        .await
        .map_err(|err| Error::Transport(format!("invalid response body: {err}")))?;
    Ok(value)
}
