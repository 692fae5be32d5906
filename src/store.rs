//! Canonical, server-held session records and the store that owns them.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Languages a session can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Java,
    Cpp,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::Go => "go",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user viewing or editing a session. Presence is advisory: participants
/// are recorded as they join and never removed on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub username: String,
}

/// Full session record. `code` is last-writer-wins; `updated_at` never moves
/// backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub language: Language,
    pub code: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl Session {
    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }

    fn summarize(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            language: self.language,
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            participant_count: self.participants.len(),
        }
    }
}

/// Directory projection of a session: everything but the code buffer and the
/// participant list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub language: Language,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub participant_count: usize,
}

/// One page of the session directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPage {
    pub items: Vec<SessionSummary>,
    pub total: usize,
}

/// Partial update applied with last-writer-wins semantics. Absent fields are
/// left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

/// Thread-safe in-memory session store.
///
/// Writes are unconditional overwrites: two participants saving within the
/// same poll interval clobber each other, which is the accepted tradeoff of
/// the polling model. The lock guards single-operation atomicity only.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(
        &self,
        title: &str,
        description: Option<String>,
        language: Language,
        creator: &Participant,
    ) -> Result<Session> {
        if title.trim().is_empty() {
            return Err(Error::validation("title must not be empty"));
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description,
            language,
            code: String::new(),
            created_by: creator.user_id.clone(),
            created_at: now,
            updated_at: now,
            participants: vec![creator.clone()],
        };

        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("session", id))
    }

    /// Pages through summaries ordered by creation time, newest first, with
    /// the id as tie-break so pagination stays stable across requests.
    pub async fn list(&self, limit: usize, offset: usize) -> SessionPage {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> =
            sessions.values().map(Session::summarize).collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = summaries.len();
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let items = summaries.into_iter().skip(offset).take(limit).collect();
        SessionPage { items, total }
    }

    pub async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::not_found("session", id))?;

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(Error::validation("title must not be empty"));
            }
            session.title = title;
        }
        if let Some(description) = update.description {
            session.description = Some(description);
        }
        if let Some(language) = update.language {
            session.language = language;
        }
        if let Some(code) = update.code {
            session.code = code;
        }
        session.touch();

        Ok(session.clone())
    }

    /// Removes the session outright. Deletion is terminal: a second delete
    /// reports `NotFound`, not an "already deleted" state.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("session", id))
    }

    /// Records a viewer. Adding an already-present user is a no-op.
    pub async fn add_participant(&self, id: &str, user: &Participant) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::not_found("session", id))?;

        if !session.participants.iter().any(|p| p.user_id == user.user_id) {
            session.participants.push(user.clone());
            session.touch();
        }
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
