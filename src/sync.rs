//! Per-view session synchronization.
//!
//! Each open session view runs one event loop that owns the local view state.
//! A fixed-interval timer re-fetches the canonical session; edit, save,
//! execute, and close commands arrive over a channel and are processed one at
//! a time, so a view never has two operations in flight. Snapshots of the
//! view are published over a watch channel for whatever UI embeds the view.
//!
//! The load-bearing rule: the edit buffer is seeded from the canonical code
//! exactly once, when the view first loads, and no poll response ever touches
//! it afterwards. Everything else in the shadow session is overwritten
//! wholesale on every refresh.

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::executor::{ExecutionRequest, ExecutionResult};
use crate::store::{Session, SessionUpdate};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Saving,
    Executing,
    Closed,
}

/// Client-owned shadow of one session plus the user's in-flight edits.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub state: ViewState,
    pub session: Option<Session>,
    pub edit_buffer: String,
    pub last_execution: Option<ExecutionResult>,
    pub last_error: Option<Error>,
    /// Set when the credential was rejected; the embedding UI must force
    /// re-authentication rather than retry.
    pub needs_reauth: bool,
}

impl SessionView {
    fn new() -> Self {
        Self {
            state: ViewState::Idle,
            session: None,
            edit_buffer: String::new(),
            last_execution: None,
            last_error: None,
            needs_reauth: false,
        }
    }

    /// First load: seeds the edit buffer from the canonical code.
    fn apply_initial(&mut self, session: Session) {
        self.edit_buffer = session.code.clone();
        self.session = Some(session);
        self.state = ViewState::Ready;
    }

    /// Poll refresh: replaces the session shadow wholesale and leaves the
    /// edit buffer alone.
    fn apply_refresh(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn fail(&mut self, err: Error) {
        self.needs_reauth = matches!(err, Error::Unauthorized(_));
        self.last_error = Some(err);
        self.state = ViewState::Closed;
    }
}

enum Command {
    Edit(String),
    Save,
    Execute(Option<String>),
    Close,
}

/// Handle to an open session view.
///
/// Commands are fire-and-forget; outcomes (including save/execute failures)
/// land on the published view's `last_error` and `last_execution` fields.
/// Dropping the handle ends the loop after any in-flight operation completes;
/// [`SyncHandle::close`] cancels immediately and discards in-flight results.
#[derive(Debug)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl SyncHandle {
    /// Current snapshot of the view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that observes every published view change.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Replaces the edit buffer with what the user is currently typing.
    /// Never blocks, even while a fetch or execution is pending.
    pub fn edit(&self, code: impl Into<String>) {
        let _ = self.tx.send(Command::Edit(code.into()));
    }

    /// Pushes the edit buffer to the canonical session.
    pub fn save(&self) {
        let _ = self.tx.send(Command::Save);
    }

    /// Runs the edit buffer (not the persisted code) with optional stdin.
    /// Requests queue behind any outstanding operation; they never overlap.
    pub fn execute(&self, input: Option<String>) {
        let _ = self.tx.send(Command::Execute(input));
    }

    /// Closes the view: stops the poll timer and discards the result of any
    /// operation still in flight.
    pub async fn close(self) {
        self.cancel.cancel();
        let _ = self.tx.send(Command::Close);
        let _ = self.task.await;
    }
}

/// Opens a session view: fetches the session, seeds the edit buffer, and
/// starts the poll loop. Fails without spawning anything if the initial fetch
/// fails.
pub async fn open(api: ApiClient, session_id: impl Into<String>) -> Result<SyncHandle> {
    open_with_interval(api, session_id, DEFAULT_POLL_INTERVAL).await
}

pub async fn open_with_interval(
    api: ApiClient,
    session_id: impl Into<String>,
    poll_interval: Duration,
) -> Result<SyncHandle> {
    let session_id = session_id.into();

    let mut view = SessionView::new();
    view.state = ViewState::Loading;
    let session = api.get_session(&session_id).await?;
    view.apply_initial(session);
    info!(session_id = %session_id, "opened session view");

    let (tx, rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(view.clone());
    let cancel = CancellationToken::new();

    let worker = Worker {
        api,
        session_id,
        view,
        view_tx,
        cancel: cancel.clone(),
        poll_interval,
    };
    let task = tokio::spawn(worker.run(rx));

    Ok(SyncHandle {
        tx,
        view: view_rx,
        cancel,
        task,
    })
}

struct Worker {
    api: ApiClient,
    session_id: String,
    view: SessionView,
    view_tx: watch::Sender<SessionView>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = interval(self.poll_interval);
        // Ticks that elapse while an operation is in flight are skipped, so
        // fetches never overlap and stale responses cannot arrive out of order.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the open fetch just happened.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.poll().await,
                cmd = rx.recv() => match cmd {
                    None | Some(Command::Close) => break,
                    Some(Command::Edit(code)) => {
                        self.view.edit_buffer = code;
                        self.publish();
                    }
                    Some(Command::Save) => self.save().await,
                    Some(Command::Execute(input)) => self.execute(input).await,
                },
            }
            if self.view.state == ViewState::Closed {
                break;
            }
        }

        self.view.state = ViewState::Closed;
        self.publish();
        info!(session_id = %self.session_id, "closed session view");
    }

    fn publish(&self) {
        let _ = self.view_tx.send(self.view.clone());
    }

    /// One poll tick. A transport failure is swallowed: the view stays
    /// `Ready` and the next tick retries.
    async fn poll(&mut self) {
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return,
            res = self.api.get_session(&self.session_id) => res,
        };

        match fetched {
            Ok(session) => {
                self.view.apply_refresh(session);
                self.publish();
            }
            Err(err) if err.is_fatal_to_view() => {
                self.view.fail(err);
                self.publish();
            }
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "poll failed; retrying next tick");
            }
        }
    }

    async fn save(&mut self) {
        self.view.state = ViewState::Saving;
        self.view.last_error = None;
        self.publish();

        let update = SessionUpdate {
            code: Some(self.view.edit_buffer.clone()),
            ..Default::default()
        };
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            res = self.api.update_session(&self.session_id, &update) => res,
        };

        match result {
            Ok(session) => {
                // The update response is the fresh canonical session, which
                // doubles as the immediate post-save refresh.
                self.view.apply_refresh(session);
                self.view.state = ViewState::Ready;
                self.publish();
            }
            Err(err) if err.is_fatal_to_view() => {
                self.view.fail(err);
                self.publish();
            }
            Err(err) => {
                // The edit buffer is untouched; no automatic retry of a save.
                self.view.state = ViewState::Ready;
                self.view.last_error = Some(err);
                self.publish();
            }
        }
    }

    async fn execute(&mut self, input: Option<String>) {
        let Some(language) = self.view.session.as_ref().map(|s| s.language) else {
            self.view.last_error = Some(Error::validation("view has no loaded session"));
            self.publish();
            return;
        };

        self.view.state = ViewState::Executing;
        self.view.last_error = None;
        self.publish();

        let req = ExecutionRequest {
            code: self.view.edit_buffer.clone(),
            language,
            input,
        };
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return,
            res = self.api.execute(&self.session_id, &req) => res,
        };

        match result {
            Ok(outcome) => {
                self.view.last_execution = Some(outcome);
                self.view.state = ViewState::Ready;
                self.publish();
            }
            Err(err) if err.is_fatal_to_view() => {
                self.view.fail(err);
                self.publish();
            }
            Err(err) => {
                // Reported once; execution is never retried behind the
                // user's back.
                self.view.state = ViewState::Ready;
                self.view.last_error = Some(err);
                self.publish();
            }
        }
    }
}
