//! Execution gateway: forwards untrusted code to an execution backend and
//! passes the outcome through unchanged.

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::Language;

/// One execution payload. `code` and `input` are untrusted data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Outcome of one run. Ephemeral: never persisted server-side, lives only in
/// the requester's view for the duration of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Contract expected from an execution backend.
///
/// `Err` means the backend could not be reached at all; code that ran and
/// failed (compile error, runtime error, timeout) is an `Ok` result with
/// `success: false`. A failed execution is reported once, never retried.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult>;
}

const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs code locally through the language's interpreter.
///
/// Only interpreted languages are wired up; the rest report a failed result,
/// leaving isolation entirely to whatever this process runs inside.
pub struct ProcessBackend {
    timeout: Duration,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_EXEC_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult> {
        let (program, flag) = match req.language {
            Language::Python => ("python3", "-c"),
            Language::Javascript => ("node", "-e"),
            other => {
                return Ok(ExecutionResult::failed(format!(
                    "language {other} is not supported by the local backend"
                )))
            }
        };

        debug!(program, "spawning local execution");
        let spawned = Command::new(program)
            .arg(flag)
            .arg(&req.code)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            // A missing interpreter is an execution failure, not a gateway error.
            Err(err) => {
                return Ok(ExecutionResult::failed(format!(
                    "failed to start {program}: {err}"
                )))
            }
        };

        if let Some(input) = &req.input {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes()).await;
                // Dropping stdin closes the pipe so the child sees EOF.
            }
        } else {
            drop(child.stdin.take());
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            // Timeout drops the child handle, which kills the process.
            Err(_) => {
                return Ok(ExecutionResult::failed(format!(
                    "execution timed out after {:?}",
                    self.timeout
                )))
            }
            Ok(Err(err)) => return Ok(ExecutionResult::failed(format!("execution failed: {err}"))),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ExecutionResult::ok(format!("{stdout}{stderr}")))
        } else {
            let error = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            Ok(ExecutionResult {
                success: false,
                output: if stdout.is_empty() { None } else { Some(stdout) },
                error: Some(error),
            })
        }
    }
}

/// Forwards executions to a remote executor service over HTTP.
pub struct HttpBackend {
    http: reqwest::Client,
    url: String,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult> {
        let res = self.http.post(&self.url).json(req).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("executor returned {status}")));
        }

        let result = res
            .json::<ExecutionResult>()
            .await
            .map_err(|err| Error::Transport(format!("invalid executor response: {err}")))?;
        Ok(result)
    }
}
