//! Collaborative code sessions: a canonical session store served over HTTP,
//! an execution gateway, and the polling sync client that keeps each open
//! view consistent with the server.

pub mod auth;
pub mod client;
pub mod error;
pub mod executor;
pub mod http_server;
pub mod state;
pub mod store;
pub mod sync;

#[cfg(test)]
pub mod test_support;
