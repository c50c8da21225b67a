use async_trait::async_trait;
use thiserror::Error;

use crate::types::Update;

pub mod longpoll;
pub mod vk;

pub use longpoll::{LongPoller, PollSession, PollState, StepOutcome};

/// Failures seen by the long-poll loop
#[derive(Debug, Error)]
pub enum PollError {
    /// Network failure or timeout, retried with a fixed pause
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body could not be understood, never retried
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("failed to acquire long poll session: {0}")]
    Acquire(String),
    /// Terminal state, the process has to be restarted externally
    #[error("long poll stopped: {0}")]
    Fatal(String),
}

/// Endpoint, key and starting cursor handed out by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub endpoint: String,
    pub key: String,
    pub cursor: String,
}

/// One poll response: either a failure code or a batch of updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub failed: Option<i64>,
    pub cursor: Option<String>,
    pub updates: Vec<Update>,
}

/// Trait every long-poll platform adapter implements
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Obtain a fresh endpoint, session key and cursor
    async fn acquire(&self) -> Result<SessionGrant, PollError>;

    /// Issue a single poll call, holding it open for at most `wait_seconds`
    async fn poll(&self, session: &PollSession, wait_seconds: u64) -> Result<RawResponse, PollError>;

    /// Get the platform identifier (e.g., "vk")
    fn platform_name(&self) -> &str;
}
