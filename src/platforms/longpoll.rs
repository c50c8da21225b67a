// src/platforms/longpoll.rs - Long-poll session state machine with failure recovery

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::LongPollConfig;
use crate::platforms::{PollError, PollSource, RawResponse, SessionGrant};
use crate::types::{PolledUpdate, UpdateKind};

/// Live session, owned exclusively by the poll loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollSession {
    pub endpoint: String,
    pub key: String,
    pub cursor: String,
    pub acquired_at: DateTime<Utc>,
}

impl From<SessionGrant> for PollSession {
    fn from(grant: SessionGrant) -> Self {
        Self {
            endpoint: grant.endpoint,
            key: grant.key,
            cursor: grant.cursor,
            acquired_at: Utc::now(),
        }
    }
}

impl PollSession {
    /// Time since the server handed out this session
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Acquiring,
    Polling,
    /// The last response carried a failure code, and possibly a cursor to resume from
    Recovering { code: i64, cursor: Option<String> },
    Fatal,
}

/// How a protocol failure code is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    AdoptCursor,
    Reacquire,
    Unresolved,
}

impl Recovery {
    pub fn for_code(code: i64) -> Self {
        match code {
            1 => Recovery::AdoptCursor,
            2 | 3 | 4 => Recovery::Reacquire,
            _ => Recovery::Unresolved,
        }
    }
}

/// Text for known failure codes, `None` for anything the loop cannot resolve
pub fn failure_description(code: i64) -> Option<&'static str> {
    match code {
        1 => Some("event history is outdated or partially lost"),
        2 => Some("session key expired"),
        3 => Some("session information lost"),
        4 => Some("invalid protocol version"),
        _ => None,
    }
}

/// What a single step of the loop did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Acquired,
    /// Successful poll with no updates
    Idle,
    Emitted(usize),
    /// The response carried this failure code
    Failed(i64),
    Recovered(i64),
    /// Transient failure, the loop slept; holds the consecutive error count
    Backoff(u32),
    /// The consumer side of the channel is gone
    Closed,
    Fatal(String),
}

pub struct LongPoller {
    source: Arc<dyn PollSource>,
    config: LongPollConfig,
    state: PollState,
    session: Option<PollSession>,
    consecutive_errors: u32,
}

impl LongPoller {
    pub fn new(source: Arc<dyn PollSource>, config: LongPollConfig) -> Self {
        Self {
            source,
            config,
            state: PollState::Acquiring,
            session: None,
            consecutive_errors: 0,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn session(&self) -> Option<&PollSession> {
        self.session.as_ref()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Obtain a fresh session. On failure the loop stays in `Acquiring`.
    pub async fn acquire(&mut self) -> Result<(), PollError> {
        match self.source.acquire().await {
            Ok(grant) => {
                info!(
                    "Acquired {} long poll session at {} (cursor {})",
                    self.source.platform_name(),
                    grant.endpoint,
                    grant.cursor
                );
                self.session = Some(PollSession::from(grant));
                self.state = PollState::Polling;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to acquire {} long poll session: {}", self.source.platform_name(), e);
                self.session = None;
                self.state = PollState::Acquiring;
                Err(match e {
                    PollError::Acquire(reason) => PollError::Acquire(reason),
                    other => PollError::Acquire(other.to_string()),
                })
            }
        }
    }

    /// Drive the loop until it reaches `Fatal` or the consumer hangs up
    pub async fn run(&mut self, tx: mpsc::Sender<PolledUpdate>) -> Result<(), PollError> {
        info!("{} long poll loop started", self.source.platform_name());

        loop {
            match self.step(&tx).await {
                StepOutcome::Fatal(reason) => {
                    error!("{} long poll loop stopped: {}", self.source.platform_name(), reason);
                    return Err(PollError::Fatal(reason));
                }
                StepOutcome::Closed => {
                    info!("Update consumer closed, stopping {} long poll loop", self.source.platform_name());
                    return Ok(());
                }
                outcome => debug!("Long poll step: {:?}", outcome),
            }
        }
    }

    /// Perform one transition of the state machine
    pub async fn step(&mut self, tx: &mpsc::Sender<PolledUpdate>) -> StepOutcome {
        match self.state.clone() {
            PollState::Acquiring => self.acquire_step().await,
            PollState::Polling => self.poll_once(tx).await,
            PollState::Recovering { code, cursor } => self.recover(code, cursor).await,
            PollState::Fatal => StepOutcome::Fatal("long poll loop already stopped".to_string()),
        }
    }

    async fn acquire_step(&mut self) -> StepOutcome {
        match self.acquire().await {
            Ok(()) => StepOutcome::Acquired,
            Err(e) => self.register_error(e.to_string()).await,
        }
    }

    async fn poll_once(&mut self, tx: &mpsc::Sender<PolledUpdate>) -> StepOutcome {
        let Some(session) = self.session.as_ref() else {
            return self.acquire_step().await;
        };

        let result = self.source.poll(session, self.config.wait_seconds).await;
        match result {
            Ok(response) => self.handle_response(response, tx).await,
            Err(PollError::Transport(reason)) => {
                warn!("Long poll transport error: {}", reason);
                self.register_error(reason).await
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    async fn handle_response(&mut self, response: RawResponse, tx: &mpsc::Sender<PolledUpdate>) -> StepOutcome {
        if let Some(code) = response.failed {
            warn!(
                "Long poll returned failure code {}: {}",
                code,
                failure_description(code).unwrap_or("unknown failure")
            );
            self.state = PollState::Recovering {
                code,
                cursor: response.cursor,
            };
            return StepOutcome::Failed(code);
        }

        if self.consecutive_errors > 0 {
            info!("Long poll recovered after {} consecutive errors", self.consecutive_errors);
        }
        self.consecutive_errors = 0;

        if response.updates.is_empty() {
            return StepOutcome::Idle;
        }

        if let (Some(session), Some(cursor)) = (self.session.as_mut(), response.cursor) {
            session.cursor = cursor;
        }

        let mut emitted = 0;
        for update in response.updates {
            let Some(kind) = UpdateKind::from_tag(&update.event_type) else {
                debug!("Skipping update of type {}", update.event_type);
                continue;
            };

            if tx.send(PolledUpdate { kind, update }).await.is_err() {
                return StepOutcome::Closed;
            }
            emitted += 1;
        }

        StepOutcome::Emitted(emitted)
    }

    async fn recover(&mut self, code: i64, cursor: Option<String>) -> StepOutcome {
        match (Recovery::for_code(code), cursor) {
            (Recovery::AdoptCursor, Some(cursor)) => {
                if let Some(session) = self.session.as_mut() {
                    debug!("Adopting cursor {} after history loss", cursor);
                    session.cursor = cursor;
                }
                self.state = PollState::Polling;
                StepOutcome::Recovered(code)
            }
            (Recovery::Reacquire, _) => {
                let age = self.session.take().map(|session| session.age().num_seconds()).unwrap_or_default();
                info!(
                    "Re-acquiring long poll session after failure code {} (session was {}s old), waiting {:?}",
                    code,
                    age,
                    self.config.wait_period()
                );
                // not a transient error, so the error counter is left alone
                sleep(self.config.wait_period()).await;
                self.state = PollState::Acquiring;
                StepOutcome::Recovered(code)
            }
            _ => self.fail(format!("unresolved long poll failure code {}", code)),
        }
    }

    /// Count a transient failure, pausing or giving up at the limit
    async fn register_error(&mut self, reason: String) -> StepOutcome {
        self.consecutive_errors += 1;

        if self.consecutive_errors >= self.config.errors_limit {
            return self.fail(format!(
                "{} consecutive errors, last: {}",
                self.consecutive_errors, reason
            ));
        }

        warn!(
            "Long poll error {} of {}, retrying in {:?}",
            self.consecutive_errors,
            self.config.errors_limit,
            self.config.wait_period()
        );
        sleep(self.config.wait_period()).await;
        StepOutcome::Backoff(self.consecutive_errors)
    }

    fn fail(&mut self, reason: String) -> StepOutcome {
        self.state = PollState::Fatal;
        StepOutcome::Fatal(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::types::Update;

    #[derive(Default)]
    struct ScriptedSource {
        acquires: Mutex<VecDeque<Result<SessionGrant, PollError>>>,
        polls: Mutex<VecDeque<Result<RawResponse, PollError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self::default()
        }

        fn grant(self, key: &str, cursor: &str) -> Self {
            self.acquires.lock().unwrap().push_back(Ok(SessionGrant {
                endpoint: "https://lp.example.com/poll".to_string(),
                key: key.to_string(),
                cursor: cursor.to_string(),
            }));
            self
        }

        fn acquire_error(self) -> Self {
            self.acquires
                .lock()
                .unwrap()
                .push_back(Err(PollError::Acquire("unauthorized".to_string())));
            self
        }

        fn respond(self, response: RawResponse) -> Self {
            self.polls.lock().unwrap().push_back(Ok(response));
            self
        }

        fn fail_with(self, error: PollError) -> Self {
            self.polls.lock().unwrap().push_back(Err(error));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PollSource for ScriptedSource {
        async fn acquire(&self) -> Result<SessionGrant, PollError> {
            self.calls.lock().unwrap().push("acquire".to_string());
            self.acquires
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PollError::Acquire("script exhausted".to_string())))
        }

        async fn poll(&self, session: &PollSession, _wait_seconds: u64) -> Result<RawResponse, PollError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("poll {} {}", session.key, session.cursor));
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PollError::Transport("script exhausted".to_string())))
        }

        fn platform_name(&self) -> &str {
            "scripted"
        }
    }

    fn config(errors_limit: u32) -> LongPollConfig {
        LongPollConfig {
            errors_limit,
            wait_period_seconds: 0,
            wait_seconds: 0,
        }
    }

    fn scripted_poller(source: &Arc<ScriptedSource>, errors_limit: u32) -> LongPoller {
        let source: Arc<dyn PollSource> = source.clone();
        LongPoller::new(source, config(errors_limit))
    }

    fn failed(code: i64, cursor: Option<&str>) -> RawResponse {
        RawResponse {
            failed: Some(code),
            cursor: cursor.map(str::to_string),
            updates: Vec::new(),
        }
    }

    fn updates(cursor: &str, tags: &[&str]) -> RawResponse {
        RawResponse {
            failed: None,
            cursor: Some(cursor.to_string()),
            updates: tags
                .iter()
                .map(|tag| Update {
                    event_type: tag.to_string(),
                    text: format!("{} text", tag),
                    from_id: 7,
                    ..Default::default()
                })
                .collect(),
        }
    }

    fn transport() -> PollError {
        PollError::Transport("connection reset".to_string())
    }

    #[tokio::test]
    async fn test_key_expiry_reacquires_before_next_poll() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "10")
                .grant("k2", "15")
                .respond(failed(2, None))
                .respond(RawResponse::default()),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(poller.step(&tx).await, StepOutcome::Acquired);
        assert_eq!(poller.step(&tx).await, StepOutcome::Failed(2));
        assert_eq!(poller.step(&tx).await, StepOutcome::Recovered(2));
        assert_eq!(poller.state(), &PollState::Acquiring);
        assert_eq!(poller.step(&tx).await, StepOutcome::Acquired);
        assert_eq!(poller.step(&tx).await, StepOutcome::Idle);

        assert_eq!(source.calls(), vec!["acquire", "poll k1 10", "acquire", "poll k2 15"]);
    }

    #[tokio::test]
    async fn test_data_loss_and_version_codes_reacquire() {
        for code in [3, 4] {
            let source = Arc::new(ScriptedSource::new().grant("k1", "1").grant("k2", "2").respond(failed(code, None)));
            let mut poller = scripted_poller(&source, 3);
            let (tx, _rx) = mpsc::channel(8);

            poller.step(&tx).await;
            poller.step(&tx).await;
            assert_eq!(poller.step(&tx).await, StepOutcome::Recovered(code));
            assert_eq!(poller.step(&tx).await, StepOutcome::Acquired);
            assert_eq!(poller.session().map(|s| s.key.as_str()), Some("k2"));
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_transport_errors_reach_fatal_at_limit() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "1")
                .fail_with(transport())
                .fail_with(transport())
                .fail_with(transport()),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        assert_eq!(poller.step(&tx).await, StepOutcome::Backoff(1));
        assert_eq!(poller.step(&tx).await, StepOutcome::Backoff(2));
        assert!(matches!(poller.step(&tx).await, StepOutcome::Fatal(_)));
        assert_eq!(poller.state(), &PollState::Fatal);
    }

    #[tokio::test]
    async fn test_success_resets_error_counter() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "1")
                .fail_with(transport())
                .fail_with(transport())
                .respond(RawResponse::default())
                .fail_with(transport())
                .fail_with(transport()),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        poller.step(&tx).await;
        poller.step(&tx).await;
        assert_eq!(poller.consecutive_errors(), 2);
        assert_eq!(poller.step(&tx).await, StepOutcome::Idle);
        assert_eq!(poller.consecutive_errors(), 0);
        assert_eq!(poller.step(&tx).await, StepOutcome::Backoff(1));
        assert_eq!(poller.step(&tx).await, StepOutcome::Backoff(2));
        assert_eq!(poller.state(), &PollState::Polling);
    }

    #[tokio::test]
    async fn test_history_loss_adopts_cursor() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "10")
                .fail_with(transport())
                .respond(failed(1, Some("42")))
                .respond(RawResponse::default()),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        poller.step(&tx).await;
        assert_eq!(poller.step(&tx).await, StepOutcome::Failed(1));
        assert_eq!(poller.consecutive_errors(), 1);
        assert_eq!(poller.step(&tx).await, StepOutcome::Recovered(1));
        assert_eq!(poller.state(), &PollState::Polling);
        poller.step(&tx).await;

        assert_eq!(source.calls(), vec!["acquire", "poll k1 10", "poll k1 10", "poll k1 42"]);
    }

    #[tokio::test]
    async fn test_unresolved_codes_are_fatal() {
        let source = Arc::new(ScriptedSource::new().grant("k1", "1").respond(failed(9, None)));
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        poller.step(&tx).await;
        assert!(matches!(poller.step(&tx).await, StepOutcome::Fatal(_)));

        let source = Arc::new(ScriptedSource::new().grant("k1", "1").respond(failed(1, None)));
        let mut poller = scripted_poller(&source, 3);
        poller.step(&tx).await;
        poller.step(&tx).await;
        assert!(matches!(poller.step(&tx).await, StepOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn test_parse_error_is_immediately_fatal() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "1")
                .fail_with(PollError::Parse("expected value at line 1".to_string())),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        assert!(matches!(poller.step(&tx).await, StepOutcome::Fatal(_)));
        assert_eq!(poller.consecutive_errors(), 0);
    }

    #[tokio::test]
    async fn test_updates_are_tagged_and_cursor_advances() {
        let source = Arc::new(
            ScriptedSource::new()
                .grant("k1", "1")
                .respond(updates("5", &["message_new", "group_join", "wall_reply_new"]))
                .respond(RawResponse {
                    cursor: Some("99".to_string()),
                    ..Default::default()
                })
                .respond(RawResponse::default()),
        );
        let mut poller = scripted_poller(&source, 3);
        let (tx, mut rx) = mpsc::channel(8);

        poller.step(&tx).await;
        assert_eq!(poller.step(&tx).await, StepOutcome::Emitted(2));
        assert_eq!(poller.session().map(|s| s.cursor.as_str()), Some("5"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, UpdateKind::Message);
        assert_eq!(first.update.text, "message_new text");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind, UpdateKind::Comment);

        // empty batches leave the cursor alone
        assert_eq!(poller.step(&tx).await, StepOutcome::Idle);
        assert_eq!(poller.session().map(|s| s.cursor.as_str()), Some("5"));
    }

    #[tokio::test]
    async fn test_acquire_failures_count_towards_limit() {
        let source = Arc::new(ScriptedSource::new().acquire_error().acquire_error());
        let mut poller = scripted_poller(&source, 2);
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(poller.step(&tx).await, StepOutcome::Backoff(1));
        assert_eq!(poller.state(), &PollState::Acquiring);
        assert!(matches!(poller.step(&tx).await, StepOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn test_run_stops_with_fatal_error() {
        let source = Arc::new(ScriptedSource::new().grant("k1", "1").respond(updates("2", &["message_new"])));
        let mut poller = scripted_poller(&source, 2);
        let (tx, mut rx) = mpsc::channel(8);

        let result = poller.run(tx).await;
        assert!(matches!(result, Err(PollError::Fatal(_))));
        assert_eq!(rx.recv().await.map(|u| u.kind), Some(UpdateKind::Message));
    }

    #[tokio::test]
    async fn test_run_stops_cleanly_when_consumer_closes() {
        let source = Arc::new(ScriptedSource::new().grant("k1", "1").respond(updates("2", &["message_new"])));
        let mut poller = scripted_poller(&source, 2);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert!(poller.run(tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_reacquire_pauses_without_counting_an_error() {
        let source = Arc::new(ScriptedSource::new().grant("k1", "1").grant("k2", "2").respond(failed(2, None)));
        let mut poller = LongPoller::new(
            source.clone(),
            LongPollConfig {
                errors_limit: 1,
                wait_period_seconds: 1,
                wait_seconds: 0,
            },
        );
        let (tx, _rx) = mpsc::channel(8);

        poller.step(&tx).await;
        assert_eq!(poller.step(&tx).await, StepOutcome::Failed(2));

        let started = std::time::Instant::now();
        assert_eq!(poller.step(&tx).await, StepOutcome::Recovered(2));
        assert!(started.elapsed() >= std::time::Duration::from_secs(1));
        assert_eq!(poller.consecutive_errors(), 0);

        // a limit of one would have been fatal had the pause counted
        assert_eq!(poller.step(&tx).await, StepOutcome::Acquired);
    }

    #[test]
    fn test_session_age() {
        let session = PollSession::from(SessionGrant {
            endpoint: "https://lp.example.com/poll".to_string(),
            key: "k1".to_string(),
            cursor: "1".to_string(),
        });
        assert!(session.age() >= chrono::Duration::zero());

        let stale = PollSession {
            acquired_at: Utc::now() - chrono::Duration::minutes(5),
            ..session
        };
        assert!(stale.age() >= chrono::Duration::minutes(5));
    }

    #[test]
    fn test_recovery_table() {
        assert_eq!(Recovery::for_code(1), Recovery::AdoptCursor);
        assert_eq!(Recovery::for_code(2), Recovery::Reacquire);
        assert_eq!(Recovery::for_code(3), Recovery::Reacquire);
        assert_eq!(Recovery::for_code(4), Recovery::Reacquire);
        assert_eq!(Recovery::for_code(5), Recovery::Unresolved);
        assert!(failure_description(2).is_some());
        assert!(failure_description(0).is_none());
    }
}
