use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use crate::types::{ClassificationResult, Message, ModerationAction, PolledUpdate, Update, UpdateKind, Verdict};

pub mod moderation;
pub mod normalizer;
pub mod pattern_matching;
pub mod scoring;
pub mod whitelist;
pub mod word_list;

use moderation::Classifier;

/// Name used when the author cannot be looked up
pub const UNKNOWN_USERNAME: &str = "Unknown user";

/// Looks up author details the classifier needs
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn username(&self, user_id: i64) -> Result<String>;

    async fn is_member(&self, user_id: i64) -> Result<bool>;
}

/// Carries out removals and chat notices for blocked content
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Delete a chat message for everyone
    async fn delete_message(&self, peer_id: i64, conversation_message_id: i64) -> Result<()>;

    /// Post a service message into the chat
    async fn send_notice(&self, peer_id: i64, text: &str) -> Result<()>;
}

/// Outcome of moderating one update
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationReport {
    pub kind: UpdateKind,
    pub from_id: i64,
    pub username: String,
    pub result: ClassificationResult,
    pub action: ModerationAction,
    /// Whether the content was actually deleted
    pub removed: bool,
}

/// Consumes polled updates and classifies each one on its own task
pub struct ModeratorBot {
    classifier: Classifier,
    directory: Arc<dyn MemberDirectory>,
    actions: Arc<dyn ActionSink>,
    chat_notices: bool,
}

impl ModeratorBot {
    pub fn new(classifier: Classifier, directory: Arc<dyn MemberDirectory>, actions: Arc<dyn ActionSink>) -> Self {
        Self {
            classifier,
            directory,
            actions,
            chat_notices: true,
        }
    }

    /// Post (or skip) the public notice after a removal attempt
    pub fn with_chat_notices(mut self, enabled: bool) -> Self {
        self.chat_notices = enabled;
        self
    }

    /// Turn a raw update into a message. Lookup failures fall back to defaults.
    pub async fn build_message(&self, update: &Update) -> Message {
        let username = match self.directory.username(update.from_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Failed to look up user {}: {:#}", update.from_id, e);
                UNKNOWN_USERNAME.to_string()
            }
        };

        let is_member = match self.directory.is_member(update.from_id).await {
            Ok(is_member) => is_member,
            Err(e) => {
                warn!("Failed to check membership of {}: {:#}", update.from_id, e);
                true
            }
        };

        Message {
            text: update.text.clone(),
            username,
            attachments: update.attachments.clone(),
            is_member,
        }
    }

    pub async fn moderate(&self, polled: PolledUpdate) -> ModerationReport {
        let message = self.build_message(&polled.update).await;
        let result = self.classifier.classify(&message);
        let action = ModerationAction::for_verdict(result.verdict);

        let removed = match action {
            ModerationAction::DeleteAndNotify => self.enforce(&polled, &message.username, &result).await,
            ModerationAction::ReviewOnly | ModerationAction::None => false,
        };

        let report = ModerationReport {
            kind: polled.kind,
            from_id: polled.update.from_id,
            username: message.username,
            result,
            action,
            removed,
        };
        log_report(&report);
        report
    }

    /// Delete blocked content and tell the chat why
    async fn enforce(&self, polled: &PolledUpdate, username: &str, result: &ClassificationResult) -> bool {
        let update = &polled.update;
        let (Some(peer_id), Some(message_id)) = (update.peer_id, update.conversation_message_id) else {
            warn!("No chat message id on {} from {}, leaving it in place", polled.kind, update.from_id);
            return false;
        };

        let removed = match self.actions.delete_message(peer_id, message_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete message {} in {}: {:#}", message_id, peer_id, e);
                false
            }
        };

        if self.chat_notices {
            let notice = if removed {
                format!(
                    "Сообщение от {} было удалено автоматическим фильтром. Причина: {}",
                    username, result.case_description
                )
            } else {
                format!("Сообщение от {} не было удалено автоматическим фильтром.", username)
            };
            if let Err(e) = self.actions.send_notice(peer_id, &notice).await {
                warn!("Failed to post notice to {}: {:#}", peer_id, e);
            }
        }

        removed
    }

    /// Process updates until the channel closes, returning how many were handled
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<PolledUpdate>) -> usize {
        info!("Moderator started");
        let mut pool = TaskPool::new(self);

        while pool.pump(&mut rx).await {}
        pool.drain().await;

        info!("Moderator stopped after {} updates", pool.handled);
        pool.handled
    }
}

/// Moderation tasks in flight; finished ones are reaped as they complete
struct TaskPool {
    bot: Arc<ModeratorBot>,
    tasks: JoinSet<ModerationReport>,
    handled: usize,
}

impl TaskPool {
    fn new(bot: Arc<ModeratorBot>) -> Self {
        Self {
            bot,
            tasks: JoinSet::new(),
            handled: 0,
        }
    }

    /// Spawn the next update or reap a finished task. `false` once the channel is closed.
    async fn pump(&mut self, rx: &mut mpsc::Receiver<PolledUpdate>) -> bool {
        tokio::select! {
            Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                self.record(joined);
                true
            }
            polled = rx.recv() => match polled {
                Some(polled) => {
                    let bot = Arc::clone(&self.bot);
                    self.tasks.spawn(async move { bot.moderate(polled).await });
                    true
                }
                None => false,
            },
        }
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            self.record(joined);
        }
    }

    fn record(&mut self, joined: Result<ModerationReport, JoinError>) {
        match joined {
            Ok(_) => self.handled += 1,
            Err(e) => warn!("Moderation task failed: {}", e),
        }
    }

    fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}

fn log_report(report: &ModerationReport) {
    let result = &report.result;
    match (result.verdict, report.removed) {
        (Verdict::Block, true) => warn!(
            "Removed {} from {} ({}): {}. {}",
            report.kind, report.username, report.from_id, result.case_description, result.details
        ),
        (Verdict::Block, false) => warn!(
            "Blocked {} from {} ({}) could not be removed: {}. {}",
            report.kind, report.username, report.from_id, result.case_description, result.details
        ),
        (Verdict::Suspicious, _) => info!(
            "Flagging {} from {} ({}) for review: {}. {}",
            report.kind, report.username, report.from_id, result.case_description, result.details
        ),
        (Verdict::Clean, _) => debug!("Clean {} from {}", report.kind, report.from_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::types::cases;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeDirectory {
        names: HashMap<i64, String>,
        members: Vec<i64>,
    }

    #[async_trait]
    impl MemberDirectory for FakeDirectory {
        async fn username(&self, user_id: i64) -> Result<String> {
            self.names
                .get(&user_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such user"))
        }

        async fn is_member(&self, user_id: i64) -> Result<bool> {
            if self.names.contains_key(&user_id) {
                Ok(self.members.contains(&user_id))
            } else {
                Err(anyhow::anyhow!("access denied"))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
        refuse_delete: bool,
    }

    impl RecordingSink {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionSink for RecordingSink {
        async fn delete_message(&self, peer_id: i64, conversation_message_id: i64) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {} {}", peer_id, conversation_message_id));
            if self.refuse_delete {
                return Err(anyhow::anyhow!("message is too old"));
            }
            Ok(())
        }

        async fn send_notice(&self, peer_id: i64, text: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("notice {} {}", peer_id, text));
            Ok(())
        }
    }

    fn bot_with(sink: Arc<RecordingSink>) -> ModeratorBot {
        let mut rules = RulesConfig::empty();
        rules.suspicious_substrings = vec!["купон".to_string()];
        rules.curse_substrings = vec!["чмо".to_string()];

        let directory = FakeDirectory {
            names: HashMap::from([(1, "Иван Петров".to_string()), (2, "Пётр Иванов".to_string())]),
            members: vec![1],
        };
        ModeratorBot::new(Classifier::from_config(&rules).unwrap(), Arc::new(directory), sink)
    }

    fn bot() -> ModeratorBot {
        bot_with(Arc::new(RecordingSink::default()))
    }

    fn polled(kind: UpdateKind, from_id: i64, text: &str) -> PolledUpdate {
        PolledUpdate {
            kind,
            update: Update {
                event_type: "message_new".to_string(),
                text: text.to_string(),
                from_id,
                ..Default::default()
            },
        }
    }

    fn chat_message(from_id: i64, text: &str) -> PolledUpdate {
        let mut polled = polled(UpdateKind::Message, from_id, text);
        polled.update.peer_id = Some(2000000001);
        polled.update.conversation_message_id = Some(42);
        polled
    }

    #[tokio::test]
    async fn test_membership_feeds_the_score() {
        let bot = bot();

        let member = bot.moderate(polled(UpdateKind::Message, 1, "лови купон")).await;
        assert_eq!(member.username, "Иван Петров");
        assert_eq!(member.result.verdict, Verdict::Suspicious);
        assert_eq!(member.action, ModerationAction::ReviewOnly);

        let outsider = bot.moderate(polled(UpdateKind::Comment, 2, "лови купон")).await;
        assert_eq!(outsider.result.case_description, cases::SUSPICIOUS_CLUSTER);
        assert_eq!(outsider.action, ModerationAction::DeleteAndNotify);
    }

    #[test_log::test(tokio::test)]
    async fn test_lookup_failures_fall_back() {
        let bot = bot();

        let message = bot.build_message(&polled(UpdateKind::Message, 99, "лови купон").update).await;
        assert_eq!(message.username, UNKNOWN_USERNAME);
        assert!(message.is_member);

        let report = bot.moderate(polled(UpdateKind::Message, 99, "лови купон")).await;
        assert_eq!(report.action, ModerationAction::ReviewOnly);
    }

    #[tokio::test]
    async fn test_blocked_message_is_deleted_and_explained() {
        let sink = Arc::new(RecordingSink::default());
        let bot = bot_with(sink.clone());

        let report = bot.moderate(chat_message(1, "ты чмо")).await;
        assert!(report.removed);
        assert_eq!(
            sink.calls(),
            vec![
                "delete 2000000001 42".to_string(),
                format!(
                    "notice 2000000001 Сообщение от Иван Петров было удалено автоматическим фильтром. Причина: {}",
                    cases::PROFANITY
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_delete_is_reported() {
        let sink = Arc::new(RecordingSink {
            refuse_delete: true,
            ..Default::default()
        });
        let bot = bot_with(sink.clone());

        let report = bot.moderate(chat_message(1, "ты чмо")).await;
        assert!(!report.removed);
        assert_eq!(
            sink.calls().last().map(String::as_str),
            Some("notice 2000000001 Сообщение от Иван Петров не было удалено автоматическим фильтром.")
        );
    }

    #[tokio::test]
    async fn test_only_blocks_reach_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let bot = bot_with(sink.clone()).with_chat_notices(false);

        bot.moderate(chat_message(1, "лови купон")).await;
        bot.moderate(chat_message(1, "привет")).await;
        assert!(sink.calls().is_empty());

        // comments carry no chat message id
        let report = bot.moderate(polled(UpdateKind::Comment, 1, "ты чмо")).await;
        assert!(!report.removed);
        assert!(sink.calls().is_empty());

        bot.moderate(chat_message(1, "ты чмо")).await;
        assert_eq!(sink.calls(), vec!["delete 2000000001 42"]);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped_while_running() {
        let mut pool = TaskPool::new(Arc::new(bot()));
        let (tx, mut rx) = mpsc::channel(8);

        for i in 1..=5 {
            tx.send(polled(UpdateKind::Message, 1, "привет")).await.unwrap();
            assert!(pool.pump(&mut rx).await);
            assert_eq!(pool.in_flight(), 1);
            assert!(pool.pump(&mut rx).await);
            assert_eq!(pool.in_flight(), 0);
            assert_eq!(pool.handled, i);
        }

        drop(tx);
        assert!(!pool.pump(&mut rx).await);
    }

    #[tokio::test]
    async fn test_run_handles_every_update() {
        let bot = Arc::new(bot());
        let (tx, rx) = mpsc::channel(8);

        tx.send(polled(UpdateKind::Message, 1, "ты чмо")).await.unwrap();
        tx.send(polled(UpdateKind::Comment, 2, "привет")).await.unwrap();
        tx.send(polled(UpdateKind::Message, 99, "лови купон")).await.unwrap();
        drop(tx);

        assert_eq!(bot.run(rx).await, 3);
    }
}
