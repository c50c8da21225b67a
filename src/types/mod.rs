// src/types/mod.rs - Value types shared by the filter, the poll loop and the bot

use serde::{Deserialize, Serialize};

/// An inbound message or comment, ready to be classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub username: String,
    pub attachments: Vec<Attachment>,
    pub is_member: bool,
}

impl Message {
    pub fn new(text: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            username: username.into(),
            attachments: Vec::new(),
            is_member: true,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_membership(mut self, is_member: bool) -> Self {
        self.is_member = is_member;
        self
    }
}

/// Text carried inside a repost or a reposted comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedMessage {
    pub text: String,
}

/// Message attachments the filter knows how to inspect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    /// Link preview, checked against the spam list
    Link { url: String },
    /// Reposted wall post, its text runs through the full text pipeline
    RepostPost(NestedMessage),
    /// Reposted wall comment, same treatment as a repost
    RepostComment(NestedMessage),
    /// Photos, stickers, audio and everything else
    Other { kind: String },
}

impl Attachment {
    pub fn link(url: impl Into<String>) -> Self {
        Attachment::Link { url: url.into() }
    }

    pub fn repost(text: impl Into<String>) -> Self {
        Attachment::RepostPost(NestedMessage { text: text.into() })
    }

    pub fn repost_comment(text: impl Into<String>) -> Self {
        Attachment::RepostComment(NestedMessage { text: text.into() })
    }

    /// Nested text for reposts, `None` for everything else
    pub fn nested_text(&self) -> Option<&str> {
        match self {
            Attachment::RepostPost(nested) | Attachment::RepostComment(nested) => Some(&nested.text),
            _ => None,
        }
    }
}

/// Outcome of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Clean,
    Suspicious,
    Block,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Clean => write!(f, "clean"),
            Verdict::Suspicious => write!(f, "suspicious"),
            Verdict::Block => write!(f, "block"),
        }
    }
}

/// Case descriptions attached to non-clean results
pub mod cases {
    pub const SPAM_LINK: &str = "suspicious link, advertising";
    pub const SPAM_LINK_ATTACHMENT: &str = "suspicious link, spam, advertising";
    pub const LATIN_BOT: &str = "Latin message + Latin username, likely bot";
    pub const PHONE_NUMBER: &str = "phone number present";
    pub const CARD_NUMBER: &str = "card number present";
    pub const LATIN_MESSAGE: &str = "Latin-script message";
    pub const PROFANITY: &str = "profanity";
    pub const SUSPICIOUS_CLUSTER: &str = "suspicious word cluster, spam/advertising";
    pub const INSUFFICIENT_SUSPICIOUS: &str = "insufficient suspicious terms to act";
    pub const NON_TEXT: &str = "message consists of emoji only, likely bot";
    pub const ATTACHMENT_SUFFIX: &str = " (attachment)";
}

/// Result of a single `Classifier::classify` call. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub verdict: Verdict,
    pub matched_terms: Vec<String>,
    pub case_description: String,
    /// Human readable account of what was found
    pub details: String,
}

impl ClassificationResult {
    pub fn clean() -> Self {
        Self {
            verdict: Verdict::Clean,
            matched_terms: Vec::new(),
            case_description: String::new(),
            details: String::new(),
        }
    }

    pub fn block(case: &str, matched_terms: Vec<String>, details: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            matched_terms,
            case_description: case.to_string(),
            details: details.into(),
        }
    }

    pub fn suspicious(case: &str, matched_terms: Vec<String>, details: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Suspicious,
            matched_terms,
            case_description: case.to_string(),
            details: details.into(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.verdict == Verdict::Clean
    }

    /// Mark a result produced from a repost's nested text
    pub fn from_attachment(mut self) -> Self {
        self.case_description.push_str(cases::ATTACHMENT_SUFFIX);
        self
    }
}

/// What the action layer does with a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    /// Delete the content and post the reason publicly
    DeleteAndNotify,
    /// Forward for manual review, no removal
    ReviewOnly,
    None,
}

impl ModerationAction {
    pub fn for_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Block => ModerationAction::DeleteAndNotify,
            Verdict::Suspicious => ModerationAction::ReviewOnly,
            Verdict::Clean => ModerationAction::None,
        }
    }
}

/// Raw event delivered by the long-poll feed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Update {
    /// Upstream event tag, e.g. `message_new` or `wall_reply_new`
    pub event_type: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub from_id: i64,
    pub peer_id: Option<i64>,
    pub conversation_message_id: Option<i64>,
}

/// Update categories the moderator reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    Message,
    Comment,
}

impl UpdateKind {
    /// Static dispatch table over upstream event tags
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "message_new" => Some(UpdateKind::Message),
            "wall_reply_new" | "wall_reply_edit" | "photo_comment_new" | "photo_comment_edit" => {
                Some(UpdateKind::Comment)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::Message => write!(f, "message"),
            UpdateKind::Comment => write!(f, "comment"),
        }
    }
}

/// An update the poll loop has tagged and handed to its consumer
#[derive(Debug, Clone, PartialEq)]
pub struct PolledUpdate {
    pub kind: UpdateKind,
    pub update: Update,
}
