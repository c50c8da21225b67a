//! # VK Community Moderator
//!
//! Chat moderation core for VK communities: a text normalizer, obfuscation-aware
//! pattern rules, literal word lists with a whitelist, a suspicion score and a
//! long-poll state machine that feeds updates to the classifier.
//!
//! ## Features
//!
//! - **Obfuscation Patterns**: `{letter}` templates expanded into look-alike character classes
//! - **Priority Classifier**: spam links, profanity and suspicious clusters short-circuit softer signals
//! - **Suspicion Scoring**: configurable threshold with a penalty for non-members
//! - **Long Poll Recovery**: failure codes, bounded retries and a fatal state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vkmod::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let classifier = Classifier::from_config(&RulesConfig::default())?;
//!
//!     let result = classifier.classify(&Message::new("го в телеграм за купоном", "Иван"));
//!     println!("{}: {}", result.verdict, result.case_description);
//!
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod platforms;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::moderation::{Classifier, RuleTable};
    pub use crate::bot::{ActionSink, MemberDirectory, ModerationReport, ModeratorBot};
    pub use crate::config::{LongPollConfig, ModeratorConfig, RulesConfig, VkConfig};
    pub use crate::platforms::{vk::VkClient, LongPoller, PollError, PollSource};
    pub use crate::types::{
        Attachment, ClassificationResult, Message, ModerationAction, PolledUpdate, Update, UpdateKind, Verdict,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
