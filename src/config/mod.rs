// src/config/mod.rs - Moderator configuration: YAML file, defaults, env overrides

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tokio::time::Duration;

use crate::bot::moderation::RuleTable;

pub mod defaults;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/moderator.yaml";

/// Top-level configuration, loaded once at startup and never mutated afterwards
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeratorConfig {
    pub rules: RulesConfig,
    pub longpoll: LongPollConfig,
    pub vk: VkConfig,
}

/// Word lists, obfuscation pattern templates and the suspicion threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Letter -> character class used to expand `{letter}` placeholders
    pub alphabet: BTreeMap<String, String>,
    /// Curse pattern templates, evaluated in order
    pub curse_patterns: Vec<String>,
    pub spam_substrings: Vec<String>,
    pub curse_substrings: Vec<String>,
    /// Suspicious pattern templates, evaluated in order
    pub suspicious_patterns: Vec<String>,
    pub suspicious_substrings: Vec<String>,
    pub whitelist_substrings: Vec<String>,
    pub suspicion_threshold: usize,
    /// Emoji-only heuristic; disabled when unset
    pub non_text_length_limit: Option<usize>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            alphabet: defaults::alphabet(),
            curse_patterns: defaults::curse_patterns(),
            spam_substrings: defaults::spam_substrings(),
            curse_substrings: defaults::curse_substrings(),
            suspicious_patterns: defaults::suspicious_patterns(),
            suspicious_substrings: defaults::suspicious_substrings(),
            whitelist_substrings: defaults::whitelist_substrings(),
            suspicion_threshold: 2,
            non_text_length_limit: None,
        }
    }
}

impl RulesConfig {
    /// Rules with no patterns or lists at all, handy as a base for custom tables
    pub fn empty() -> Self {
        Self {
            alphabet: defaults::alphabet(),
            curse_patterns: Vec::new(),
            spam_substrings: Vec::new(),
            curse_substrings: Vec::new(),
            suspicious_patterns: Vec::new(),
            suspicious_substrings: Vec::new(),
            whitelist_substrings: Vec::new(),
            suspicion_threshold: 2,
            non_text_length_limit: None,
        }
    }
}

/// Long-poll loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongPollConfig {
    /// Consecutive failures after which the loop gives up
    pub errors_limit: u32,
    /// Pause after a transport failure
    pub wait_period_seconds: u64,
    /// How long the upstream server may hold a poll request open
    pub wait_seconds: u64,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            errors_limit: 3,
            wait_period_seconds: 10,
            wait_seconds: 25,
        }
    }
}

impl LongPollConfig {
    pub fn wait_period(&self) -> Duration {
        Duration::from_secs(self.wait_period_seconds)
    }
}

/// VK API access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VkConfig {
    pub api_url: String,
    pub api_key: String,
    pub group_id: i64,
    pub api_version: String,
    pub request_timeout_seconds: u64,
    /// Post a notice in the chat after removing a message
    pub chat_notices: bool,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.vk.com/method/".to_string(),
            api_key: String::new(),
            group_id: 0,
            api_version: "5.199".to_string(),
            request_timeout_seconds: 35,
            chat_notices: true,
        }
    }
}

impl ModeratorConfig {
    /// Load the configuration file, writing the built-in defaults first if it does not exist
    pub async fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Configuration file {} not found, creating default", path.display());
            Self::default().save(path).await?;
        }
        Self::load(path).await
    }

    /// Load and validate a configuration file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: ModeratorConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as YAML, creating parent directories when needed
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                info!("Created configuration directory: {}", parent.display());
            }
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write configuration file {}", path.display()))?;
        Ok(())
    }

    /// Apply `VK_API_KEY` / `VK_GROUP_ID` from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup("VK_API_KEY") {
            debug!("VK API key taken from environment");
            self.vk.api_key = api_key;
        }
        if let Some(group_id) = lookup("VK_GROUP_ID") {
            self.vk.group_id = group_id
                .trim()
                .parse()
                .with_context(|| format!("VK_GROUP_ID is not a number: {}", group_id))?;
        }
        Ok(())
    }

    /// Check limits and make sure every rule template expands and compiles
    pub fn validate(&self) -> Result<()> {
        if self.rules.suspicion_threshold == 0 {
            return Err(anyhow::anyhow!("rules.suspicion_threshold must be at least 1"));
        }
        if self.longpoll.errors_limit == 0 {
            return Err(anyhow::anyhow!("longpoll.errors_limit must be at least 1"));
        }
        if let Some(bad) = self.rules.alphabet.keys().find(|key| key.chars().count() != 1) {
            return Err(anyhow::anyhow!("Alphabet key '{}' must be a single letter", bad));
        }

        RuleTable::compile(&self.rules).context("Invalid rule table")?;
        Ok(())
    }
}
