use anyhow::{Context, Result};
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;

use vkmod::config::DEFAULT_CONFIG_PATH;
use vkmod::prelude::*;

const UPDATE_CHANNEL_SIZE: usize = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting VK moderator v{}", vkmod::VERSION);

    let config_path = env::var("MODERATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = ModeratorConfig::load_or_create(&config_path).await?;
    config.apply_env_overrides()?;
    info!("Configuration loaded from {}", config_path);

    let rules = Arc::new(RuleTable::compile(&config.rules).context("Failed to compile rule table")?);
    let classifier = Classifier::new(rules);

    let client = Arc::new(VkClient::new(config.vk.clone())?);
    let source: Arc<dyn PollSource> = client.clone();
    let directory: Arc<dyn MemberDirectory> = client.clone();
    let actions: Arc<dyn ActionSink> = client;

    let mut poller = LongPoller::new(source, config.longpoll.clone());
    if let Err(e) = poller.acquire().await {
        error!("Could not start long polling: {}", e);
        return Err(e.into());
    }

    let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_SIZE);
    let bot = Arc::new(ModeratorBot::new(classifier, directory, actions).with_chat_notices(config.vk.chat_notices));
    let consumer = tokio::spawn(bot.run(rx));

    let outcome = tokio::select! {
        result = poller.run(tx) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    };

    // the poller owned the sender, so the consumer drains and exits
    match consumer.await {
        Ok(handled) => info!("Moderated {} updates", handled),
        Err(e) => warn!("Moderator task ended abnormally: {}", e),
    }

    match outcome {
        Ok(()) => {
            info!("VK moderator stopped");
            Ok(())
        }
        Err(e) => {
            error!("VK moderator stopped: {}", e);
            Err(e.into())
        }
    }
}
