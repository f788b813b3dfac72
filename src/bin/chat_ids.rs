use anyhow::Result;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use teloxide::prelude::*;

use stock_watchbot::config::TelegramConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "List chats that recently messaged the bot, to fill telegram.chat_ids"
)]
struct Args {
    /// Path to YAML config file (reads only `telegram`)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
struct TelegramOnlyConfig {
    telegram: TelegramConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let raw = fs::read_to_string(&args.config)?;
    let cfg: TelegramOnlyConfig = serde_yaml::from_str(&raw)?;
    let token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or(cfg.telegram.bot_token);

    let bot = Bot::new(token);
    let updates = bot.get_updates().await?;
    if updates.is_empty() {
        println!("No recent updates. Send the bot a message and run again.");
        return Ok(());
    }

    let mut seen = std::collections::BTreeSet::new();
    for update in &updates {
        let Some(chat) = update.chat() else { continue };
        if !seen.insert(chat.id.0) {
            continue;
        }
        let label = chat
            .username()
            .map(|u| format!("@{}", u))
            .or_else(|| chat.title().map(str::to_owned))
            .unwrap_or_default();
        let configured = if cfg.telegram.chat_ids.contains(&chat.id.0) {
            " (configured)"
        } else {
            ""
        };
        println!("{} {}{}", chat.id.0, label, configured);
    }
    Ok(())
}
