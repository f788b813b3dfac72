use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::TelegramConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed for chats {failed:?}: {last_error}")]
    Delivery { failed: Vec<i64>, last_error: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to every recipient, splitting it if the transport needs to.
    async fn deliver(&self, text: &str) -> Result<(), NotifyError>;
}

/// Length as Telegram counts it, in UTF-16 code units.
fn telegram_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Split `text` into ordered parts of at most `limit` UTF-16 code units.
///
/// Splits only between lines. A single line longer than `limit` is the one
/// case cut mid-line, at character boundaries. Parts are trimmed of leading
/// and trailing newlines and blank parts are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(2);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let mut has_lines = false;

    for line in text.split('\n') {
        let line_len = telegram_len(line);
        if line_len > limit {
            if has_lines {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
                has_lines = false;
            }
            parts.extend(cut_line(line, limit));
            continue;
        }
        if has_lines && current_len + 1 + line_len > limit {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
            has_lines = false;
        }
        if has_lines {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
        has_lines = true;
    }
    if has_lines {
        parts.push(current);
    }

    parts
        .into_iter()
        .map(|p| p.trim_matches('\n').to_string())
        .filter(|p| !p.trim().is_empty())
        .collect()
}

fn cut_line(line: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;
    for c in line.chars() {
        if chunk_len + c.len_utf16() > limit {
            chunks.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }
        chunk.push(c);
        chunk_len += c.len_utf16();
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

/// Sends one text to one chat.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl ChatSender for Bot {
    async fn send(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        self.send_message(ChatId(chat_id), text.to_string()).await?;
        Ok(())
    }
}

/// Telegram notifier with an explicit recipient list.
#[derive(Clone)]
pub struct TelegramNotifier {
    sender: Arc<dyn ChatSender>,
    chat_ids: Vec<i64>,
    max_message_len: usize,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_ids", &self.chat_ids)
            .field("max_message_len", &self.max_message_len)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Self {
        Self::with_sender(Arc::new(Bot::new(cfg.bot_token.clone())), cfg)
    }

    pub fn with_sender(sender: Arc<dyn ChatSender>, cfg: &TelegramConfig) -> Self {
        Self {
            sender,
            chat_ids: cfg.chat_ids.clone(),
            max_message_len: cfg.max_message_len,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(len = text.len()))]
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        let parts = split_message(text, self.max_message_len);
        let mut failed = Vec::new();
        let mut last_error = String::new();

        for &chat_id in &self.chat_ids {
            for (index, part) in parts.iter().enumerate() {
                if let Err(err) = self.sender.send(chat_id, part).await {
                    warn!(%err, chat_id, part = index, "telegram send failed");
                    last_error = err.to_string();
                    failed.push(chat_id);
                    // Remaining parts would arrive out of context.
                    break;
                }
            }
        }

        if failed.is_empty() {
            info!(parts = parts.len(), chats = self.chat_ids.len(), "message delivered");
            Ok(())
        } else {
            Err(NotifyError::Delivery { failed, last_error })
        }
    }
}
