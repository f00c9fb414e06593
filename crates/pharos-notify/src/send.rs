//! Telegram delivery helpers.
//!
//! Messages are capped at 4096 characters; we stay a little below. MarkdownV2
//! is tried first and plain text is the fallback when Telegram rejects it.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

use crate::error::Result;

/// Maximum characters per Telegram message.
const CHUNK_MAX: usize = 4000;
const CHUNK_PAUSE: Duration = Duration::from_millis(100);

/// Split `text` into chunks of at most [`CHUNK_MAX`] characters, preferring
/// line boundaries. Counts characters, not bytes, so emoji never get cut.
pub fn split_chunks(text: &str) -> Vec<String> {
    if text.chars().count() <= CHUNK_MAX {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let cost = if current.is_empty() { line_len } else { line_len + 1 };

        if !current.is_empty() && current_len + cost > CHUNK_MAX {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > CHUNK_MAX {
            // A single oversized line: hard-split on character boundaries.
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(CHUNK_MAX) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Escape the characters MarkdownV2 reserves.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        if matches!(
            ch,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!' | '\\'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Deliver `text` to `chat_id` chunk by chunk. Fails if a chunk could be
/// sent in neither MarkdownV2 nor plain text.
pub async fn send_text(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    let chunks = split_chunks(text);
    for (i, chunk) in chunks.iter().enumerate() {
        let formatted = bot
            .send_message(chat_id, escape_markdown_v2(chunk))
            .parse_mode(ParseMode::MarkdownV2)
            .await;

        if let Err(e) = formatted {
            warn!(error = %e, chunk_index = i, "telegram: MarkdownV2 rejected, retrying as plain text");
            bot.send_message(chat_id, chunk.clone()).await?;
        }

        if i + 1 < chunks.len() {
            tokio::time::sleep(CHUNK_PAUSE).await;
        }
    }
    Ok(())
}
