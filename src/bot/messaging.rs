//! Sending text replies within Telegram's message limits.

use crate::bot::views::error_message;
use crate::utils;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

/// Working limit per message. Telegram allows 4096 characters; the margin
/// absorbs the HTML tags added by formatting.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Split `text` into Telegram-sized parts and send each as HTML.
///
/// Splitting happens on the raw Markdown so that code fences can be closed
/// and reopened across parts; each part is formatted afterwards.
///
/// # Errors
///
/// Returns an error if any part fails to send. A part whose HTML Telegram
/// rejects is resent once as plain text before giving up.
pub async fn send_long_message(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    let parts = utils::split_long_message(text, TELEGRAM_MESSAGE_LIMIT);
    debug!("Sending reply to {chat_id} in {} part(s)", parts.len());

    for part in parts {
        let formatted = utils::format_text(&part);
        match bot
            .send_message(chat_id, formatted)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => {}
            Err(e) if is_markup_rejected(&e) => {
                warn!("Telegram rejected formatted part for {chat_id}, resending as plain text: {e}");
                bot.send_message(chat_id, part).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Whether Telegram refused a message because its entities did not parse
#[must_use]
pub fn is_markup_rejected(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::CantParseEntities(_)))
}

/// Report a failed request to the user as `Error: ...`.
///
/// Delivery failures are only logged; the handler has nothing left to do.
pub async fn send_error(bot: &Bot, chat_id: ChatId, err: impl std::fmt::Display) {
    let text = utils::truncate_str(error_message(err), TELEGRAM_MESSAGE_LIMIT);
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!("Failed to deliver error message to {chat_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparsable_entities_are_markup_errors() {
        let err = RequestError::Api(ApiError::CantParseEntities(
            "Bad Request: can't parse entities: Unexpected end tag at byte offset 12".to_string(),
        ));
        assert!(is_markup_rejected(&err));
    }

    #[test]
    fn test_other_api_errors_are_not_markup_errors() {
        assert!(!is_markup_rejected(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_markup_rejected(&RequestError::Api(ApiError::MessageTextIsEmpty)));
    }
}
