//! Model selection UI
//!
//! Inline keyboards for `/set_model_llm` and `/set_model_structured` plus the
//! callback data they carry.

use crate::bot::preferences::PreferenceKind;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Prefix of every model selection callback
pub const MODEL_CALLBACK_PREFIX: &str = "model";

/// Buttons per keyboard row
const BUTTONS_PER_ROW: usize = 2;

/// Callback data for choosing `model` as the `kind` preference.
///
/// # Examples
///
/// ```
/// use oxide_relay::bot::preferences::PreferenceKind;
/// use oxide_relay::bot::views::encode_model_callback;
///
/// assert_eq!(
///     encode_model_callback(PreferenceKind::Structured, "gpt-4o"),
///     "model:structured:gpt-4o"
/// );
/// ```
#[must_use]
pub fn encode_model_callback(kind: PreferenceKind, model: &str) -> String {
    format!("{MODEL_CALLBACK_PREFIX}:{}:{model}", kind.tag())
}

/// Parse callback data produced by [`encode_model_callback`]
#[must_use]
pub fn parse_model_callback(data: &str) -> Option<(PreferenceKind, &str)> {
    let mut parts = data.splitn(3, ':');
    if parts.next()? != MODEL_CALLBACK_PREFIX {
        return None;
    }
    let kind = PreferenceKind::from_tag(parts.next()?)?;
    let model = parts.next().filter(|m| !m.is_empty())?;
    Some((kind, model))
}

/// Inline keyboard listing every model selectable for `kind`.
///
/// The current choice, if any, is marked with a check.
#[must_use]
pub fn model_keyboard(kind: PreferenceKind, current: Option<&str>) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = kind
        .choices()
        .chunks(BUTTONS_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|model| {
                    let label = if current == Some(*model) {
                        format!("✅ {model}")
                    } else {
                        (*model).to_string()
                    };
                    InlineKeyboardButton::callback(label, encode_model_callback(kind, model))
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Prompt shown above the keyboard
#[must_use]
pub fn choose_model_prompt(kind: PreferenceKind) -> String {
    format!("Choose a {kind} model:")
}

/// Confirmation after a preference change
#[must_use]
pub fn model_updated(kind: PreferenceKind, model: &str) -> String {
    format!("{kind} model: {model}")
}

/// Reply for an unsupported model name
#[must_use]
pub fn invalid_model(kind: PreferenceKind, model: &str) -> String {
    format!(
        "Unknown {kind} model: {model}\nAvailable: {}",
        kind.choices().join(", ")
    )
}

/// `/models` reply
#[must_use]
pub fn models_list() -> String {
    format!(
        "Regular: {}\nStructured: {}",
        PreferenceKind::Llm.choices().join(", "),
        PreferenceKind::Structured.choices().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_parse_model_callback() {
        assert_eq!(
            parse_model_callback("model:llm:claude-haiku-4-5"),
            Some((PreferenceKind::Llm, "claude-haiku-4-5"))
        );
        assert_eq!(
            parse_model_callback(&encode_model_callback(PreferenceKind::Structured, "o1")),
            Some((PreferenceKind::Structured, "o1"))
        );
        assert_eq!(parse_model_callback("model:llm:"), None);
        assert_eq!(parse_model_callback("model:image:gpt-4o"), None);
        assert_eq!(parse_model_callback("retry_no_loop"), None);
    }

    #[test]
    fn test_callback_data_fits_telegram_limit() {
        for kind in [PreferenceKind::Llm, PreferenceKind::Structured] {
            for model in kind.choices() {
                assert!(encode_model_callback(kind, model).len() <= 64);
            }
        }
    }

    #[test]
    fn test_model_keyboard_lists_choices() {
        let keyboard = model_keyboard(PreferenceKind::Structured, Some("gpt-4o"));
        let buttons: Vec<_> = keyboard.inline_keyboard.iter().flatten().collect();

        assert_eq!(buttons.len(), PreferenceKind::Structured.choices().len());
        assert_eq!(buttons[0].text, "✅ gpt-4o");
        assert!(matches!(
            &buttons[1].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "model:structured:gpt-4o-mini"
        ));
    }

    #[test]
    fn test_models_list() {
        let text = models_list();
        let mut lines = text.lines();
        assert!(lines
            .next()
            .is_some_and(|l| l.starts_with("Regular: claude-sonnet-4-5")));
        assert_eq!(
            lines.next(),
            Some("Structured: gpt-4o, gpt-4o-mini, gpt-4-turbo, o1, o1-mini")
        );
    }

    #[test]
    fn test_model_updated_text() {
        assert_eq!(
            model_updated(PreferenceKind::Llm, "gpt-4o"),
            "LLM model: gpt-4o"
        );
        assert_eq!(
            model_updated(PreferenceKind::Structured, "o1"),
            "Structured model: o1"
        );
    }
}
