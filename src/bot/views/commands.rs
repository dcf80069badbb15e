//! Texts for the generation commands.

/// `/start` and `/help` reply
pub const HELP_TEXT: &str = "\
Commands:
/llm <prompt> - generate text
/properties_gen <p1, p2, ...> | <prompt> - generate a JSON object with the given properties
/set_model_llm [model] - choose the model for /llm
/set_model_structured [model] - choose the model for /properties_gen
/models - list available models
/imagine <prompt> - generate an image
/nukki - remove the background (send as a photo caption or reply to a photo)";

/// Usage for `/llm` without a prompt
pub const LLM_USAGE: &str = "Usage: /llm <prompt>";

/// Usage for malformed `/properties_gen`
pub const PROPERTIES_USAGE: &str =
    "Usage: /properties_gen <property1, property2, ...> | <prompt>\nExample: /properties_gen title, author, year | a classic sci-fi novel";

/// Usage for `/imagine` without a prompt
pub const IMAGINE_USAGE: &str = "Usage: /imagine <prompt>";

/// Usage for `/nukki` without an image
pub const NUKKI_USAGE: &str =
    "Send /nukki as the caption of a photo, or reply /nukki to a photo or image file.";

/// Shown while the background is being removed
pub const NUKKI_PROCESSING: &str = "Removing background...";

/// User-facing error line
#[must_use]
pub fn error_message(err: impl std::fmt::Display) -> String {
    format!("Error: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_every_command() {
        for cmd in [
            "/llm",
            "/properties_gen",
            "/set_model_llm",
            "/set_model_structured",
            "/models",
            "/imagine",
            "/nukki",
        ] {
            assert!(HELP_TEXT.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message("boom"), "Error: boom");
    }
}
