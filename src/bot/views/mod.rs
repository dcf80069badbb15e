//! Texts and keyboards shown to users

mod commands;
mod models;

pub use commands::{
    error_message, HELP_TEXT, IMAGINE_USAGE, LLM_USAGE, NUKKI_PROCESSING, NUKKI_USAGE,
    PROPERTIES_USAGE,
};
pub use models::{
    choose_model_prompt, encode_model_callback, invalid_model, model_keyboard, model_updated,
    models_list, parse_model_callback, MODEL_CALLBACK_PREFIX,
};
