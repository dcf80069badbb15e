use crate::bot::messaging::{send_error, send_long_message};
use crate::bot::preferences::{PreferenceKind, PreferenceStore};
use crate::bot::views;
use crate::imaging::{BackgroundRemover, ImageGenerator};
use crate::llm::LlmClient;
use crate::schema::{build_properties_schema, parse_property_names, render_json_block};
use crate::utils::{retry_telegram_operation, truncate_str};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{
    net::Download,
    prelude::*,
    types::{ChatAction, ChatId, FileId, InputFile},
    utils::command::{BotCommands, ParseError},
};
use tracing::{error, info};

/// Telegram caption limit
const CAPTION_LIMIT: usize = 1024;

// Helper function to get user name from Message
fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Supported commands:")]
pub enum Command {
    /// Show usage
    #[command(description = "Show usage.")]
    Start,
    /// Show usage
    #[command(description = "Show usage.")]
    Help,
    /// Plain text generation
    #[command(description = "Ask the LLM: /llm <prompt>")]
    Llm(String),
    /// Structured generation: property list and prompt
    #[command(
        description = "Generate properties as strings: /properties_gen <p1, p2> | <prompt>",
        parse_with = parse_properties_args
    )]
    PropertiesGen(String, String),
    /// Choose the `/llm` model
    #[command(description = "Set your LLM model.")]
    SetModelLlm(String),
    /// Choose the `/properties_gen` model
    #[command(description = "Set your structured model.")]
    SetModelStructured(String),
    /// List models
    #[command(description = "List available models.")]
    Models,
    /// Image generation
    #[command(description = "Generate an image: /imagine <prompt>")]
    Imagine(String),
    /// Background removal
    #[command(description = "Remove the background of a photo.")]
    Nukki,
}

/// Split `/properties_gen` arguments at the first `|` into (properties, prompt).
///
/// Never fails: missing parts come back empty so the handler can reply with
/// usage instead of the update being dropped.
#[allow(clippy::unnecessary_wraps)]
fn parse_properties_args(input: String) -> Result<(String, String), ParseError> {
    let (properties, prompt) = input.split_once('|').unwrap_or((input.as_str(), ""));
    Ok((properties.trim().to_string(), prompt.trim().to_string()))
}

/// `/start` and `/help`
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);
    info!("User {user_id} ({user_name}) requested help.");

    bot.send_message(msg.chat.id, views::HELP_TEXT).await?;
    Ok(())
}

/// `/llm <prompt>`: plain generation with the user's model
///
/// # Errors
///
/// Returns an error if a Telegram request fails. Provider errors are reported
/// to the user instead.
pub async fn llm(
    bot: Bot,
    msg: Message,
    prompt: String,
    llm: Arc<LlmClient>,
    preferences: Arc<PreferenceStore>,
) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bot.send_message(msg.chat.id, views::LLM_USAGE).await?;
        return Ok(());
    }

    let user_id = get_user_id_safe(&msg);
    let model = preferences.model_for(user_id, PreferenceKind::Llm).await;
    info!(
        "User {user_id} ({}) /llm with model {}",
        get_user_name(&msg),
        model.as_deref().unwrap_or(PreferenceKind::Llm.default_model())
    );

    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    match llm.chat(prompt, model.as_deref()).await {
        Ok(answer) if answer.trim().is_empty() => {
            send_error(&bot, msg.chat.id, "the model returned an empty response").await;
        }
        Ok(answer) => deliver_reply(&bot, msg.chat.id, user_id, &answer).await,
        Err(e) => {
            error!("LLM request failed for user {user_id}: {e}");
            send_error(&bot, msg.chat.id, e).await;
        }
    }
    Ok(())
}

/// Send a generated reply, reporting a delivery failure to the user instead
/// of dropping the answer silently.
async fn deliver_reply(bot: &Bot, chat_id: ChatId, user_id: i64, reply: &str) {
    if let Err(e) = send_long_message(bot, chat_id, reply).await {
        error!("Failed to deliver reply to user {user_id}: {e}");
        send_error(bot, chat_id, format!("could not deliver the reply: {e}")).await;
    }
}

/// `/properties_gen <p1, p2, ...> | <prompt>`: structured generation
///
/// # Errors
///
/// Returns an error if a Telegram request fails.
pub async fn properties_gen(
    bot: Bot,
    msg: Message,
    properties: String,
    prompt: String,
    llm: Arc<LlmClient>,
    preferences: Arc<PreferenceStore>,
) -> Result<()> {
    let names = match parse_property_names(&properties) {
        Ok(names) if !prompt.is_empty() => names,
        _ => {
            bot.send_message(msg.chat.id, views::PROPERTIES_USAGE)
                .await?;
            return Ok(());
        }
    };

    let user_id = get_user_id_safe(&msg);
    let model = preferences
        .model_for(user_id, PreferenceKind::Structured)
        .await;
    info!(
        "User {user_id} ({}) /properties_gen [{}] with model {}",
        get_user_name(&msg),
        names.join(", "),
        model
            .as_deref()
            .unwrap_or(PreferenceKind::Structured.default_model())
    );

    let schema = build_properties_schema(&names);
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;

    match llm.structured(&prompt, &schema, model.as_deref()).await {
        Ok(value) => deliver_reply(&bot, msg.chat.id, user_id, &render_json_block(&value)).await,
        Err(e) => {
            error!("Structured request failed for user {user_id}: {e}");
            send_error(&bot, msg.chat.id, e).await;
        }
    }
    Ok(())
}

/// `/set_model_llm [model]` and `/set_model_structured [model]`.
///
/// Without an argument an inline keyboard with the choices is shown.
///
/// # Errors
///
/// Returns an error if a Telegram request fails.
pub async fn set_model(
    bot: Bot,
    msg: Message,
    kind: PreferenceKind,
    model: String,
    preferences: Arc<PreferenceStore>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let model = model.trim();

    if model.is_empty() {
        let current = preferences.model_for(user_id, kind).await;
        let current = current.as_deref().unwrap_or(kind.default_model());
        bot.send_message(msg.chat.id, views::choose_model_prompt(kind))
            .reply_markup(views::model_keyboard(kind, Some(current)))
            .await?;
        return Ok(());
    }

    if !kind.accepts(model) {
        bot.send_message(msg.chat.id, views::invalid_model(kind, model))
            .await?;
        return Ok(());
    }

    preferences.set(user_id, kind, model).await;
    info!(
        "User {user_id} ({}) selected {kind} model {model}",
        get_user_name(&msg)
    );
    bot.send_message(msg.chat.id, views::model_updated(kind, model))
        .await?;
    Ok(())
}

/// Inline keyboard callback from the model selection keyboard
///
/// # Errors
///
/// Returns an error if a Telegram request fails.
pub async fn model_callback(
    bot: Bot,
    q: CallbackQuery,
    preferences: Arc<PreferenceStore>,
) -> Result<()> {
    let Some((kind, model)) = q.data.as_deref().and_then(views::parse_model_callback) else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };

    let user_id = q.from.id.0.cast_signed();
    if !kind.accepts(model) {
        bot.answer_callback_query(q.id.clone())
            .text(views::invalid_model(kind, model))
            .await?;
        return Ok(());
    }

    preferences.set(user_id, kind, model).await;
    info!("User {user_id} selected {kind} model {model} from keyboard");

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let text = views::model_updated(kind, model);
    match q.message.as_ref() {
        // Replacing the text drops the keyboard
        Some(message) => {
            bot.edit_message_text(message.chat().id, message.id(), text)
                .await?;
        }
        None => {
            bot.send_message(ChatId(user_id), text).await?;
        }
    }
    Ok(())
}

/// `/models`
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn models(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, views::models_list()).await?;
    Ok(())
}

/// `/imagine <prompt>`: generate an image and send it as a photo
///
/// # Errors
///
/// Returns an error if a Telegram request fails.
pub async fn imagine(
    bot: Bot,
    msg: Message,
    prompt: String,
    images: Arc<ImageGenerator>,
) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        bot.send_message(msg.chat.id, views::IMAGINE_USAGE).await?;
        return Ok(());
    }

    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} ({}) /imagine", get_user_name(&msg));

    bot.send_chat_action(msg.chat.id, ChatAction::UploadPhoto)
        .await?;

    match images.generate(prompt).await {
        Ok(png) => {
            bot.send_photo(msg.chat.id, InputFile::memory(png).file_name("image.png"))
                .caption(truncate_str(prompt, CAPTION_LIMIT))
                .await?;
        }
        Err(e) => {
            error!("Image generation failed for user {user_id}: {e}");
            send_error(&bot, msg.chat.id, e).await;
        }
    }
    Ok(())
}

/// Image attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// Telegram file to download
    pub file_id: FileId,
    /// Extension used for the temporary input file
    pub extension: String,
}

/// Find an image in the message itself: the largest photo size, or a
/// document with an `image/*` MIME type.
#[must_use]
pub fn find_image(msg: &Message) -> Option<ImageSource> {
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(ImageSource {
            file_id: photo.file.id.clone(),
            extension: "jpg".to_string(),
        });
    }

    let doc = msg.document()?;
    let mime = doc.mime_type.as_ref()?;
    if mime.type_().as_str() != "image" {
        return None;
    }
    Some(ImageSource {
        file_id: doc.file.id.clone(),
        extension: image_extension(doc.file_name.as_deref(), mime.subtype().as_str()),
    })
}

/// Extension for an image document: from its file name, else the MIME subtype
fn image_extension(file_name: Option<&str>, mime_subtype: &str) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .unwrap_or(mime_subtype)
        .to_ascii_lowercase()
}

/// `/nukki`: remove the background of an attached or replied-to image and
/// send the PNG back as a document, keeping transparency.
///
/// # Errors
///
/// Returns an error if a Telegram request fails.
pub async fn nukki(bot: Bot, msg: Message, remover: Arc<BackgroundRemover>) -> Result<()> {
    let Some(source) = find_image(&msg).or_else(|| msg.reply_to_message().and_then(find_image))
    else {
        bot.send_message(msg.chat.id, views::NUKKI_USAGE).await?;
        return Ok(());
    };

    let user_id = get_user_id_safe(&msg);
    info!("User {user_id} ({}) /nukki", get_user_name(&msg));

    bot.send_message(msg.chat.id, views::NUKKI_PROCESSING)
        .await?;
    bot.send_chat_action(msg.chat.id, ChatAction::UploadDocument)
        .await?;

    // Download with retry logic
    let download = retry_telegram_operation(|| async {
        let file = bot.get_file(source.file_id.clone()).await?;
        let mut buf = Vec::new();
        bot.download_file(&file.path, &mut buf).await?;
        Ok(buf)
    })
    .await;

    let image = match download {
        Ok(buf) if buf.is_empty() => {
            send_error(&bot, msg.chat.id, anyhow!("downloaded image is empty")).await;
            return Ok(());
        }
        Ok(buf) => buf,
        Err(e) => {
            error!("Failed to download image for user {user_id}: {e}");
            send_error(&bot, msg.chat.id, e).await;
            return Ok(());
        }
    };

    match remover.remove(&image, &source.extension).await {
        Ok(png) => {
            bot.send_document(msg.chat.id, InputFile::memory(png).file_name("nukki.png"))
                .await?;
        }
        Err(e) => {
            error!("Background removal failed for user {user_id}: {e}");
            send_error(&bot, msg.chat.id, e).await;
        }
    }
    Ok(())
}
