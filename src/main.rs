use oxide_relay::bot::handlers::{get_user_id_safe, Command};
use oxide_relay::bot::{PreferenceKind, PreferenceStore, UnauthorizedCache};
use oxide_relay::config::{
    get_unauthorized_cache_max_size, get_unauthorized_cooldown, Provider, Settings,
};
use oxide_relay::imaging::{BackgroundRemover, ImageGenerator};
use oxide_relay::{bot, llm};
use regex::Regex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Me};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

const ACCESS_DENIED: &str = "⛔️ Access denied";

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_bot: Regex,
    anthropic_key: Regex,
    openai_key: Regex,
    api_key_header: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_bot: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            anthropic_key: Regex::new(r"sk-ant-[A-Za-z0-9_-]{10,}")?,
            openai_key: Regex::new(r"sk-(?:proj-)?[A-Za-z0-9_-]{20,}")?,
            api_key_header: Regex::new(r#"(?i)(x-api-key["']?\s*[:=]\s*["']?)[^\s"',]+"#)?,
            bearer: Regex::new(r"(?i)(Bearer\s+)[A-Za-z0-9._-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_bot
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        // Anthropic keys also start with "sk-", so they go first
        output = self
            .anthropic_key
            .replace_all(&output, "[ANTHROPIC_KEY]")
            .to_string();
        output = self
            .openai_key
            .replace_all(&output, "[OPENAI_KEY]")
            .to_string();
        output = self
            .api_key_header
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output = self
            .bearer
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_files();

    // Redaction must be ready before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Oxide Relay bot...");

    let settings = init_settings();

    let llm_client = Arc::new(llm::LlmClient::new(&settings));
    info!("LLM Client initialized.");
    for provider in [Provider::Anthropic, Provider::OpenAi] {
        if !llm_client.is_available(provider) {
            warn!("No API key for {provider}, its models will report an error.");
        }
    }

    let image_generator = Arc::new(ImageGenerator::new(&settings));
    if !image_generator.is_available() {
        warn!("OPENAI_API_KEY is not set, /imagine will report an error.");
    }

    let remover = Arc::new(BackgroundRemover::new(&settings));
    if !remover.script().exists() {
        warn!(
            "Background removal script {} not found, /nukki will fail.",
            remover.script().display()
        );
    }

    let preferences = Arc::new(PreferenceStore::new());
    let unauthorized_cache = init_unauthorized_cache();

    let bot = Bot::new(settings.telegram_token.clone());
    register_commands(&bot).await;

    let handler = setup_handler();

    info!("Bot ready!");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            llm_client,
            image_generator,
            remover,
            preferences,
            settings,
            unauthorized_cache
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Load `~/.env` first, then `./.env`. Variables already set are never overridden.
fn load_env_files() {
    if let Some(home) = std::env::var_os("HOME") {
        let _ = dotenvy::from_path(PathBuf::from(home).join(".env"));
    }
    dotenvy::dotenv().ok();
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_unauthorized_cache() -> Arc<UnauthorizedCache> {
    let cooldown = get_unauthorized_cooldown();
    let max_size = get_unauthorized_cache_max_size();

    let cache = UnauthorizedCache::new(cooldown, max_size);
    info!(
        "Initialized UnauthorizedCache (cooldown: {:?}, max_size: {})",
        cache.cooldown(),
        max_size
    );

    Arc::new(cache)
}

async fn register_commands(bot: &Bot) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Registered {} bot commands.", Command::bot_commands().len()),
        Err(e) => error!("Failed to register bot commands: {}", e),
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, settings: Arc<Settings>| {
                    settings.is_user_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_model_callback),
        )
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery, settings: Arc<Settings>| {
                    !settings.is_user_allowed(q.from.id.0.cast_signed())
                })
                .endpoint(handle_unauthorized_callback),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<Settings>| {
                    settings.is_user_allowed(get_user_id_safe(&msg))
                })
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    // Photos carry the command in their caption
                    dptree::filter_map(|msg: Message, me: Me| {
                        msg.caption()
                            .and_then(|caption| Command::parse(caption, me.username()).ok())
                    })
                    .endpoint(handle_command),
                ),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message, settings: Arc<Settings>| {
                    !settings.is_user_allowed(get_user_id_safe(&msg))
                })
                .endpoint(handle_unauthorized),
        )
}

/// Buttons pressed by outsiders still need an answer, or the client keeps
/// spinning. The popup is not rate limited since it never reaches the chat.
async fn handle_unauthorized_callback(
    bot: Bot,
    q: CallbackQuery,
) -> Result<(), teloxide::RequestError> {
    info!(
        "⛔️ Unauthorized callback from user {} ({}).",
        q.from.id, q.from.first_name
    );
    if let Err(e) = bot.answer_callback_query(q.id).text(ACCESS_DENIED).await {
        error!("Failed to answer callback from {}: {}", q.from.id, e);
    }
    respond(())
}

async fn handle_unauthorized(
    bot: Bot,
    msg: Message,
    cache: Arc<UnauthorizedCache>,
) -> Result<(), teloxide::RequestError> {
    let user_id = get_user_id_safe(&msg);
    let user_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    if cache.should_send(user_id, &user_name).await {
        info!(
            "⛔️ Unauthorized access from user {} ({}). Sending denial message.",
            user_id, user_name
        );

        if let Err(e) = bot.send_message(msg.chat.id, ACCESS_DENIED).await {
            error!("Failed to send access denied message to {}: {}", user_id, e);
        } else {
            cache.mark_sent(user_id).await;
        }
    }

    respond(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    llm: Arc<llm::LlmClient>,
    images: Arc<ImageGenerator>,
    remover: Arc<BackgroundRemover>,
    preferences: Arc<PreferenceStore>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => bot::handlers::help(bot, msg).await,
        Command::Llm(prompt) => bot::handlers::llm(bot, msg, prompt, llm, preferences).await,
        Command::PropertiesGen(properties, prompt) => {
            bot::handlers::properties_gen(bot, msg, properties, prompt, llm, preferences).await
        }
        Command::SetModelLlm(model) => {
            bot::handlers::set_model(bot, msg, PreferenceKind::Llm, model, preferences).await
        }
        Command::SetModelStructured(model) => {
            bot::handlers::set_model(bot, msg, PreferenceKind::Structured, model, preferences).await
        }
        Command::Models => bot::handlers::models(bot, msg).await,
        Command::Imagine(prompt) => bot::handlers::imagine(bot, msg, prompt, images).await,
        Command::Nukki => bot::handlers::nukki(bot, msg, remover).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_model_callback(
    bot: Bot,
    q: CallbackQuery,
    preferences: Arc<PreferenceStore>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::model_callback(bot, q, preferences).await {
        error!("Model callback handler error: {}", e);
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::ops::ControlFlow;

    fn callback_update(user_id: u64) -> Update {
        // teloxide's Update deserializer needs a string source; from_value yields UpdateKind::Error
        serde_json::from_str(
            &json!({
                "update_id": 1,
                "callback_query": {
                    "id": "4382",
                    "from": { "id": user_id, "is_bot": false, "first_name": "Eve" },
                    "chat_instance": "-5513",
                    "data": "model:llm:gpt-4o"
                }
            })
            .to_string(),
        )
        .expect("valid callback update")
    }

    #[tokio::test]
    async fn test_outsider_callback_is_handled() {
        let settings: Settings = serde_json::from_value(json!({
            "telegram_token": "123:dummy",
            "allowed_users": "1"
        }))
        .expect("valid settings");
        // Unroutable API so the answer fails fast and is only logged
        let bot = Bot::new("123:dummy")
            .set_api_url("http://127.0.0.1:9/".parse().expect("valid url"));

        let result = setup_handler()
            .dispatch(dptree::deps![
                callback_update(777),
                bot,
                Arc::new(settings),
                Arc::new(PreferenceStore::new())
            ])
            .await;

        assert!(matches!(result, ControlFlow::Break(Ok(()))));
    }

    #[test]
    fn test_redacts_telegram_tokens() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "GET https://api.telegram.org/bot1234567890:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0/getMe failed";
        let redacted = patterns.redact(line);
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
        assert!(!redacted.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw0"));
        Ok(())
    }

    #[test]
    fn test_redacts_provider_keys() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;

        let redacted = patterns.redact("key=sk-ant-REDACTED end");
        assert_eq!(redacted, "key=[ANTHROPIC_KEY] end");

        let redacted = patterns.redact("key=sk-proj-abcdefghijklmnopqrstuvwx end");
        assert_eq!(redacted, "key=[OPENAI_KEY] end");

        let redacted = patterns.redact("headers: {\"x-api-key\": \"secret123\"}");
        assert!(!redacted.contains("secret123"));

        let redacted = patterns.redact("authorization: Bearer abc.def-ghi");
        assert_eq!(redacted, "authorization: Bearer [MASKED]");
        Ok(())
    }

    #[test]
    fn test_plain_text_is_untouched() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "User 42 (alice) /llm with model claude-sonnet-4-5";
        assert_eq!(patterns.redact(line), line);
        Ok(())
    }
}
