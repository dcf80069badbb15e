#![deny(missing_docs)]
//! Oxide Relay
//!
//! A Telegram bot that relays commands to hosted LLM providers (Anthropic,
//! OpenAI), an image-generation API and a background-removal script, and
//! sends the results back to the chat.

/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Image generation and background removal
pub mod imaging;
/// LLM providers and client
pub mod llm;
/// JSON schema helpers for property generation
pub mod schema;
/// Text processing helpers
pub mod utils;
