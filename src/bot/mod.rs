/// Command handlers
pub mod handlers;
/// Sending long and error replies
pub mod messaging;
/// Per-user model preferences
pub mod preferences;
/// Flood protection for unauthorized users
pub mod unauthorized_cache;
/// Texts and keyboards
pub mod views;

pub use preferences::{ModelPreferences, PreferenceKind, PreferenceStore};
pub use unauthorized_cache::UnauthorizedCache;
