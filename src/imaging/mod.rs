//! Image generation and background removal
//!
//! Both operations are delegated: generation to the `OpenAI` Images API,
//! background removal to an auxiliary script run as a subprocess.

mod background;
mod generation;

pub use background::{output_path_for, BackgroundRemover};
pub use generation::{decode_image_response, ImageGenerator};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while producing an image
#[derive(Debug, Error)]
pub enum ImageError {
    /// Error returned by the image API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The API returned data that is not a decodable image
    #[error("Decode error: {0}")]
    DecodeError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Filesystem or process spawn failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The background removal script exited with a failure status
    #[error("Script failed ({status}): {stderr}")]
    ScriptFailed {
        /// Exit status as reported by the OS
        status: String,
        /// Trimmed standard error of the script
        stderr: String,
    },
    /// The background removal script did not finish in time
    #[error("Script timed out after {0}s")]
    Timeout(u64),
    /// The script succeeded but produced no output file
    #[error("Script produced no output at {}", .0.display())]
    MissingOutput(PathBuf),
}
