use super::ImageError;
use crate::config::{get_nukki_timeout_secs, Settings};
use crate::utils::truncate_str;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Suffix the script appends to the input stem
const OUTPUT_SUFFIX: &str = "_nukki.png";

/// Runs the background removal script on uploaded images
#[derive(Debug, Clone)]
pub struct BackgroundRemover {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
    work_root: PathBuf,
}

impl BackgroundRemover {
    /// Create a remover from settings, working under the system temp dir
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self::with_paths(
            settings.nukki_interpreter.clone(),
            PathBuf::from(&settings.nukki_script),
            get_nukki_timeout_secs(),
        )
    }

    /// Create a remover with an explicit interpreter, script and timeout
    #[must_use]
    pub fn with_paths(interpreter: String, script: PathBuf, timeout_secs: u64) -> Self {
        Self {
            interpreter,
            script,
            timeout: Duration::from_secs(timeout_secs),
            work_root: std::env::temp_dir(),
        }
    }

    /// Script path the remover invokes
    #[must_use]
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Remove the background of `image` and return the resulting PNG bytes.
    ///
    /// Each call works in its own temporary directory, which is removed afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Io` on filesystem/spawn failures,
    /// `ImageError::ScriptFailed` on a non-zero exit, `ImageError::Timeout`
    /// when the script runs too long, `ImageError::MissingOutput` when no
    /// output file was written.
    pub async fn remove(&self, image: &[u8], extension: &str) -> Result<Vec<u8>, ImageError> {
        let dir = self
            .work_root
            .join(format!("oxide-relay-{}", Uuid::new_v4().as_simple()));
        tokio::fs::create_dir_all(&dir).await?;

        let result = self.run_in(&dir, image, extension).await;

        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            warn!("Failed to clean up {}: {e}", dir.display());
        }
        result
    }

    async fn run_in(
        &self,
        dir: &Path,
        image: &[u8],
        extension: &str,
    ) -> Result<Vec<u8>, ImageError> {
        let input = dir.join(format!("input.{}", sanitize_extension(extension)));
        tokio::fs::write(&input, image).await?;

        info!(
            "Running background removal: {} {}",
            self.interpreter,
            self.script.display()
        );

        let child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        // Dropping the future on timeout kills the child
        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ImageError::Timeout(self.timeout.as_secs()))??;

        debug!(
            "Background removal script stdout: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImageError::ScriptFailed {
                status: output.status.to_string(),
                stderr: truncate_str(stderr.trim(), 500),
            });
        }

        let output_path = output_path_for(&input);
        match tokio::fs::read(&output_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ImageError::MissingOutput(output_path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Path the script writes its result to: `<stem>_nukki.png` next to the input.
///
/// # Examples
///
/// ```
/// use oxide_relay::imaging::output_path_for;
/// use std::path::Path;
///
/// let out = output_path_for(Path::new("/tmp/job/photo.jpg"));
/// assert_eq!(out, Path::new("/tmp/job/photo_nukki.png"));
/// ```
#[must_use]
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{OUTPUT_SUFFIX}");
    input
        .parent()
        .map_or_else(|| PathBuf::from(&name), |parent| parent.join(&name))
}

fn sanitize_extension(extension: &str) -> String {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "png".to_string()
    } else {
        ext
    }
}
