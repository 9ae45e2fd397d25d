use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context as _;

use crate::segment::model::ModelId;

/// Environment variable overriding the segmentation program.
pub const REMBG_ENV: &str = "SPRITE_PROCESSOR_REMBG";

const CHILD_POLL: Duration = Duration::from_millis(10);

/// Shared flag asking an in-flight segmentation call to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the call holding this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A loaded background-removal model.
///
/// Input and output are encoded images (PNG in practice); the output carries the
/// foreground with background pixels made transparent.
pub trait Segmenter: Send + Sync {
    /// Remove the background from one encoded image.
    fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Like [`Segmenter::remove_background`], but stops early once `cancel` fires.
    ///
    /// Backends that hold external resources (child processes, connections) should
    /// release them before returning. The default ignores the token.
    fn remove_background_cancellable(
        &self,
        image: &[u8],
        cancel: &CancelToken,
    ) -> anyhow::Result<Vec<u8>> {
        let _ = cancel;
        self.remove_background(image)
    }
}

/// Capability to materialize a [`Segmenter`] for a model.
///
/// Loading may be slow (weights download, process warm-up); callers go through
/// [`ModelRegistry`](crate::ModelRegistry) so each model loads at most once.
pub trait ModelLoader: Send + Sync {
    /// Load `model`.
    fn load(&self, model: ModelId) -> anyhow::Result<Arc<dyn Segmenter>>;
}

/// Loader backed by the `rembg` command line tool.
#[derive(Clone, Debug)]
pub struct RembgLoader {
    program: PathBuf,
}

impl RembgLoader {
    /// Use `program` as the `rembg` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `$SPRITE_PROCESSOR_REMBG`, falling back to `rembg` on `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(REMBG_ENV) {
            Some(p) if !p.is_empty() => Self::new(p),
            _ => Self::new("rembg"),
        }
    }

    /// Executable this loader invokes.
    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

impl Default for RembgLoader {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ModelLoader for RembgLoader {
    fn load(&self, model: ModelId) -> anyhow::Result<Arc<dyn Segmenter>> {
        let status = Command::new(&self.program)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| {
                format!(
                    "failed to run '{}' (is rembg installed and on PATH?)",
                    self.program.display()
                )
            })?;
        if !status.success() {
            anyhow::bail!("'{}' exited with status {status}", self.program.display());
        }
        tracing::debug!(model = %model, program = %self.program.display(), "rembg backend ready");
        Ok(Arc::new(RembgSegmenter {
            program: self.program.clone(),
            model,
        }))
    }
}

/// One model served by `rembg i -m <model> - -`.
#[derive(Clone, Debug)]
pub struct RembgSegmenter {
    program: PathBuf,
    model: ModelId,
}

impl RembgSegmenter {
    /// Model this segmenter runs.
    pub fn model(&self) -> ModelId {
        self.model
    }
}

impl Segmenter for RembgSegmenter {
    fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        self.remove_background_cancellable(image, &CancelToken::new())
    }

    /// Cancellation kills and reaps the `rembg` child before returning.
    fn remove_background_cancellable(
        &self,
        image: &[u8],
        cancel: &CancelToken,
    ) -> anyhow::Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(["i", "-m", self.model.as_str(), "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", self.program.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .context("failed to open rembg stdin (unexpected)")?;
        let mut stdout = child
            .stdout
            .take()
            .context("failed to open rembg stdout (unexpected)")?;
        let mut stderr = child
            .stderr
            .take()
            .context("failed to open rembg stderr (unexpected)")?;

        let input = image.to_vec();
        let feeder = std::thread::spawn(move || stdin.write_all(&input));
        let stdout_reader = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stdout.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });

        let status = loop {
            if let Some(status) = child.try_wait().context("failed to poll rembg")? {
                break status;
            }
            if cancel.is_cancelled() {
                let _ = child.kill();
                child.wait().context("failed to reap cancelled rembg")?;
                let _ = feeder.join();
                let _ = stdout_reader.join();
                let _ = stderr_drain.join();
                tracing::debug!(model = %self.model, "rembg call cancelled");
                anyhow::bail!("rembg call cancelled");
            }
            std::thread::sleep(CHILD_POLL);
        };

        let fed = feeder
            .join()
            .map_err(|_| anyhow::anyhow!("rembg stdin feeder thread panicked"))?;
        let out = stdout_reader
            .join()
            .map_err(|_| anyhow::anyhow!("rembg stdout reader thread panicked"))?
            .context("failed to read rembg stdout")?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| anyhow::anyhow!("rembg stderr drain thread panicked"))?
            .context("rembg stderr read failed")?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            anyhow::bail!("rembg exited with status {status}: {}", stderr.trim());
        }
        fed.context("failed to write image to rembg stdin")?;
        if out.is_empty() {
            anyhow::bail!("rembg produced no output");
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/segment/backend.rs"]
mod tests;
