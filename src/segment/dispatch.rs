use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use image::RgbaImage;
use rayon::prelude::*;

use crate::foundation::core::Frame;
use crate::foundation::error::{SpriteError, SpriteResult};
use crate::foundation::raster::{decode_rgba, encode_png};
use crate::segment::backend::{CancelToken, Segmenter};
use crate::segment::model::ModelId;
use crate::segment::registry::ModelRegistry;

/// Concurrency and time budget for segmentation calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DispatchOpts {
    /// Worker threads running segmentation calls concurrently (>= 1).
    pub threads: usize,
    /// Per-call time budget in seconds (>= 1).
    pub timeout_secs: u64,
}

impl Default for DispatchOpts {
    fn default() -> Self {
        Self {
            threads: 4,
            timeout_secs: 120,
        }
    }
}

impl DispatchOpts {
    /// Per-call budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject zero threads or a zero timeout.
    pub fn validate(&self) -> SpriteResult<()> {
        if self.threads == 0 {
            return Err(SpriteError::validation("dispatch 'threads' must be >= 1"));
        }
        if self.timeout_secs == 0 {
            return Err(SpriteError::validation(
                "dispatch 'timeout_secs' must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Stage at which a (frame, model) call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The model could not be loaded.
    Load,
    /// The backend reported an error or panicked.
    Invocation,
    /// No result within the per-call budget.
    Timeout,
    /// The backend output was undecodable or had the wrong size.
    Output,
}

impl FailureKind {
    /// Short label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Invocation => "invocation",
            Self::Timeout => "timeout",
            Self::Output => "output",
        }
    }
}

/// Why a (frame, model) call produced no image.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ModelFailure {
    /// Failure stage.
    pub kind: FailureKind,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// Successful segmentation output.
#[derive(Clone, Debug)]
pub struct ModelOutput {
    /// Decoded RGBA result, same size as the input frame.
    pub image: RgbaImage,
    /// Size of the encoded image returned by the backend.
    pub size_bytes: usize,
}

/// Outcome of one (frame, model) call. Either an image or a failure, never both.
#[derive(Clone, Debug)]
pub struct ModelResult {
    /// Model that was invoked.
    pub model: ModelId,
    /// Index of the input frame.
    pub frame_index: u32,
    /// Output or failure.
    pub outcome: Result<ModelOutput, ModelFailure>,
}

impl ModelResult {
    /// `true` when the call produced an image.
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Output image, on success.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.outcome.as_ref().ok().map(|o| &o.image)
    }

    /// Failure description, on failure.
    pub fn error(&self) -> Option<&ModelFailure> {
        self.outcome.as_ref().err()
    }
}

/// All results of one dispatch, ordered by frame, then by requested model order.
#[derive(Clone, Debug, Default)]
pub struct DispatchReport {
    results: Vec<ModelResult>,
    models: Vec<ModelId>,
}

impl DispatchReport {
    /// Every result in dispatch order.
    pub fn results(&self) -> &[ModelResult] {
        &self.results
    }

    /// Models the frames were dispatched to.
    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    /// Result for frame `frame_index` under `model`.
    pub fn get(&self, frame_index: u32, model: ModelId) -> Option<&ModelResult> {
        self.results
            .iter()
            .find(|r| r.frame_index == frame_index && r.model == model)
    }

    /// Results for one model, in frame order.
    pub fn for_model(&self, model: ModelId) -> impl Iterator<Item = &ModelResult> {
        self.results.iter().filter(move |r| r.model == model)
    }

    /// Failed results, in dispatch order.
    pub fn failures(&self) -> impl Iterator<Item = &ModelResult> {
        self.results.iter().filter(|r| !r.success())
    }

    /// Number of successful calls.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }
}

/// Fans frames out to models on a bounded worker pool.
pub struct ModelDispatcher {
    registry: Arc<ModelRegistry>,
    opts: DispatchOpts,
    pool: rayon::ThreadPool,
}

impl ModelDispatcher {
    /// Dispatcher with its own pool of `opts.threads` workers.
    pub fn new(registry: Arc<ModelRegistry>, opts: DispatchOpts) -> SpriteResult<Self> {
        opts.validate()?;
        let pool = build_thread_pool(opts.threads)?;
        Ok(Self {
            registry,
            opts,
            pool,
        })
    }

    /// Registry models are loaded from.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Options this dispatcher was built with.
    pub fn opts(&self) -> DispatchOpts {
        self.opts
    }

    /// Run every frame through every model.
    ///
    /// Per-call failures never abort the batch; they come back as failed results.
    #[tracing::instrument(skip(self, frames), fields(frames = frames.len()))]
    pub fn dispatch(&self, frames: &[Frame], models: &[ModelId]) -> DispatchReport {
        let jobs: Vec<(&Frame, ModelId)> = frames
            .iter()
            .flat_map(|f| models.iter().map(move |m| (f, *m)))
            .collect();

        let results: Vec<ModelResult> = self.pool.install(|| {
            jobs.par_iter()
                .map(|(frame, model)| self.run_one(frame, *model))
                .collect()
        });

        let failed = results.iter().filter(|r| !r.success()).count();
        tracing::info!(calls = results.len(), failed, "dispatch finished");
        DispatchReport {
            results,
            models: models.to_vec(),
        }
    }

    fn run_one(&self, frame: &Frame, model: ModelId) -> ModelResult {
        let outcome = self.invoke(frame, model);
        if let Err(failure) = &outcome {
            tracing::warn!(
                model = %model,
                frame = frame.index,
                kind = failure.kind.as_str(),
                "segmentation failed: {}",
                failure.message
            );
        }
        ModelResult {
            model,
            frame_index: frame.index,
            outcome,
        }
    }

    fn invoke(&self, frame: &Frame, model: ModelId) -> Result<ModelOutput, ModelFailure> {
        let fail = |kind, message: String| ModelFailure { kind, message };

        let seg = self
            .registry
            .get_or_load(model)
            .map_err(|e| fail(FailureKind::Load, e.to_string()))?;
        let input = encode_png(&frame.image)
            .map_err(|e| fail(FailureKind::Invocation, format!("encode input frame: {e}")))?;

        let timeout = self.opts.timeout();
        let bytes = call_with_timeout(seg, input, timeout).map_err(|e| match e {
            CallError::TimedOut => fail(
                FailureKind::Timeout,
                SpriteError::Timeout {
                    model,
                    after: timeout,
                }
                .to_string(),
            ),
            CallError::Failed(message) => fail(
                FailureKind::Invocation,
                SpriteError::ModelInvocation { model, message }.to_string(),
            ),
        })?;

        let image = decode_rgba(&bytes).map_err(|e| fail(FailureKind::Output, e.to_string()))?;
        if image.dimensions() != frame.image.dimensions() {
            let (ow, oh) = image.dimensions();
            let (iw, ih) = frame.image.dimensions();
            return Err(fail(
                FailureKind::Output,
                format!("output is {ow}x{oh}, expected {iw}x{ih}"),
            ));
        }
        Ok(ModelOutput {
            image,
            size_bytes: bytes.len(),
        })
    }
}

impl fmt::Debug for ModelDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDispatcher")
            .field("registry", &self.registry)
            .field("opts", &self.opts)
            .finish()
    }
}

enum CallError {
    TimedOut,
    Failed(String),
}

/// Wait this long after cancelling an overrunning call for the backend to release it.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Run one segmentation call on its own thread and wait at most `timeout`.
///
/// An overrunning call is cancelled, and the dispatcher waits up to [`CANCEL_GRACE`]
/// for the backend to stop; a backend that ignores cancellation is abandoned.
fn call_with_timeout(
    seg: Arc<dyn Segmenter>,
    input: Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>, CallError> {
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::sync_channel(1);
    let call_cancel = cancel.clone();
    std::thread::Builder::new()
        .name("segment-call".to_owned())
        .spawn(move || {
            let out = seg
                .remove_background_cancellable(&input, &call_cancel)
                .map_err(|e| format!("{e:#}"));
            let _ = tx.send(out);
        })
        .map_err(|e| CallError::Failed(format!("failed to spawn call thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(message)) => Err(CallError::Failed(message)),
        Err(RecvTimeoutError::Timeout) => {
            cancel.cancel();
            if rx.recv_timeout(CANCEL_GRACE).is_err() {
                tracing::warn!("segmentation call ignored cancellation; abandoning it");
            }
            Err(CallError::TimedOut)
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(CallError::Failed("segmentation call panicked".to_owned()))
        }
    }
}

fn build_thread_pool(threads: usize) -> SpriteResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(SpriteError::validation("dispatch 'threads' must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("sprite-dispatch-{i}"))
        .build()
        .map_err(|e| {
            SpriteError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}"))
        })
}

/// Remove the background from one encoded image, without a time budget.
pub fn remove_background(
    registry: &ModelRegistry,
    image: &[u8],
    model: ModelId,
) -> SpriteResult<Vec<u8>> {
    let seg = registry.get_or_load(model)?;
    seg.remove_background(image)
        .map_err(|e| SpriteError::ModelInvocation {
            model,
            message: format!("{e:#}"),
        })
}

#[cfg(test)]
#[path = "../../tests/unit/segment/dispatch.rs"]
mod tests;
