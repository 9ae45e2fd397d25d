use std::path::Path;

use crate::foundation::error::{SpriteError, SpriteResult};
use crate::grid::resolver::GridHints;
use crate::media::sampler::SampleConfig;
use crate::segment::dispatch::DispatchOpts;
use crate::segment::model::ModelId;

/// What to do with frames whose segmentation failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the original frame in the assembled sheet and report the failure.
    #[default]
    FallbackToOriginal,
    /// Fail the job with [`SpriteError::FramesFailed`].
    Strict,
}

/// Everything a pipeline job can be tuned with.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sheet grid hints.
    pub grid: GridHints,
    /// Video sampling settings.
    pub sample: SampleConfig,
    /// Model for single-model flows.
    pub model: ModelId,
    /// Models for comparison flows, in report order.
    pub models: Vec<ModelId>,
    /// Handling of per-frame failures.
    pub failure_policy: FailurePolicy,
    /// Worker count and per-call timeout.
    pub dispatch: DispatchOpts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid: GridHints::default(),
            sample: SampleConfig::default(),
            model: ModelId::DEFAULT,
            models: ModelId::ALL.to_vec(),
            failure_policy: FailurePolicy::default(),
            dispatch: DispatchOpts::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(s: &str) -> SpriteResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| SpriteError::validation(format!("invalid pipeline config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> SpriteResult<Self> {
        use anyhow::Context as _;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Check every section.
    pub fn validate(&self) -> SpriteResult<()> {
        self.sample.validate()?;
        self.dispatch.validate()?;
        if self.models.is_empty() {
            return Err(SpriteError::validation("models must not be empty"));
        }
        for (i, m) in self.models.iter().enumerate() {
            if self.models[..i].contains(m) {
                return Err(SpriteError::validation(format!(
                    "model '{m}' is listed more than once"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/config.rs"]
mod tests;
