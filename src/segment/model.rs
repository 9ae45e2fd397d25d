use std::fmt;
use std::str::FromStr;

use crate::foundation::error::SpriteError;

/// Background-removal model identifiers understood by the segmentation backend.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ModelId {
    /// General-purpose high-accuracy model (default).
    #[default]
    #[serde(rename = "isnet-general-use")]
    IsnetGeneralUse,
    /// Tuned for human subjects.
    #[serde(rename = "u2net_human_seg")]
    U2netHumanSeg,
    /// Original general-purpose model.
    #[serde(rename = "u2net")]
    U2net,
    /// Lightweight general-purpose model.
    #[serde(rename = "u2netp")]
    U2netp,
    /// Clothing segmentation.
    #[serde(rename = "u2net_cloth_seg")]
    U2netClothSeg,
    /// Compact general-purpose model.
    #[serde(rename = "silueta")]
    Silueta,
}

impl ModelId {
    /// Every model, in comparison order.
    pub const ALL: [ModelId; 6] = [
        ModelId::IsnetGeneralUse,
        ModelId::U2netHumanSeg,
        ModelId::U2net,
        ModelId::U2netp,
        ModelId::U2netClothSeg,
        ModelId::Silueta,
    ];

    /// Model used when none is requested.
    pub const DEFAULT: ModelId = ModelId::IsnetGeneralUse;

    /// Wire name passed to the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsnetGeneralUse => "isnet-general-use",
            Self::U2netHumanSeg => "u2net_human_seg",
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netClothSeg => "u2net_cloth_seg",
            Self::Silueta => "silueta",
        }
    }

    /// One-line human description.
    pub fn description(self) -> &'static str {
        match self {
            Self::IsnetGeneralUse => "high accuracy, general purpose",
            Self::U2netHumanSeg => "optimized for people",
            Self::U2net => "general purpose",
            Self::U2netp => "lightweight, faster",
            Self::U2netClothSeg => "clothing segmentation",
            Self::Silueta => "compact, general purpose",
        }
    }

    pub(crate) fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = SpriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                SpriteError::validation(format!(
                    "unknown model '{s}', expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/segment/model.rs"]
mod tests;
