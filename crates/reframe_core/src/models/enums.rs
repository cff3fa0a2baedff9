//! Core enums used throughout the library.

use serde::{Deserialize, Serialize};

/// Kind of media a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    /// Anything the toolkit does not recognise.
    Unknown,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Mode passed to processors before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// Full render to an output file.
    #[default]
    Output,
    /// Single-frame preview.
    Preview,
    /// Live frame stream.
    Stream,
}

impl std::fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessMode::Output => write!(f, "output"),
            ProcessMode::Preview => write!(f, "preview"),
            ProcessMode::Stream => write!(f, "stream"),
        }
    }
}

/// How processors choose which faces to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceSelectorMode {
    /// Every detected face.
    Many,
    /// The first face after sorting.
    One,
    /// Faces similar to a primed reference face.
    #[default]
    Reference,
}

impl FaceSelectorMode {
    /// Whether this mode needs reference faces primed before processing.
    pub fn uses_reference(&self) -> bool {
        matches!(self, FaceSelectorMode::Reference)
    }
}

/// Sort order applied to detected faces before selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaceSelectorOrder {
    #[default]
    LeftRight,
    RightLeft,
    TopBottom,
    BottomTop,
    SmallLarge,
    LargeSmall,
    BestWorst,
    WorstBest,
}

impl std::fmt::Display for FaceSelectorOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FaceSelectorOrder::LeftRight => "left-right",
            FaceSelectorOrder::RightLeft => "right-left",
            FaceSelectorOrder::TopBottom => "top-bottom",
            FaceSelectorOrder::BottomTop => "bottom-top",
            FaceSelectorOrder::SmallLarge => "small-large",
            FaceSelectorOrder::LargeSmall => "large-small",
            FaceSelectorOrder::BestWorst => "best-worst",
            FaceSelectorOrder::WorstBest => "worst-best",
        };
        write!(f, "{}", name)
    }
}
