//! Face descriptors and frame buffers exchanged with collaborators.

use serde::{Deserialize, Serialize};

use super::enums::FaceSelectorOrder;

/// Decoded RGB frame.
pub type VisionFrame = image::RgbImage;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// A detected face. The core never interprets the embedding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Face {
    pub bounding_box: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub score: f32,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Whether a frame carries any non-black pixel.
pub fn frame_has_content(frame: &VisionFrame) -> bool {
    frame.as_raw().iter().any(|&v| v != 0)
}

/// Sort faces by the configured selector order.
pub fn sort_faces(mut faces: Vec<Face>, order: FaceSelectorOrder) -> Vec<Face> {
    let key = |face: &Face| -> f32 {
        let b = &face.bounding_box;
        match order {
            FaceSelectorOrder::LeftRight => b.x1,
            FaceSelectorOrder::RightLeft => -b.x1,
            FaceSelectorOrder::TopBottom => b.y1,
            FaceSelectorOrder::BottomTop => -b.y1,
            FaceSelectorOrder::SmallLarge => b.area(),
            FaceSelectorOrder::LargeSmall => -b.area(),
            FaceSelectorOrder::BestWorst => -face.score,
            FaceSelectorOrder::WorstBest => face.score,
        }
    };
    faces.sort_by(|a, b| key(a).total_cmp(&key(b)));
    faces
}

/// Pick one face by position, falling back to the last face when the
/// position runs past the end.
pub fn select_face(faces: &[Face], position: usize) -> Option<Face> {
    if faces.is_empty() {
        return None;
    }
    let index = position.min(faces.len() - 1);
    faces.get(index).cloned()
}

/// Merge several detections of the same identity into one face.
///
/// The first face supplies the box. Scores and embeddings are averaged;
/// embeddings of a different length than the first are ignored.
pub fn average_faces(faces: &[Face]) -> Option<Face> {
    let first = faces.first()?;
    let dimension = first.embedding.len();
    let matching: Vec<&Face> = faces
        .iter()
        .filter(|f| f.embedding.len() == dimension)
        .collect();
    let count = matching.len() as f32;

    let mut embedding = vec![0.0f32; dimension];
    for face in &matching {
        for (sum, value) in embedding.iter_mut().zip(&face.embedding) {
            *sum += value;
        }
    }
    for value in &mut embedding {
        *value /= count;
    }

    Some(Face {
        bounding_box: first.bounding_box,
        score: matching.iter().map(|f| f.score).sum::<f32>() / count,
        embedding,
    })
}
