//! Shared data types: media geometry, faces and enums.

mod enums;
mod face;
mod media;

pub use enums::{FaceSelectorMode, FaceSelectorOrder, MediaKind, ProcessMode};
pub use face::{
    average_faces, frame_has_content, select_face, sort_faces, BoundingBox, Face,
    VisionFrame,
};
pub use media::{
    restrict_image_resolution, restrict_trim_frame, restrict_video_fps,
    restrict_video_resolution, ParseResolutionError, Resolution, TrimRange, VideoInfo,
};
