//! Reference faces primed once per step.
//!
//! Entries are keyed by processor name, plus [`ORIGIN_KEY`] for the face
//! picked from the target itself. The dispatcher clears the cache at the
//! start of every step so nothing leaks between steps.

use std::collections::HashMap;

use crate::models::Face;

/// Key for faces picked directly from the reference frame.
pub const ORIGIN_KEY: &str = "origin";

#[derive(Debug, Clone, Default)]
pub struct ReferenceFaceCache {
    faces: HashMap<String, Vec<Face>>,
}

impl ReferenceFaceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&[Face]> {
        self.faces.get(key).map(Vec::as_slice)
    }

    /// The face picked from the target, if priming found one.
    pub fn origin(&self) -> Option<&[Face]> {
        self.get(ORIGIN_KEY)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.faces.contains_key(key)
    }

    pub fn append(&mut self, key: impl Into<String>, face: Face) {
        self.faces.entry(key.into()).or_default().push(face);
    }

    pub fn clear(&mut self) {
        self.faces.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Number of keys with at least one face.
    pub fn len(&self) -> usize {
        self.faces.len()
    }
}
