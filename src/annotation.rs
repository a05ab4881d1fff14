use crate::error::{Result, ViewerError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type Rgb = [f32; 3];

pub const ANNOTATION_RED: Rgb = [1.0, 0.0, 0.0];

/// Display position in pixels, as reported by the window toolkit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScreenPosition {
    pub x: i32,
    pub y: i32,
}

impl ScreenPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A piece of text pinned to a screen position.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    text: String,
    position: ScreenPosition,
    color: Rgb,
}

impl Annotation {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self) -> ScreenPosition {
        self.position
    }

    pub fn color(&self) -> Rgb {
        self.color
    }
}

/// Append-only list of annotations in creation order.
#[derive(Clone, Debug, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, text: &str, position: ScreenPosition) -> Result<&Annotation> {
        self.add_with_color(text, position, ANNOTATION_RED)
    }

    /// Blank or whitespace-only text is rejected and leaves the store unchanged.
    pub fn add_with_color(
        &mut self,
        text: &str,
        position: ScreenPosition,
        color: Rgb,
    ) -> Result<&Annotation> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ViewerError::EmptyAnnotationText);
        }
        self.annotations.push(Annotation {
            text: text.to_string(),
            position,
            color,
        });
        let index = self.annotations.len() - 1;
        Ok(&self.annotations[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Annotation> {
        self.annotations.get(index)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
