//! Intensity to colour/opacity mapping handed to the volume renderer.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Piecewise-linear function through `(intensity, value)` points, clamped
/// to the end values outside the first and last point.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PiecewiseFunction<T> {
    points: Vec<(f32, T)>,
}

impl<T: Copy + Lerp> PiecewiseFunction<T> {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Insert a point, keeping points sorted; an existing intensity is overwritten.
    pub fn add_point(&mut self, intensity: f32, value: T) -> &mut Self {
        match self
            .points
            .binary_search_by(|(x, _)| x.total_cmp(&intensity))
        {
            Ok(i) => self.points[i].1 = value,
            Err(i) => self.points.insert(i, (intensity, value)),
        }
        self
    }

    pub fn points(&self) -> &[(f32, T)] {
        &self.points
    }

    pub fn evaluate(&self, intensity: f32) -> Option<T> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        if intensity <= first.0 {
            return Some(first.1);
        }
        if intensity >= last.0 {
            return Some(last.1);
        }
        let upper = self.points.partition_point(|(x, _)| *x <= intensity);
        let (x0, v0) = self.points[upper - 1];
        let (x1, v1) = self.points[upper];
        let t = (intensity - x0) / (x1 - x0);
        Some(v0.lerp(v1, t))
    }
}

pub trait Lerp {
    fn lerp(self, other: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for [f32; 3] {
    fn lerp(self, other: Self, t: f32) -> Self {
        [
            self[0].lerp(other[0], t),
            self[1].lerp(other[1], t),
            self[2].lerp(other[2], t),
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferFunction {
    pub color: PiecewiseFunction<[f32; 3]>,
    pub opacity: PiecewiseFunction<f32>,
}

impl Default for TransferFunction {
    fn default() -> Self {
        let mut opacity = PiecewiseFunction::new();
        opacity.add_point(20.0, 0.0).add_point(255.0, 0.2);

        let mut color = PiecewiseFunction::new();
        color
            .add_point(0.0, [0.0, 0.0, 0.0])
            .add_point(64.0, [1.0, 0.0, 0.0])
            .add_point(128.0, [0.0, 0.0, 1.0])
            .add_point(192.0, [0.0, 1.0, 0.0])
            .add_point(255.0, [0.0, 0.2, 0.0]);

        Self { color, opacity }
    }
}

impl TransferFunction {
    pub fn rgba(&self, intensity: f32) -> [f32; 4] {
        let [r, g, b] = self.color.evaluate(intensity).unwrap_or([0.0; 3]);
        let a = self.opacity.evaluate(intensity).unwrap_or(0.0);
        [r, g, b, a]
    }

    /// `entries` RGBA samples spread evenly over `[min, max]`.
    pub fn build_lookup_table(&self, (min, max): (f32, f32), entries: usize) -> Vec<[f32; 4]> {
        if entries == 0 {
            return Vec::new();
        }
        let step = if entries > 1 {
            (max - min) / (entries - 1) as f32
        } else {
            0.0
        };
        (0..entries)
            .map(|i| self.rgba(min + step * i as f32))
            .collect()
    }
}
