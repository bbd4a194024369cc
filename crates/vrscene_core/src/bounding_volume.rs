//! Axis-aligned bounding volumes
//!
//! A [`BoundingVolume`] is an AABB that also carries the enclosing sphere
//! (center + half-diagonal radius). A non-positive radius means "empty".

use vrscene_math::{mat4, Mat4, Vec3};
use crate::frustum::Boxable;

/// Box/sphere hybrid used for hierarchical culling
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingVolume {
    center: Vec3,
    radius: f32,
    min_corner: Vec3,
    max_corner: Vec3,
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingVolume {
    /// Create an empty bounding volume
    pub const fn new() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 0.0,
            min_corner: Vec3::ZERO,
            max_corner: Vec3::ZERO,
        }
    }

    /// Create a volume from its two corners
    ///
    /// The corners are re-ordered component-wise, so any two opposite
    /// corners may be passed.
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        let mut bv = Self::new();
        bv.set_corners(a.min_components(b), a.max_components(b));
        bv
    }

    /// Smallest volume enclosing every point (empty for no points)
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::new();
        };
        let (min, max) = iter.fold((first, first), |(min, max), p| {
            (min.min_components(p), max.max_components(p))
        });
        Self::from_corners(min, max)
    }

    /// Center of the box
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Radius of the enclosing sphere (half the box diagonal)
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn min_corner(&self) -> Vec3 {
        self.min_corner
    }

    #[inline]
    pub fn max_corner(&self) -> Vec3 {
        self.max_corner
    }

    /// True when this volume encloses nothing
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.radius <= 0.0
    }

    /// Make this volume empty again
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Grow this volume so it also encloses `other`
    ///
    /// Empty inputs are ignored; an empty receiver adopts `other` verbatim.
    /// The result is a component-wise min/max union, so the final extents
    /// do not depend on the order volumes are expanded in.
    pub fn expand(&mut self, other: &BoundingVolume) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        let min = self.min_corner.min_components(other.min_corner);
        let max = self.max_corner.max_components(other.max_corner);
        self.set_corners(min, max);
    }

    /// Recompute this volume as `source` transformed by `matrix`
    ///
    /// All eight corners of `source` are pushed through the matrix and a new
    /// axis-aligned box is fitted around them, which keeps rotation and
    /// non-uniform scale correct at the cost of a looser fit.
    pub fn transform(&mut self, source: &BoundingVolume, matrix: &Mat4) {
        if source.is_empty() {
            self.reset();
            return;
        }
        let corners = source.corners().map(|c| mat4::transform_point(*matrix, c));
        *self = Self::from_points(corners);
    }

    /// Copy of this volume transformed by `matrix`
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let mut out = Self::new();
        out.transform(self, matrix);
        out
    }

    /// Inclusive box overlap test
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        self.max_corner.x >= other.min_corner.x
            && self.max_corner.y >= other.min_corner.y
            && self.max_corner.z >= other.min_corner.z
            && self.min_corner.x <= other.max_corner.x
            && self.min_corner.y <= other.max_corner.y
            && self.min_corner.z <= other.max_corner.z
    }

    /// Check if a point is inside or on the box
    pub fn contains_point(&self, p: Vec3) -> bool {
        !self.is_empty() && self.min_corner.all_le(p) && p.all_le(self.max_corner)
    }

    /// `[min.x, min.y, min.z, max.x, max.y, max.z]`
    pub fn to_box_info(&self) -> [f32; 6] {
        [
            self.min_corner.x,
            self.min_corner.y,
            self.min_corner.z,
            self.max_corner.x,
            self.max_corner.y,
            self.max_corner.z,
        ]
    }

    fn set_corners(&mut self, min: Vec3, max: Vec3) {
        self.min_corner = min;
        self.max_corner = max;
        self.center = (min + max) * 0.5;
        self.radius = (max - min).length() * 0.5;
    }
}

impl Boxable for BoundingVolume {
    fn min_corner(&self) -> Vec3 {
        self.min_corner
    }

    fn max_corner(&self) -> Vec3 {
        self.max_corner
    }
}
