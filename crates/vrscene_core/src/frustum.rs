//! View frustum and box classification
//!
//! A [`Frustum`] is six planes `(n, d)` whose positive half-space
//! `n·p + d > 0` is "inside". Boxes are classified against it by testing
//! their eight corners plane by plane.
//!
//! Two classifiers exist:
//! - [`MaskedClassifier`]: three-way result with plane-mask coherency. Planes
//!   a parent box was fully inside of are recorded in a [`PlaneMask`] and
//!   skipped for its children.
//! - [`BasicClassifier`]: cheap reference test that only detects "fully
//!   outside one plane". It never reports [`Containment::Intersect`].

use bitflags::bitflags;
use vrscene_math::{mat4, Mat4, Vec3};

bitflags! {
    /// One bit per frustum plane the current subtree is known to be inside of
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PlaneMask: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP = 1 << 3;
        const NEAR = 1 << 4;
        const FAR = 1 << 5;
        const ALL = Self::LEFT.bits()
            | Self::RIGHT.bits()
            | Self::BOTTOM.bits()
            | Self::TOP.bits()
            | Self::NEAR.bits()
            | Self::FAR.bits();
    }
}

impl PlaneMask {
    /// Mask bit for the plane at `index` (0..6)
    #[inline]
    pub fn plane(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }
}

/// Result of classifying a volume against a frustum
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    /// Completely outside at least one plane
    Outside,
    /// Straddles at least one plane
    Intersect,
    /// Completely inside every plane
    Inside,
}

/// Anything with an axis-aligned min/max box
pub trait Boxable {
    fn min_corner(&self) -> Vec3;
    fn max_corner(&self) -> Vec3;

    /// The eight box corners, x varying fastest, then y, then z
    fn corners(&self) -> [Vec3; 8] {
        let lo = self.min_corner();
        let hi = self.max_corner();
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// A plane `n·p + d = 0`; the positive side is inside
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Build from a raw `(nx, ny, nz, d)` row
    pub fn from_array(p: [f32; 4]) -> Self {
        Self::new(Vec3::new(p[0], p[1], p[2]), p[3])
    }

    /// Signed distance (scaled by |n| if the plane is not normalized)
    #[inline]
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// Scale so the normal has unit length
    pub fn normalized(&self) -> Self {
        let len = self.normal.length().max(1e-6);
        Self::new(self.normal * (1.0 / len), self.d / len)
    }
}

/// Six-plane view volume, ordered left, right, bottom, top, near, far
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Build from raw `(nx, ny, nz, d)` rows
    pub fn from_planes(raw: [[f32; 4]; 6]) -> Self {
        Self::new(raw.map(Plane::from_array))
    }

    /// Extract normalized planes from a column-major `projection * view` matrix
    pub fn from_view_projection(m: Mat4) -> Self {
        let r0 = mat4::get_row(m, 0);
        let r1 = mat4::get_row(m, 1);
        let r2 = mat4::get_row(m, 2);
        let r3 = mat4::get_row(m, 3);

        let add = |a: [f32; 4], b: [f32; 4]| [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]];
        let sub = |a: [f32; 4], b: [f32; 4]| [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]];

        let raw = [
            add(r3, r0), // left
            sub(r3, r0), // right
            add(r3, r1), // bottom
            sub(r3, r1), // top
            add(r3, r2), // near
            sub(r3, r2), // far
        ];
        Self::new(raw.map(|p| Plane::from_array(p).normalized()))
    }

    #[inline]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Masked three-way classification, see [`MaskedClassifier`]
    pub fn classify<B: Boxable + ?Sized>(&self, volume: &B, mask: &mut PlaneMask) -> Containment {
        MaskedClassifier.classify(self, volume, mask)
    }

    /// Reference classification, see [`BasicClassifier`]
    pub fn classify_basic<B: Boxable + ?Sized>(&self, volume: &B) -> Containment {
        BasicClassifier.classify(self, volume, &mut PlaneMask::empty())
    }

    /// Sphere test: outside as soon as the center is more than `radius`
    /// behind any plane
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.normalized().distance(center) >= -radius)
    }
}

/// Box-vs-frustum test used by the culling traversal
pub trait FrustumClassifier {
    /// Classify `volume`, skipping planes already set in `mask` and setting
    /// the bits of planes the volume turned out to be fully inside of
    fn classify<B: Boxable + ?Sized>(
        &self,
        frustum: &Frustum,
        volume: &B,
        mask: &mut PlaneMask,
    ) -> Containment;
}

/// Counts corners on the inside of each unmasked plane
///
/// - 0 inside: the box is outside that plane, return `Outside` immediately
/// - 8 inside: set the plane's bit in `mask`
/// - otherwise the box straddles the plane
///
/// `Inside` only when no tested plane was straddled.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaskedClassifier;

impl FrustumClassifier for MaskedClassifier {
    fn classify<B: Boxable + ?Sized>(
        &self,
        frustum: &Frustum,
        volume: &B,
        mask: &mut PlaneMask,
    ) -> Containment {
        let corners = volume.corners();
        let mut complete_inside = true;

        for (index, plane) in frustum.planes.iter().enumerate() {
            let bit = PlaneMask::plane(index);
            if mask.contains(bit) {
                continue;
            }

            let count = corners.iter().filter(|c| plane.distance(**c) > 0.0).count();

            if count == 0 {
                return Containment::Outside;
            }
            if count < 8 {
                complete_inside = false;
            } else {
                mask.insert(bit);
            }
        }

        if complete_inside {
            Containment::Inside
        } else {
            Containment::Intersect
        }
    }
}

/// Rejects a box only when all eight corners are behind a single plane
///
/// Anything else is reported as `Inside`; the mask is left untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicClassifier;

impl FrustumClassifier for BasicClassifier {
    fn classify<B: Boxable + ?Sized>(
        &self,
        frustum: &Frustum,
        volume: &B,
        _mask: &mut PlaneMask,
    ) -> Containment {
        let corners = volume.corners();
        for plane in &frustum.planes {
            if corners.iter().all(|c| plane.distance(*c) <= 0.0) {
                return Containment::Outside;
            }
        }
        Containment::Inside
    }
}
