use glam::{Mat4, Vec2, Vec4};
use serde::Serialize;

/// Axis-aligned box in screen units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Vec2, width: f32, height: f32) -> Self {
        let half = Vec2::new(width, height) * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Touching edges do not count as an intersection.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }
}

/// Oriented box: a center, a unit direction for the local x axis, and the
/// full extents along the local axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obb {
    pub center: Vec2,
    pub axis: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Obb {
    pub fn new(center: Vec2, axis: Vec2, width: f32, height: f32) -> Self {
        let axis = axis.try_normalize().unwrap_or(Vec2::X);
        Self {
            center,
            axis,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn axis_aligned(center: Vec2, width: f32, height: f32) -> Self {
        Self::new(center, Vec2::X, width, height)
    }

    /// Corners in counter-clockwise order starting at the local (-x, -y) corner.
    pub fn quad(&self) -> [Vec2; 4] {
        let ux = self.axis * (self.width * 0.5);
        let uy = self.axis.perp() * (self.height * 0.5);
        [
            self.center - ux - uy,
            self.center + ux - uy,
            self.center + ux + uy,
            self.center - ux + uy,
        ]
    }

    pub fn extent(&self) -> Aabb {
        let quad = self.quad();
        let mut min = quad[0];
        let mut max = quad[0];
        for p in &quad[1..] {
            min = min.min(*p);
            max = max.max(*p);
        }
        Aabb { min, max }
    }

    /// Separating-axis test over the four edge normals of both boxes.
    /// Boxes that only touch are not considered intersecting.
    pub fn intersects(&self, other: &Obb) -> bool {
        let a = self.quad();
        let b = other.quad();
        let axes = [self.axis, self.axis.perp(), other.axis, other.axis.perp()];
        for axis in axes {
            let (a_min, a_max) = project(&a, axis);
            let (b_min, b_max) = project(&b, axis);
            if a_max <= b_min || b_max <= a_min {
                return false;
            }
        }
        true
    }
}

fn project(quad: &[Vec2; 4], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for p in quad {
        let d = p.dot(axis);
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}

/// Rotate `v` by the unit rotation vector `rotation` (cos, sin).
pub fn rotate_by(v: Vec2, rotation: Vec2) -> Vec2 {
    Vec2::new(
        v.x * rotation.x - v.y * rotation.y,
        v.x * rotation.y + v.y * rotation.x,
    )
}

/// Project a world-space point (z = 0) to screen pixels, y pointing down.
///
/// The second value is true when the point lies behind the camera; the
/// returned position is still finite in that case but meaningless.
pub fn world_to_screen(mvp: &Mat4, world: Vec2, screen: Vec2) -> (Vec2, bool) {
    let clip = *mvp * Vec4::new(world.x, world.y, 0.0, 1.0);
    let clipped = clip.w <= 0.0;
    let w = if clip.w.abs() < f32::EPSILON {
        f32::EPSILON
    } else {
        clip.w
    };
    let ndc = Vec2::new(clip.x / w, clip.y / w);
    let pos = Vec2::new(
        (ndc.x + 1.0) * 0.5 * screen.x,
        (1.0 - ndc.y) * 0.5 * screen.y,
    );
    (pos, clipped)
}

/// Orthographic matrix mapping world units one-to-one onto screen pixels
/// with the origin in the top-left corner.
pub fn screen_ortho(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
}
