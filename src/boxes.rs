use serde::{Deserialize, Serialize};

/// Axis-aligned box in corner form with its confidence score.
///
/// The coordinate space (letterboxed canvas or original image) is not part of
/// the type; callers keep track of it. A box with `x2 < x1`, `y2 < y1` or zero
/// area is degenerate and never overlaps anything.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self { x1, y1, x2, y2, score }
    }

    /// Converts a center-form `(cx, cy, w, h)` box into corner form. No clamping.
    #[must_use]
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, score: f32) -> Self {
        let half_w = w / 2.0;
        let half_h = h / 2.0;
        Self {
            x1: cx - half_w,
            y1: cy - half_h,
            x2: cx + half_w,
            y2: cy + half_h,
            score,
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// `(x2 - x1) * (y2 - y1)`, which may be zero or negative for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.x2 > self.x1 && self.y2 > self.y1)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    #[must_use]
    pub fn corners(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Overlap area of two boxes; zero when they do not intersect.
#[must_use]
pub fn intersection(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    inter_w * inter_h
}

/// Intersection over union with precomputed areas.
///
/// A union that is not strictly positive yields 0 rather than NaN or infinity.
#[must_use]
pub fn iou_with_areas(a: &BoundingBox, area_a: f32, b: &BoundingBox, area_b: f32) -> f32 {
    let inter = intersection(a, b);
    let union = area_a + area_b - inter;

    // Guard against division by zero
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[must_use]
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    iou_with_areas(a, a.area(), b, b.area())
}
