use crate::foundation::error::{EmberError, EmberResult};

/// Half-open integer pixel rectangle `[x0, x1) × [y0, y1)`.
///
/// Coordinates are signed: neighborhood offsets routinely produce negative intermediate values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    /// Inclusive left edge.
    pub x0: i32,
    /// Inclusive top edge.
    pub y0: i32,
    /// Exclusive right edge.
    pub x1: i32,
    /// Exclusive bottom edge.
    pub y1: i32,
}

impl PixelRect {
    /// Create a rectangle from its corner coordinates.
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a rectangle from origin and size.
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x0: x,
            y0: y,
            x1: x + w,
            y1: y + h,
        }
    }

    /// Width in pixels, `0` for inverted rectangles.
    pub fn width(self) -> i32 {
        (self.x1 - self.x0).max(0)
    }

    /// Height in pixels, `0` for inverted rectangles.
    pub fn height(self) -> i32 {
        (self.y1 - self.y0).max(0)
    }

    /// Number of pixels covered.
    pub fn area(self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Return `true` when no pixel is covered.
    pub fn is_empty(self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Return `true` when `(x, y)` is inside the rectangle.
    pub fn contains(self, x: i32, y: i32) -> bool {
        self.x0 <= x && x < self.x1 && self.y0 <= y && y < self.y1
    }

    /// Return `true` when `other` lies completely inside `self`.
    pub fn contains_rect(self, other: PixelRect) -> bool {
        other.is_empty()
            || (self.x0 <= other.x0
                && other.x1 <= self.x1
                && self.y0 <= other.y0
                && other.y1 <= self.y1)
    }

    /// Grow every edge by `margin` (shrink for negative margins).
    pub fn inflate(self, margin: i32) -> Self {
        Self {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    /// Intersection of two rectangles; may be empty.
    pub fn intersect(self, other: PixelRect) -> Self {
        Self {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    /// Translate by `(-x0, -y0)` of `origin`, i.e. express `self` relative to `origin`'s corner.
    pub fn relative_to(self, origin: PixelRect) -> Self {
        Self {
            x0: self.x0 - origin.x0,
            y0: self.y0 - origin.y0,
            x1: self.x1 - origin.x0,
            y1: self.y1 - origin.y0,
        }
    }
}

/// Round `value` up to the next multiple of `alignment` (`alignment > 0`).
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment > 0);
    value.div_ceil(alignment) * alignment
}

/// Half-open sample range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SampleRange {
    /// First sample index.
    pub start: u32,
    /// One past the last sample index.
    pub end: u32,
}

impl SampleRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: u32, end: u32) -> EmberResult<Self> {
        if start > end {
            return Err(EmberError::validation("SampleRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of samples in the range.
    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Return `true` when the range has no samples.
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
