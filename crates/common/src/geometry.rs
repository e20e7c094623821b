use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in map or screen space, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRect {
    pub origin: DVec2,
    pub dimension: DVec2,
}

impl MapRect {
    pub fn new(origin: DVec2, dimension: DVec2) -> Self {
        Self { origin, dimension }
    }

    /// Square rectangle at the origin, the usual world extent of a tile pyramid.
    pub fn square(side: f64) -> Self {
        Self::new(DVec2::ZERO, DVec2::splat(side))
    }

    pub fn width(&self) -> f64 {
        self.dimension.x
    }

    pub fn height(&self) -> f64 {
        self.dimension.y
    }

    pub fn max(&self) -> DVec2 {
        self.origin + self.dimension
    }

    pub fn center(&self) -> DVec2 {
        self.origin + self.dimension * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_extents() {
        let r = MapRect::square(256.0);
        assert_eq!(r.width(), 256.0);
        assert_eq!(r.height(), 256.0);
        assert_eq!(r.max(), DVec2::splat(256.0));
        assert_eq!(r.center(), DVec2::splat(128.0));
    }
}
