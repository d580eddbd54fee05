use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates.
///
/// Detector output is expected to satisfy `xmin < xmax` and `ymin < ymax`;
/// boxes that do not are rejected per-detection by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Midpoint of the box.
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
        )
    }

    /// Area in square pixels. Fails for non-positive width or height.
    pub fn area(&self) -> Result<f64> {
        let width = self.xmax - self.xmin;
        let height = self.ymax - self.ymin;
        if width <= 0.0 || height <= 0.0 {
            return Err(anyhow!(
                "invalid box: non-positive extent {:.1}x{:.1}",
                width,
                height
            ));
        }
        Ok(width * height)
    }

    pub fn validate(&self) -> Result<()> {
        self.area().map(|_| ())
    }

    /// Strict point containment: boundary points do not count.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x > self.xmin && x < self.xmax && y > self.ymin && y < self.ymax
    }

    /// Strict box containment: every corner of `inner` lies strictly inside.
    pub fn encloses(&self, inner: &BoundingBox) -> bool {
        inner.xmin > self.xmin
            && inner.ymin > self.ymin
            && inner.xmax < self.xmax
            && inner.ymax < self.ymax
    }
}

/// Euclidean distance between the centroids of two boxes.
pub fn centroid_distance(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let (ax, ay) = a.centroid();
    let (bx, by) = b.centroid();
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

/// Strict containment test against an optional rectangle. An absent
/// rectangle contains nothing.
pub fn contains(outer: Option<&BoundingBox>, point: (f64, f64)) -> bool {
    match outer {
        Some(rect) => rect.contains_point(point.0, point.1),
        None => false,
    }
}
