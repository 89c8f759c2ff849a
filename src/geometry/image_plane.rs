//! Image-plane geometry kernel.
//!
//! Pure functions on 2D points and homogeneous pixel coordinates. Degenerate
//! inputs never panic: parallel lines yield `None`, points near infinity
//! are clamped to a finite range.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Determinant threshold below which two segments are treated as parallel.
pub const PARALLEL_EPSILON: f64 = 1e-6;

/// Coordinate bound used when a homogeneous point lies (nearly) at infinity.
pub const HOMOGENEOUS_RANGE: f64 = 1e6;

/// Sentinel coordinate returned by [`line_intersection_or_sentinel`] for
/// parallel lines.
pub const NO_INTERSECTION: f64 = f64::MAX;

/// Whether segment AB is parallel to segment CD.
#[inline]
pub fn is_parallel(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>, d: &Point2<f64>) -> bool {
    ((a.x - b.x) * (c.y - d.y) - (a.y - b.y) * (c.x - d.x)).abs() < PARALLEL_EPSILON
}

/// Point on the infinite line AB with the given x coordinate.
///
/// Non-finite when AB is vertical; guard with [`is_parallel`].
#[inline]
pub fn line_intersection_x(a: &Point2<f64>, b: &Point2<f64>, x: f64) -> Point2<f64> {
    Point2::new(x, a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x))
}

/// Point on the infinite line AB with the given y coordinate.
///
/// Non-finite when AB is horizontal; guard with [`is_parallel`].
#[inline]
pub fn line_intersection_y(a: &Point2<f64>, b: &Point2<f64>, y: f64) -> Point2<f64> {
    Point2::new(a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y), y)
}

/// Intersection of line AB with line CD (lines, not segments).
///
/// Returns `None` when the lines are exactly parallel.
pub fn line_intersection(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    d: &Point2<f64>,
) -> Option<Point2<f64>> {
    // AB as a1 x + b1 y = c1
    let a1 = b.y - a.y;
    let b1 = a.x - b.x;
    let c1 = a1 * a.x + b1 * a.y;

    // CD as a2 x + b2 y = c2
    let a2 = d.y - c.y;
    let b2 = c.x - d.x;
    let c2 = a2 * c.x + b2 * c.y;

    let determinant = a1 * b2 - a2 * b1;
    if determinant == 0.0 {
        return None;
    }

    Some(Point2::new(
        (b2 * c1 - b1 * c2) / determinant,
        (a1 * c2 - a2 * c1) / determinant,
    ))
}

/// [`line_intersection`] returning `(NO_INTERSECTION, NO_INTERSECTION)` for
/// parallel lines, for inner loops that cannot afford an `Option`.
#[inline]
pub fn line_intersection_or_sentinel(
    a: &Point2<f64>,
    b: &Point2<f64>,
    c: &Point2<f64>,
    d: &Point2<f64>,
) -> Point2<f64> {
    line_intersection(a, b, c, d).unwrap_or_else(|| Point2::new(NO_INTERSECTION, NO_INTERSECTION))
}

/// Reduce a homogeneous 3-vector `(X, Y, Z)` to a pixel.
///
/// When `|Z| < 1` and the division would leave `[-1e6, 1e6]`, the dominant
/// axis is clamped to `±1e6` and the other axis scaled to keep the
/// direction. The result is finite for every finite input.
pub fn point_from_homogeneous(h: &Vector3<f64>) -> Point2<f64> {
    let (x, y, z) = (h.x, h.y, h.z);
    let abs_z = z.abs();
    if abs_z >= 1.0 {
        return Point2::new(x / z, y / z);
    }

    let max_abs_xy = x.abs().max(y.abs());
    if max_abs_xy < HOMOGENEOUS_RANGE * abs_z {
        return Point2::new(x / z, y / z);
    }
    if max_abs_xy == 0.0 {
        // (0, 0, 0): no direction to preserve.
        return Point2::origin();
    }

    if x.abs() > y.abs() {
        let cx = HOMOGENEOUS_RANGE.copysign(x);
        Point2::new(cx, cx * (y / x))
    } else {
        let cy = HOMOGENEOUS_RANGE.copysign(y);
        Point2::new(cy * (x / y), cy)
    }
}

/// Clip segment AB to the pixel rectangle `[0, width - 1] x [0, height - 1]`
/// (Cohen-Sutherland). `None` when the segment misses the rectangle.
pub fn clip_segment(
    a: &Point2<f64>,
    b: &Point2<f64>,
    width: u32,
    height: u32,
) -> Option<(Point2<f64>, Point2<f64>)> {
    const LEFT: u8 = 1;
    const RIGHT: u8 = 2;
    const TOP: u8 = 4;
    const BOTTOM: u8 = 8;

    if width == 0 || height == 0 {
        return None;
    }
    let x_max = (width - 1) as f64;
    let y_max = (height - 1) as f64;
    let outcode = |p: &Point2<f64>| {
        let mut code = 0;
        if p.x < 0.0 {
            code |= LEFT;
        } else if p.x > x_max {
            code |= RIGHT;
        }
        if p.y < 0.0 {
            code |= TOP;
        } else if p.y > y_max {
            code |= BOTTOM;
        }
        code
    };

    let (mut p, mut q) = (*a, *b);
    let (mut code_p, mut code_q) = (outcode(&p), outcode(&q));
    // Each pass moves one endpoint onto a border, so four passes suffice.
    for _ in 0..4 {
        if code_p | code_q == 0 {
            return Some((p, q));
        }
        if code_p & code_q != 0 {
            return None;
        }
        if code_p == 0 {
            std::mem::swap(&mut p, &mut q);
            std::mem::swap(&mut code_p, &mut code_q);
        }
        // The other endpoint lies on the inner side of the violated border,
        // so the line is never parallel to it here.
        p = if code_p & LEFT != 0 {
            line_intersection_x(&p, &q, 0.0)
        } else if code_p & RIGHT != 0 {
            line_intersection_x(&p, &q, x_max)
        } else if code_p & TOP != 0 {
            line_intersection_y(&p, &q, 0.0)
        } else {
            line_intersection_y(&p, &q, y_max)
        };
        code_p = outcode(&p);
    }
    (code_p | code_q == 0).then_some((p, q))
}

#[inline]
pub fn distance_squared(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    (p1 - p2).norm_squared()
}

#[inline]
pub fn distance(p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    (p1 - p2).norm()
}

/// Axis-aligned detection box in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Tightest box around a set of points. `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut min, mut max) = (*first, *first);
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self::new(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x + 0.5 * self.width, self.y + 0.5 * self.height)
    }
}
