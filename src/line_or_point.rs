use geo::{
    kernels::{HasKernel, Kernel, Orientation},
    line_intersection::{line_intersection, LineIntersection},
    Coordinate, Line,
};

use crate::{utils::distance, OrderedCoord};

/// Either a line segment or a point.
///
/// The coordinates are ordered (see [`OrderedCoord`]) and a line
/// segment must have distinct points (use the `Point` variant if the
/// coordinates are the equal). A straight source segment, a target
/// segment, a target point and the result of intersecting two of
/// them are all represented by this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineOrPoint {
    Point(OrderedCoord),
    Line(OrderedCoord, OrderedCoord),
}

/// Convert from a [`Line`] ensuring end point ordering.
impl From<Line<f64>> for LineOrPoint {
    fn from(l: Line<f64>) -> Self {
        let start: OrderedCoord = l.start.into();
        let end: OrderedCoord = l.end.into();
        if start < end {
            LineOrPoint::Line(start, end)
        } else if start > end {
            LineOrPoint::Line(end, start)
        } else {
            LineOrPoint::Point(start)
        }
    }
}

/// Convert from a [`Coordinate`]
impl From<Coordinate<f64>> for LineOrPoint {
    fn from(c: Coordinate<f64>) -> Self {
        LineOrPoint::Point(c.into())
    }
}

impl LineOrPoint {
    /// Checks if the variant is a line.
    #[inline]
    pub fn is_line(&self) -> bool {
        matches!(self, LineOrPoint::Line(_, _))
    }

    /// Return the [`Line`] spanned by the variant; a point yields a
    /// degenerate line.
    #[inline]
    pub fn line(&self) -> Line<f64> {
        match self {
            LineOrPoint::Line(p, q) => Line::new(p.coord(), q.coord()),
            LineOrPoint::Point(p) => Line::new(p.coord(), p.coord()),
        }
    }

    /// Returns the lexicographic first coordinate of the geometry.
    pub fn first(&self) -> OrderedCoord {
        match self {
            LineOrPoint::Point(p) => *p,
            LineOrPoint::Line(p, _) => *p,
        }
    }

    /// Returns the lexicographic last coordinate of the geometry.
    pub fn last(&self) -> OrderedCoord {
        match self {
            LineOrPoint::Point(p) => *p,
            LineOrPoint::Line(_, q) => *q,
        }
    }

    /// Length of the line, zero for points.
    pub fn length(&self) -> f64 {
        distance(self.first().coord(), self.last().coord())
    }

    /// Exact intersection with `other`: a point, an overlapping segment
    /// or `None`.
    ///
    /// Uses the robust orientation predicate of the `geo` kernel, so a
    /// point is only reported on a line when it is exactly collinear.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (LineOrPoint::Point(p), LineOrPoint::Point(q)) => (p == q).then(|| *self),
            (LineOrPoint::Point(_), LineOrPoint::Line(_, _)) => self.intersect_line(other),
            (LineOrPoint::Line(_, _), LineOrPoint::Point(_)) => other.intersect_line(self),
            (LineOrPoint::Line(_, _), LineOrPoint::Line(_, _)) => self.intersect_line(other),
        }
    }

    /// Intersect a line with self and return a point, a overlapping segment or `None`.
    ///
    /// The `other` argument must be a line variant (panics otherwise).
    pub fn intersect_line(&self, other: &Self) -> Option<Self> {
        assert!(other.is_line(), "tried to intersect with a point variant!");

        let line = other.line();
        match *self {
            LineOrPoint::Point(p) => {
                if <f64 as HasKernel>::Ker::orient2d(line.start, p.coord(), line.end)
                    == Orientation::Collinear
                {
                    let ls = line.start.into();
                    let le = line.end.into();
                    if p >= ls && p <= le {
                        Some(*self)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            LineOrPoint::Line(p, q) => {
                line_intersection(Line::new(p.coord(), q.coord()), line).map(|l| match l {
                    LineIntersection::SinglePoint { intersection, .. } => intersection.into(),
                    LineIntersection::Collinear { intersection } => intersection.into(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp(x1: f64, y1: f64, x2: f64, y2: f64) -> LineOrPoint {
        Line::new(Coordinate { x: x1, y: y1 }, Coordinate { x: x2, y: y2 }).into()
    }

    #[test]
    fn test_line_ordering_on_construction() {
        let l = lp(5., 0., 0., 0.);
        assert_eq!(l.first().coord(), Coordinate { x: 0., y: 0. });
        assert_eq!(l.last().coord(), Coordinate { x: 5., y: 0. });
        assert!(!lp(1., 1., 1., 1.).is_line());
    }

    #[test]
    fn test_crossing_lines() {
        let hit = lp(0., 0., 2., 2.).intersect(&lp(0., 2., 2., 0.)).unwrap();
        assert_eq!(hit, LineOrPoint::from(Coordinate { x: 1., y: 1. }));
        assert!(lp(0., 0., 1., 0.).intersect(&lp(0., 1., 1., 1.)).is_none());
    }

    #[test]
    fn test_collinear_overlap() {
        let hit = lp(0., 0., 0., 60.).intersect(&lp(0., 30., 0., 10.)).unwrap();
        assert!(hit.is_line());
        assert_eq!(hit.first().coord(), Coordinate { x: 0., y: 10. });
        assert_eq!(hit.last().coord(), Coordinate { x: 0., y: 30. });
    }

    #[test]
    fn test_point_on_line() {
        let pt = LineOrPoint::from(Coordinate { x: 0., y: 30. });
        assert_eq!(lp(0., 0., 0., 60.).intersect(&pt), Some(pt));

        let off = LineOrPoint::from(Coordinate { x: 1e-9, y: 30. });
        assert_eq!(lp(0., 0., 0., 60.).intersect(&off), None);
    }
}
