use std::cmp::Ordering;

use geo::Coordinate;

/// Wraps a [`Coordinate`] to support lexicographic ordering.
///
/// The ordering is by `x` and then by `y`. Implements `PartialOrd`,
/// `Ord` and `Eq` even though `Coordinate` doesn't implement these.
/// This is what makes ring start points, point sets and intersection
/// pieces come out in the same order regardless of how the input was
/// traversed.
///
/// Note that the trait impls exist even though `f64` is not `Eq` or
/// `Ord`. Construction checks that the components are finite so that
/// they can always be consistently ordered.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct OrderedCoord(Coordinate<f64>);

impl OrderedCoord {
    #[inline]
    pub fn coord(&self) -> Coordinate<f64> {
        self.0
    }
}

/// Implememnt lexicographic ordering by `x` and then by `y`
/// coordinate.
impl PartialOrd for OrderedCoord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.0.x.partial_cmp(&other.0.x) {
            Some(Ordering::Equal) => self.0.y.partial_cmp(&other.0.y),
            o => o,
        }
    }
}

/// Derive `Ord` from `PartialOrd` and expect to not fail.
impl Ord for OrderedCoord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap()
    }
}

/// We derive `Eq` manually to not require `T: Eq`.
impl Eq for OrderedCoord {}

/// Create from `Coordinate` while checking the components are finite.
impl From<Coordinate<f64>> for OrderedCoord {
    fn from(pt: Coordinate<f64>) -> Self {
        assert!(pt.x.is_finite(), "ordered coord requires a finite x-coordinate");
        assert!(pt.y.is_finite(), "ordered coord requires a finite y-coordinate");
        OrderedCoord(pt)
    }
}

impl From<(f64, f64)> for OrderedCoord {
    fn from(pt: (f64, f64)) -> Self {
        Coordinate::from(pt).into()
    }
}
