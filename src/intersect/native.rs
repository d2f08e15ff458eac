use crate::LineOrPoint;

/// Exact intersection of a source segment with a target segment or
/// point. Touching is only reported when it is exact.
pub(super) fn intersect(source: &LineOrPoint, target: &LineOrPoint) -> Option<LineOrPoint> {
    source.intersect(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coordinate, Line};

    #[test]
    fn test_near_miss_is_not_reported() {
        let source: LineOrPoint = Line::new(Coordinate { x: 0., y: 0. }, Coordinate { x: 10., y: 0. }).into();
        let target: LineOrPoint = Line::new(Coordinate { x: 5., y: 0.0005 }, Coordinate { x: 5., y: 3. }).into();
        assert_eq!(intersect(&source, &target), None);

        let touching: LineOrPoint = Line::new(Coordinate { x: 5., y: 0. }, Coordinate { x: 5., y: 3. }).into();
        assert_eq!(
            intersect(&source, &touching),
            Some(LineOrPoint::from(Coordinate { x: 5., y: 0. }))
        );
    }
}
