use geo::{Coordinate, Line};
use smallvec::SmallVec;

use crate::{
    utils::{cross, distance, distance_to_segment, project_fraction},
    LineOrPoint,
};

/// Intersection of a source segment with a target segment or point
/// within `tolerance`.
///
/// Target end points within the tolerance of the source, and source
/// end points within the tolerance of the target, are contacts at their
/// own location. Two contacts further apart than the tolerance form an
/// overlap; a single contact is a touching point. Without contacts, a
/// proper crossing is computed parametrically.
pub(super) fn intersect(source: &LineOrPoint, target: &LineOrPoint, tolerance: f64) -> Option<LineOrPoint> {
    let within = |p: Coordinate<f64>, l: &LineOrPoint| {
        let line = l.line();
        distance_to_segment(line.start, line.end, p) <= tolerance
    };

    match (source, target) {
        (_, LineOrPoint::Point(p)) => within(p.coord(), source).then(|| *target),
        (LineOrPoint::Point(p), _) => within(p.coord(), target).then(|| *source),
        (LineOrPoint::Line(a, b), LineOrPoint::Line(c, d)) => {
            let mut contacts: SmallVec<[Coordinate<f64>; 4]> = SmallVec::new();
            let mut push = |p: Coordinate<f64>| {
                if !contacts.iter().any(|&q| distance(p, q) <= tolerance) {
                    contacts.push(p);
                }
            };
            for p in [c.coord(), d.coord()].iter() {
                if within(*p, source) {
                    push(*p);
                }
            }
            for p in [a.coord(), b.coord()].iter() {
                if within(*p, target) {
                    push(*p);
                }
            }

            match contacts.len() {
                0 => crossing(source.line(), target.line()).map(LineOrPoint::from),
                1 => Some(contacts[0].into()),
                _ => {
                    // The overlap spans the two contacts that are furthest
                    // apart along the source.
                    let (a, b) = (a.coord(), b.coord());
                    let along = |p: &Coordinate<f64>| project_fraction(a, b, *p);
                    let min = contacts
                        .iter()
                        .min_by(|p, q| along(p).partial_cmp(&along(q)).unwrap_or(std::cmp::Ordering::Equal))
                        .copied()?;
                    let max = contacts
                        .iter()
                        .max_by(|p, q| along(p).partial_cmp(&along(q)).unwrap_or(std::cmp::Ordering::Equal))
                        .copied()?;
                    if distance(min, max) > tolerance {
                        Some(Line::new(min, max).into())
                    } else {
                        Some(min.into())
                    }
                }
            }
        }
    }
}

/// Proper crossing of two segments, if any.
fn crossing(s: Line<f64>, t: Line<f64>) -> Option<Coordinate<f64>> {
    let r = s.end - s.start;
    let q = t.end - t.start;
    let denom = cross(r, q);
    if denom == 0. {
        return None;
    }
    let w = t.start - s.start;
    let u = cross(w, q) / denom;
    let v = cross(w, r) / denom;
    if (0. ..=1.).contains(&u) && (0. ..=1.).contains(&v) {
        Some(Coordinate {
            x: s.start.x + r.x * u,
            y: s.start.y + r.y * u,
        })
    } else {
        None
    }
}
