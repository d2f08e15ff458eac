use criterion::*;
use geo::Coordinate;

#[path = "utils/random.rs"]
mod random;
use geo_cracking::{CrackPointCalculator, CrackerOptions, Geometry, Ring, Vertex};
use rand::{rngs::StdRng, SeedableRng};
use random::*;

fn polygon(coords: Vec<(f64, f64, f64)>) -> Geometry {
    Geometry::Polygon(vec![Ring::new(coords.into_iter().map(Vertex::from).collect()).unwrap()])
}

fn star_pairs(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let source = polygon(star_ring(&mut rng, Coordinate { x: 0., y: 0. }, 100., 512, 500.));
    let target = polygon(star_ring(&mut rng, Coordinate { x: 60., y: 20. }, 100., 512, 510.));

    for (name, options) in [
        ("custom", CrackerOptions::default()),
        ("custom - snapped", CrackerOptions::default().with_snap_tolerance(Some(0.5)).with_minimum_segment_length(Some(1.))),
        ("native", CrackerOptions::default().with_strategy(geo_cracking::IntersectionStrategy::Native)),
    ]
    .iter()
    {
        let calculator = CrackPointCalculator::new(options.clone()).unwrap();
        c.bench_function(&format!("Crack points - star rings ({name})"), |b| {
            b.iter(|| black_box(calculator.get_intersection_points(&source, &target).unwrap()))
        });
    }
}

fn square_grid(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let squares: Vec<Geometry> = (0..64)
        .map(|i| {
            let origin = Coordinate {
                x: (i % 8) as f64 * 90.,
                y: (i / 8) as f64 * 90.,
            };
            polygon(jittered_square(&mut rng, origin, 100., 16, 0.01))
        })
        .collect();
    let calculator = CrackPointCalculator::new(CrackerOptions::default()).unwrap();

    c.bench_function("Crack points - overlapping square grid", |b| {
        b.iter(|| {
            let mut count = 0;
            for a in squares.iter() {
                for other in squares.iter() {
                    if std::ptr::eq(a, other) || calculator.cannot_intersect(a, other) {
                        continue;
                    }
                    count += calculator.get_intersection_points(a, other).unwrap().0.len();
                }
            }
            black_box(count)
        })
    });
}

criterion_group!(crack, star_pairs, square_grid);
criterion_main!(crack);
