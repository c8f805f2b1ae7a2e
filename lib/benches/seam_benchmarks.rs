//! Seam placement benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slicer_seams::{
    scale, Layer, Point, Polygon, Print, PrintObject, SeamPlacer, SeamPlacerConfig, SeamPosition,
    TriangleMesh,
};

const RADIUS: f64 = 10.0;
const HEIGHT: f64 = 20.0;
const SEGMENTS: usize = 64;

/// Cylinder sliced at 0.2mm with one external perimeter per layer.
fn cylinder_print(position: SeamPosition) -> Print {
    let mut object = PrintObject::from_mesh("cylinder", TriangleMesh::cylinder(RADIUS, HEIGHT, SEGMENTS));
    let outline = Polygon::circle(Point::zero(), scale(RADIUS), SEGMENTS);
    let layer_count = (HEIGHT / 0.2) as usize;
    object.set_layers(
        (1..=layer_count)
            .map(|i| Layer::new(0.2 * i as f64, vec![outline.clone()]))
            .collect(),
    );
    object.set_seam_position(position);

    let mut print = Print::new();
    print.add_object(object);
    print
}

fn seam_placer_init_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("seam_placer_init");
    group.sample_size(10);
    for position in [SeamPosition::Aligned, SeamPosition::Rear, SeamPosition::Random] {
        let print = cylinder_print(position);
        group.bench_function(format!("{position:?}"), |b| {
            b.iter(|| {
                let mut placer = SeamPlacer::new(SeamPlacerConfig::default());
                placer.init(black_box(&print), &|| false).unwrap();
                black_box(placer.stats())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, seam_placer_init_benchmark);
criterion_main!(benches);
