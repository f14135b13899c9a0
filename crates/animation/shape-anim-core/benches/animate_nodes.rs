use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shape_anim_core::{
    Config, ScaleValue, Sequence, SequenceId, Shape, ShapeInstance, ShapeNode,
};

const KEYS: usize = 8;

fn chain_shape(len: usize) -> (Arc<Shape>, SequenceId, SequenceId) {
    let mut shape = Shape {
        name: format!("chain_{len}"),
        nodes: (0..len)
            .map(|i| {
                ShapeNode::new(&format!("bone_{i}"), i.checked_sub(1))
                    .with_translation([0.0, 1.0, 0.0])
            })
            .collect(),
        ..Shape::default()
    };

    let mut sway = Sequence::builder("sway", KEYS, 1.0).cyclic(true);
    for node in 0..len {
        let rotations = (0..KEYS).map(|k| {
            let angle = (k as f32 / KEYS as f32) * std::f32::consts::TAU;
            let half = 0.05 * angle.sin();
            [0.0, 0.0, half.sin(), half.cos()]
        });
        sway = sway.rotation_track(node, rotations.collect::<Vec<_>>());
    }
    sway = sway
        .ground_frame([0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.5])
        .ground_frame([0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0]);

    let mut pulse = Sequence::builder("pulse", 2, 0.5).cyclic(true).blend(true);
    for node in (0..len).step_by(4) {
        pulse = pulse.scale_track(node, [ScaleValue::Uniform(1.0), ScaleValue::Uniform(1.1)]);
    }

    let sway = shape.push_sequence(sway.build().expect("sway"));
    let pulse = shape.push_sequence(pulse.build().expect("pulse"));
    (Arc::new(shape), sway, pulse)
}

fn bench_animate(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance_and_animate");
    for len in [16usize, 64, 256] {
        let (shape, sway, pulse) = chain_shape(len);
        let mut inst = ShapeInstance::new(shape, Config::default()).expect("instance");
        inst.add_thread(sway).expect("sway thread");
        inst.add_thread(pulse).expect("pulse thread");

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                inst.advance_time(black_box(1.0 / 60.0));
                inst.animate();
                black_box(inst.node_transforms().len());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_animate);
criterion_main!(benches);
