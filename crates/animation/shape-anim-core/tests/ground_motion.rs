use std::sync::Arc;

use approx::assert_relative_eq;
use shape_anim_core::{
    ground_at, Config, Iso3, Sequence, Shape, ShapeInstance, ShapeNode, Vec3,
};

const IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
const QUARTER_Z: [f32; 4] = [
    0.0,
    0.0,
    std::f32::consts::FRAC_1_SQRT_2,
    std::f32::consts::FRAC_1_SQRT_2,
];

/// Cyclic walk moving 1 unit per half loop along `direction`.
fn walk(name: &str, direction: [f32; 3]) -> Sequence {
    let [x, y, z] = direction;
    Sequence::builder(name, 2, 1.0)
        .cyclic(true)
        .translation_track(0, [[0.0; 3], [0.0; 3]])
        .ground_frame(IDENTITY, [x, y, z])
        .ground_frame(IDENTITY, [2.0 * x, 2.0 * y, 2.0 * z])
        .build()
        .unwrap()
}

fn walker_shape() -> Shape {
    let mut shape = Shape {
        nodes: vec![ShapeNode::new("hips", None)],
        ..Default::default()
    };
    shape.push_sequence(walk("forward", [1.0, 0.0, 0.0]));
    shape.push_sequence(walk("sideways", [0.0, 1.0, 0.0]));
    shape
}

#[test]
fn one_full_loop_yields_the_last_ground_frame() {
    let shape = walker_shape();
    let forward = shape.find_sequence("forward").unwrap();
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    inst.add_thread(forward).unwrap();

    inst.advance_time(1.0);
    assert_relative_eq!(
        inst.ground_transform().translation.vector,
        Vec3::new(2.0, 0.0, 0.0),
        epsilon = 1e-5
    );
}

#[test]
fn deltas_across_several_loops_compose() {
    let shape = walker_shape();
    let forward = shape.find_sequence("forward").unwrap();
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    let t = inst.add_thread(forward).unwrap();

    let delta = inst.ground_delta(t, 0.0, 2.5).unwrap();
    assert_relative_eq!(delta.translation.vector.x, 5.0, epsilon = 1e-5);

    let back = inst.ground_delta(t, 2.5, 0.0).unwrap();
    assert_relative_eq!(back.translation.vector.x, -5.0, epsilon = 1e-5);

    assert_eq!(inst.ground_delta(t, 0.3, 0.3005).unwrap(), Iso3::identity());
}

#[test]
fn ground_rotation_turns_later_loops() {
    let mut shape = Shape {
        nodes: vec![ShapeNode::new("hips", None)],
        ..Default::default()
    };
    let turn = shape.push_sequence(
        Sequence::builder("turn", 1, 1.0)
            .cyclic(true)
            .ground_frame(QUARTER_Z, [1.0, 0.0, 0.0])
            .build()
            .unwrap(),
    );
    let inst_shape = Arc::new(shape);
    let mut inst = ShapeInstance::new(Arc::clone(&inst_shape), Config::default()).unwrap();
    let t = inst.add_thread(turn).unwrap();

    // Second loop walks along the turned X axis.
    let two = inst.ground_delta(t, 0.0, 2.0).unwrap();
    assert_relative_eq!(two.translation.vector, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(two.rotation.angle(), std::f32::consts::PI, epsilon = 1e-5);

    let half = ground_at(&inst_shape.sequences[0], 0.5);
    assert_relative_eq!(half.translation.vector.x, 0.5, epsilon = 1e-6);
    assert_relative_eq!(
        half.rotation.angle(),
        std::f32::consts::FRAC_PI_4,
        epsilon = 1e-5
    );
}

#[test]
fn highest_priority_owning_thread_drives_ground_motion() {
    let shape = walker_shape();
    let forward = shape.find_sequence("forward").unwrap();
    let sideways = shape.find_sequence("sideways").unwrap();
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    let a = inst.add_thread(forward).unwrap();
    let b = inst.add_thread(sideways).unwrap();
    inst.set_priority(a, 3.0).unwrap();
    inst.set_priority(b, 1.0).unwrap();

    inst.advance_time(0.25);
    assert_relative_eq!(
        inst.ground_transform().translation.vector,
        Vec3::new(0.5, 0.0, 0.0),
        epsilon = 1e-5
    );

    inst.set_priority(b, 4.0).unwrap();
    inst.advance_time(0.25);
    assert_relative_eq!(
        inst.ground_transform().translation.vector,
        Vec3::new(0.0, 0.5, 0.0),
        epsilon = 1e-5
    );
}

#[test]
fn paused_threads_report_no_motion() {
    let shape = walker_shape();
    let forward = shape.find_sequence("forward").unwrap();
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    let t = inst.add_thread(forward).unwrap();
    inst.set_time_scale(t, 0.0).unwrap();
    inst.advance_time(0.5);
    assert_eq!(*inst.ground_transform(), Iso3::identity());
    assert_eq!(inst.time_scale(t).unwrap(), 0.0);
}
