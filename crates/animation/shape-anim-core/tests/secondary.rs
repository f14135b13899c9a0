use std::sync::Arc;

use shape_anim_core::{
    Config, Sequence, SequenceId, Shape, ShapeInstance, ShapeNode, ShapeObject,
};

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn sprite_shape() -> Shape {
    let mut background = ShapeObject::new("background", Some(0));
    background.default_visibility = 0.5;
    background.default_frame = 2;
    background.default_mat_frame = 4;
    Shape {
        name: "sprite".into(),
        nodes: vec![ShapeNode::new("root", None)],
        objects: vec![ShapeObject::new("face", Some(0)), background],
        ..Default::default()
    }
}

fn instance_playing(shape: Shape, seq: SequenceId, pos: f32) -> ShapeInstance {
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    let t = inst.add_thread(seq).unwrap();
    inst.set_pos(t, pos).unwrap();
    inst.animate();
    inst
}

#[test]
fn on_off_visibility_snaps_at_the_midpoint() {
    let mut shape = sprite_shape();
    let blink = shape.push_sequence(
        Sequence::builder("blink", 2, 1.0)
            .visibility_track(0, [0.0, 1.0])
            .build()
            .unwrap(),
    );
    assert_eq!(instance_playing(shape.clone(), blink, 0.49).object_visibility()[0], 0.0);
    assert_eq!(instance_playing(shape, blink, 0.51).object_visibility()[0], 1.0);
}

#[test]
fn small_visibility_changes_fade() {
    let mut shape = sprite_shape();
    let fade = shape.push_sequence(
        Sequence::builder("fade", 2, 1.0)
            .visibility_track(0, [0.3, 0.5])
            .build()
            .unwrap(),
    );
    let inst = instance_playing(shape, fade, 0.5);
    assert!(approx(inst.object_visibility()[0], 0.4, 1e-6));
}

#[test]
fn cut_threshold_is_configurable() {
    let mut shape = sprite_shape();
    let blink = shape.push_sequence(
        Sequence::builder("blink", 2, 1.0)
            .visibility_track(0, [0.0, 1.0])
            .build()
            .unwrap(),
    );
    let config = Config {
        visibility_cut_threshold: 2.0,
        ..Config::default()
    };
    let mut inst = ShapeInstance::new(Arc::new(shape), config).unwrap();
    let t = inst.add_thread(blink).unwrap();
    inst.set_pos(t, 0.25).unwrap();
    inst.animate();
    assert!(approx(inst.object_visibility()[0], 0.25, 1e-6));
}

#[test]
fn frames_pick_the_nearest_key() {
    let mut shape = sprite_shape();
    let flip = shape.push_sequence(
        Sequence::builder("flip", 2, 1.0)
            .frame_track(0, [3, 8])
            .mat_frame_track(0, [1, 6])
            .build()
            .unwrap(),
    );
    let early = instance_playing(shape.clone(), flip, 0.4);
    assert_eq!(early.object_frames()[0], 3);
    assert_eq!(early.object_mat_frames()[0], 1);
    let late = instance_playing(shape, flip, 0.6);
    assert_eq!(late.object_frames()[0], 8);
    assert_eq!(late.object_mat_frames()[0], 6);
}

#[test]
fn unanimated_objects_take_their_defaults() {
    let mut shape = sprite_shape();
    let flip = shape.push_sequence(
        Sequence::builder("flip", 1, 1.0)
            .frame_track(0, [3])
            .build()
            .unwrap(),
    );
    let inst = instance_playing(shape, flip, 0.0);
    assert_eq!(inst.object_visibility(), &[1.0, 0.5]);
    assert_eq!(inst.object_frames(), &[3, 2]);
    assert_eq!(inst.object_mat_frames(), &[0, 4]);
}

#[test]
fn blend_threads_write_objects_after_owning_threads() {
    let mut shape = sprite_shape();
    let owned = shape.push_sequence(
        Sequence::builder("owned", 1, 1.0)
            .visibility_track(0, [0.9])
            .build()
            .unwrap(),
    );
    let layered = shape.push_sequence(
        Sequence::builder("layered", 1, 1.0)
            .blend(true)
            .visibility_track(0, [0.2])
            .visibility_track(1, [0.7])
            .build()
            .unwrap(),
    );
    let mut inst = ShapeInstance::new(Arc::new(shape), Config::default()).unwrap();
    let base = inst.add_thread(owned).unwrap();
    let layer = inst.add_thread(layered).unwrap();
    inst.set_priority(layer, 10.0).unwrap();
    inst.animate();
    assert_eq!(inst.object_visibility(), &[0.9, 0.7]);

    inst.remove_thread(base).unwrap();
    inst.animate();
    assert_eq!(inst.object_visibility(), &[0.2, 0.7]);
}
