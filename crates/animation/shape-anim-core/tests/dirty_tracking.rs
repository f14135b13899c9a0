use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shape_anim_core::math::translation_of;
use shape_anim_core::{
    Config, DirtyFlags, MaskFlags, Mat4, Sequence, Shape, ShapeAnimError, ShapeInstance,
    ShapeNode, ShapeObject, SubShape, Vec3,
};

/// Two independent sub-shapes: body (nodes 0-1, object 0) and head (node 2, object 1).
fn two_part_shape() -> Shape {
    let mut shape = Shape {
        name: "puppet".into(),
        nodes: vec![
            ShapeNode::new("body", None),
            ShapeNode::new("arm", Some(0)).with_translation([1.0, 0.0, 0.0]),
            ShapeNode::new("head", None).with_translation([0.0, 2.0, 0.0]),
        ],
        objects: vec![
            ShapeObject::new("torso", Some(0)),
            ShapeObject::new("eyes", Some(2)),
        ],
        sub_shapes: vec![
            SubShape {
                first_node: 0,
                num_nodes: 2,
                first_object: 0,
                num_objects: 1,
            },
            SubShape {
                first_node: 2,
                num_nodes: 1,
                first_object: 1,
                num_objects: 1,
            },
        ],
        sequences: Vec::new(),
    };
    shape.push_sequence(
        Sequence::builder("nod", 2, 1.0)
            .cyclic(true)
            .translation_track(2, [[0.0, 2.0, 0.0], [0.0, 3.0, 0.0]])
            .build()
            .unwrap(),
    );
    shape.push_sequence(
        Sequence::builder("blink", 2, 1.0)
            .visibility_track(1, [1.0, 0.0])
            .build()
            .unwrap(),
    );
    shape
}

fn instance() -> ShapeInstance {
    ShapeInstance::new(Arc::new(two_part_shape()), Config::default()).unwrap()
}

#[test]
fn new_instances_start_fully_dirty_and_animate_clears() {
    let mut inst = instance();
    assert_eq!(inst.dirty(0), DirtyFlags::all());
    assert_eq!(inst.dirty(1), DirtyFlags::all());
    inst.animate();
    assert!(inst.dirty(0).is_empty());
    assert!(inst.dirty(1).is_empty());

    inst.advance_time(0.0);
    assert!(inst.dirty(1).is_empty());
}

#[test]
fn threads_only_dirty_the_stages_they_animate() {
    let mut inst = instance();
    inst.animate();

    let nod = inst.shape().find_sequence("nod").unwrap();
    let t = inst.add_thread(nod).unwrap();
    assert!(inst.dirty(0).is_empty());
    assert_eq!(inst.dirty(1), DirtyFlags::TRANSFORM);
    inst.animate();

    let blink = inst.shape().find_sequence("blink").unwrap();
    inst.add_thread(blink).unwrap();
    assert_eq!(inst.dirty(1), DirtyFlags::VISIBILITY);
    inst.animate();

    inst.set_pos(t, 0.5).unwrap();
    assert!(inst.dirty(1).contains(DirtyFlags::TRANSFORM));
    inst.animate();
    assert_eq!(
        translation_of(&inst.node_transforms()[2]),
        Vec3::new(0.0, 2.5, 0.0)
    );
}

#[test]
fn hands_off_updates_dirty_only_their_sub_shape() {
    let mut inst = instance();
    inst.animate();

    inst.set_node_mask(1, MaskFlags::HANDS_OFF, true).unwrap();
    inst.animate();
    inst.set_hands_off_transform(1, Mat4::new_translation(&Vec3::new(0.0, 0.0, 4.0)))
        .unwrap();
    assert_eq!(inst.dirty(0), DirtyFlags::TRANSFORM);
    assert!(inst.dirty(1).is_empty());
    inst.animate();
    assert_eq!(
        translation_of(&inst.node_transforms()[1]),
        Vec3::new(0.0, 0.0, 4.0)
    );
}

#[test]
fn callbacks_force_evaluation_every_call() {
    let mut inst = instance();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    inst.set_node_callback(2, move |_node: usize, _local: &mut Mat4| {
        counter.fetch_add(1, Ordering::Relaxed);
    })
    .unwrap();

    inst.animate();
    inst.animate();
    inst.animate();
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[test]
fn removed_threads_are_gone() {
    let mut inst = instance();
    let nod = inst.shape().find_sequence("nod").unwrap();
    let t = inst.add_thread(nod).unwrap();
    inst.remove_thread(t).unwrap();
    assert_eq!(
        inst.remove_thread(t),
        Err(ShapeAnimError::ThreadNotFound { id: t })
    );
    assert!(inst.pos(t).is_err());
    assert!(inst.threads().is_empty());
}

#[test]
fn instances_sharing_a_shape_evaluate_in_parallel() {
    let shape = Arc::new(two_part_shape());
    let nod = shape.find_sequence("nod").unwrap();

    let mut instances: Vec<ShapeInstance> = (0..4)
        .map(|_| ShapeInstance::new(Arc::clone(&shape), Config::default()).unwrap())
        .collect();
    for (i, inst) in instances.iter_mut().enumerate() {
        let t = inst.add_thread(nod).unwrap();
        inst.set_pos(t, i as f32 * 0.25).unwrap();
    }

    std::thread::scope(|scope| {
        for inst in instances.iter_mut() {
            scope.spawn(move || {
                inst.advance_time(0.1);
                inst.animate();
            });
        }
    });

    for (i, inst) in instances.iter().enumerate() {
        let mut reference = ShapeInstance::new(Arc::clone(&shape), Config::default()).unwrap();
        let t = reference.add_thread(nod).unwrap();
        reference.set_pos(t, i as f32 * 0.25).unwrap();
        reference.advance_time(0.1);
        reference.animate();
        assert_eq!(inst.node_transforms(), reference.node_transforms());
    }
}
