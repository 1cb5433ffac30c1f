use cgmath::Vector3;
use flow_viewer::{
    data_structures::scene_graph::{Scene, SceneNode},
    model_manager::{LoadOutcome, ModelCatalog, ModelManager, PendingLoad},
    render_loop::RenderLoop,
};
use futures::executor::block_on;
use instant::Duration;

use crate::common::{FakeLoader, skinned_glb};

mod common;

/// World positions of the body's vertices after skinning.
fn skinned_world_positions(root: &dyn SceneNode) -> Vec<Vector3<f32>> {
    let body = &root.get_children()[0];
    let skin = body.skin().expect("the body mesh is skinned");
    assert_eq!(skin.joints(), &[1, 2]);
    body.primitives()[0]
        .vertices
        .iter()
        .map(|vertex| body.world_transform().transform_point(skin.skin_position(vertex)))
        .collect()
}

fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
    (a - b).x.abs() < 1e-5 && (a - b).y.abs() < 1e-5 && (a - b).z.abs() < 1e-5
}

#[test]
fn a_clip_on_a_joint_moves_the_bound_vertices() {
    let mut scene = Scene::new();
    let mut render_loop = RenderLoop::new();
    let loader = FakeLoader::default().with("Soldier.glb", skinned_glb());
    let mut manager = ModelManager::new(loader, ModelCatalog::default());

    let PendingLoad { ticket, future } = manager.toggle(&mut scene);
    let outcome = manager
        .finish_load(&mut scene, ticket, block_on(future), &mut render_loop)
        .unwrap();
    let LoadOutcome::Placed { node, animated } = outcome else {
        panic!("expected the model to be placed, got {:?}", outcome);
    };
    assert!(animated);

    scene.update_world_transforms();
    let rest = skinned_world_positions(scene.get(node).unwrap());

    manager.animate(&mut scene, Duration::from_millis(500));
    scene.update_world_transforms();
    let posed = skinned_world_positions(scene.get(node).unwrap());

    // the hip keeps still, the arm has moved half way
    assert!(close(posed[0], rest[0]));
    assert!(close(posed[1], rest[1]));
    assert!(close(posed[2] - rest[2], Vector3::new(0.5, 0.0, 0.0)));
}
