use std::collections::HashMap;

use flow_viewer::{
    error::{LoadError, LoadErrorKind},
    resources::{
        AssetLoader, GltfLoader,
        gltf_loader::{self, FlatAttribute, Geometry},
        load_binary,
    },
};

use crate::common::{BoxModel, DRACO_PAYLOAD, draco_glb, skinned_glb};

mod common;

#[test]
fn glb_files_decode_into_a_tree_and_clips() {
    let glb = BoxModel {
        animated: true,
        rotation_speed: Some(0.01),
        ..Default::default()
    }
    .to_glb();
    let loaded = gltf_loader::decode(&glb, "box.glb").unwrap();

    assert_eq!(loaded.root.name(), "test scene");
    assert_eq!(loaded.root.node_index(), None);
    let children = loaded.root.get_children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "box");
    assert_eq!(children[0].node_index(), Some(0));
    assert!(children[0].local_bounds().is_some());

    assert_eq!(loaded.clips.len(), 1);
    assert_eq!(loaded.clips[0].name, "Idle");
    assert_eq!(loaded.clips[0].duration(), 1.0);
}

#[test]
fn truncated_files_fail_to_parse() {
    let glb = BoxModel::default().to_glb();
    let err = gltf_loader::decode(&glb[..glb.len() / 2], "box.glb").unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::Parse);
}

#[tokio::test]
async fn the_loader_reads_from_the_asset_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("box.glb"), BoxModel::default().to_glb()).unwrap();
    let loader = GltfLoader::new(dir.path().to_string_lossy());

    let loaded = loader.load("box.glb").await.unwrap();
    assert!(loaded.clips.is_empty());
    assert_eq!(loaded.root.get_children().len(), 1);
}

#[tokio::test]
async fn missing_files_are_reported_with_their_path() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy();

    let err = load_binary(&root, "Soldier.glb").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::Network);
    assert_eq!(err.path(), "Soldier.glb");
}

#[tokio::test]
async fn html_pages_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Soldier.glb"), "<html><body>404</body></html>").unwrap();
    let loader = GltfLoader::new(dir.path().to_string_lossy());

    let err = loader.load("Soldier.glb").await.unwrap_err();
    assert_eq!(
        err,
        LoadError::HtmlDocument {
            path: "Soldier.glb".to_string()
        }
    );
}

#[test]
fn draco_compressed_primitives_are_handed_out_for_decoding() {
    let document = gltf_loader::parse_document(&draco_glb(), "tile.glb").unwrap();
    let compressed = gltf_loader::draco_primitives(&document, "tile.glb", &HashMap::new()).unwrap();

    assert_eq!(compressed.len(), 1);
    assert_eq!((compressed[0].mesh, compressed[0].primitive), (0, 0));
    assert_eq!(compressed[0].data, DRACO_PAYLOAD.to_vec());
    assert_eq!(
        compressed[0].attributes,
        vec![("NORMAL".to_string(), 1), ("POSITION".to_string(), 0)]
    );
}

#[test]
fn decompressed_geometry_replaces_the_draco_primitive() {
    let document = gltf_loader::parse_document(&draco_glb(), "tile.glb").unwrap();
    let geometry = Geometry::from_flat(
        vec![0, 1, 2],
        vec![FlatAttribute {
            semantic: "POSITION".to_string(),
            components: 3,
            values: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0],
        }],
    )
    .unwrap();
    let decoded = HashMap::from([((0, 0), geometry)]);

    let loaded = gltf_loader::build_model(document, "tile.glb", &HashMap::new(), &decoded).unwrap();
    let tile = &loaded.root.get_children()[0];
    let primitive = &tile.primitives()[0];
    assert_eq!(primitive.indices, vec![0, 1, 2]);
    assert_eq!(primitive.vertices[1].position, [1.0, 0.0, 0.0]);
    // no decoded normals, so they come from the face
    assert_eq!(primitive.vertices[0].normal, [0.0, 1.0, 0.0]);
}

#[test]
fn draco_files_need_decompressed_geometry() {
    let err = gltf_loader::decode(&draco_glb(), "tile.glb").unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::Parse);
    assert!(err.to_string().contains("Draco"));
}

#[tokio::test]
async fn the_native_loader_reports_draco_meshes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("LittlestTokyo.glb"), draco_glb()).unwrap();
    let loader = GltfLoader::new(dir.path().to_string_lossy());

    let err = loader.load("LittlestTokyo.glb").await.unwrap_err();
    assert_eq!(err.kind(), LoadErrorKind::Parse);
    assert_eq!(err.path(), "LittlestTokyo.glb");
    assert!(err.to_string().contains("Draco"));
}

#[test]
fn skins_are_attached_to_their_mesh_node() {
    let loaded = gltf_loader::decode(&skinned_glb(), "rig.glb").unwrap();
    let body = &loaded.root.get_children()[0];
    assert_eq!(body.name(), "body");

    let skin = body.skin().expect("the body mesh is skinned");
    assert_eq!(skin.joints(), &[1, 2]);
    let top = body.primitives()[0].vertices[2];
    assert_eq!(top.joints, [1, 0, 0, 0]);
    assert_eq!(top.weights, [1.0, 0.0, 0.0, 0.0]);

    assert!(loaded.root.get_children()[1].skin().is_none());
    assert_eq!(loaded.clips[0].name, "Wave");
}
