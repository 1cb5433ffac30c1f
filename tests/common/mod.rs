#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use flow_viewer::{
    error::LoadError,
    resources::{AssetLoader, LoadFuture, gltf_loader},
};
use serde_json::{Value, json};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// What goes into a generated test model.
#[derive(Clone, Debug)]
pub struct BoxModel {
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// Adds a one second translation clip named "Idle".
    pub animated: bool,
    /// Written to the mesh node's extras.
    pub rotation_speed: Option<f32>,
}

impl Default for BoxModel {
    fn default() -> Self {
        Self {
            min: [-1.0, 0.0, -1.0],
            max: [1.0, 2.0, 1.0],
            animated: false,
            rotation_speed: None,
        }
    }
}

fn push_f32s(bin: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bin.extend_from_slice(&v.to_le_bytes());
    }
}

fn pad(bytes: &mut Vec<u8>, with: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(with);
    }
}

impl BoxModel {
    /// Builds a single-mesh GLB: an axis aligned box from `min` to `max`.
    pub fn to_glb(&self) -> Vec<u8> {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        let corners = [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ];
        let faces: [u32; 36] = [
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 1, 5, 0, 5, 4, // bottom
            3, 7, 6, 3, 6, 2, // top
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
        ];

        let mut bin = Vec::new();
        for corner in corners.iter() {
            push_f32s(&mut bin, corner);
        }
        let indices_offset = bin.len();
        for index in faces {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        let times_offset = bin.len();
        push_f32s(&mut bin, &[0.0, 1.0]);
        let translations_offset = bin.len();
        push_f32s(&mut bin, &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

        let mut node = json!({ "name": "box", "mesh": 0 });
        if let Some(speed) = self.rotation_speed {
            node["extras"] = json!({ "rotationSpeed": speed });
        }

        let mut document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "name": "test scene", "nodes": [0] }],
            "nodes": [node],
            "meshes": [{
                "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }]
            }],
            "buffers": [{ "byteLength": bin.len() }],
            "bufferViews": [
                {
                    "buffer": 0,
                    "byteOffset": 0,
                    "byteLength": indices_offset,
                    "target": 34962
                },
                {
                    "buffer": 0,
                    "byteOffset": indices_offset,
                    "byteLength": times_offset - indices_offset,
                    "target": 34963
                },
                {
                    "buffer": 0,
                    "byteOffset": times_offset,
                    "byteLength": translations_offset - times_offset
                },
                {
                    "buffer": 0,
                    "byteOffset": translations_offset,
                    "byteLength": bin.len() - translations_offset
                }
            ],
            "accessors": [
                {
                    "bufferView": 0, "componentType": 5126, "count": 8, "type": "VEC3",
                    "min": self.min, "max": self.max
                },
                { "bufferView": 1, "componentType": 5125, "count": 36, "type": "SCALAR" },
                {
                    "bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR",
                    "min": [0.0], "max": [1.0]
                },
                { "bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3" }
            ]
        });
        if self.animated {
            document["animations"] = json!([{
                "name": "Idle",
                "samplers": [{ "input": 2, "output": 3, "interpolation": "LINEAR" }],
                "channels": [{ "sampler": 0, "target": { "node": 0, "path": "translation" } }]
            }]);
        }

        write_glb(&document, bin)
    }
}

/// A three vertex strip bound to two joints: `hip` holds the two bottom
/// vertices, `arm` (one unit above the hip) holds the top one. The "Wave"
/// clip moves the arm from x = 0 to x = 1 over one second.
pub fn skinned_glb() -> Vec<u8> {
    let mut bin = Vec::new();
    push_f32s(&mut bin, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    let joints_offset = bin.len();
    bin.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
    let weights_offset = bin.len();
    for _ in 0..3 {
        push_f32s(&mut bin, &[1.0, 0.0, 0.0, 0.0]);
    }
    let indices_offset = bin.len();
    for index in [0u32, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    let bind_offset = bin.len();
    push_f32s(
        &mut bin,
        &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
    );
    push_f32s(
        &mut bin,
        &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0],
    );
    let times_offset = bin.len();
    push_f32s(&mut bin, &[0.0, 1.0]);
    let translations_offset = bin.len();
    push_f32s(&mut bin, &[0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);

    let view = |start: usize, end: usize| {
        json!({ "buffer": 0, "byteOffset": start, "byteLength": end - start })
    };
    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": "rig", "nodes": [0, 1] }],
        "nodes": [
            { "name": "body", "mesh": 0, "skin": 0 },
            { "name": "hip", "children": [2] },
            { "name": "arm", "translation": [0.0, 1.0, 0.0] }
        ],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 },
                "indices": 3
            }]
        }],
        "skins": [{ "joints": [1, 2], "inverseBindMatrices": 4 }],
        "animations": [{
            "name": "Wave",
            "samplers": [{ "input": 5, "output": 6, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 2, "path": "translation" } }]
        }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            view(0, joints_offset),
            view(joints_offset, weights_offset),
            view(weights_offset, indices_offset),
            view(indices_offset, bind_offset),
            view(bind_offset, times_offset),
            view(times_offset, translations_offset),
            view(translations_offset, bin.len())
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 2.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5121, "count": 3, "type": "VEC4" },
            { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 3, "componentType": 5125, "count": 3, "type": "SCALAR" },
            { "bufferView": 4, "componentType": 5126, "count": 2, "type": "MAT4" },
            {
                "bufferView": 5, "componentType": 5126, "count": 2, "type": "SCALAR",
                "min": [0.0], "max": [1.0]
            },
            { "bufferView": 6, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    });
    write_glb(&document, bin)
}

/// Bytes standing in for a Draco bitstream.
pub const DRACO_PAYLOAD: &[u8; 8] = b"DRACO\x02\x02\x00";

/// A single triangle whose geometry only exists Draco compressed.
pub fn draco_glb() -> Vec<u8> {
    let document = json!({
        "asset": { "version": "2.0" },
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"],
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "tile", "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "NORMAL": 1 },
                "indices": 2,
                "extensions": {
                    "KHR_draco_mesh_compression": {
                        "bufferView": 0,
                        "attributes": { "POSITION": 0, "NORMAL": 1 }
                    }
                }
            }]
        }],
        "buffers": [{ "byteLength": DRACO_PAYLOAD.len() }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": DRACO_PAYLOAD.len() }],
        "accessors": [
            {
                "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, -1.0], "max": [1.0, 0.0, 0.0]
            },
            { "componentType": 5126, "count": 3, "type": "VEC3" },
            { "componentType": 5125, "count": 3, "type": "SCALAR" }
        ]
    });
    write_glb(&document, DRACO_PAYLOAD.to_vec())
}

/// Wraps a JSON document and its binary buffer into a GLB container.
pub fn write_glb(document: &Value, mut bin: Vec<u8>) -> Vec<u8> {
    let mut json_chunk = serde_json::to_vec(document).expect("serializable document");
    pad(&mut json_chunk, b' ');
    pad(&mut bin, 0);

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(&json_chunk);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    glb.extend_from_slice(&bin);
    glb
}

/// In-memory stand-in for the asset root.
#[derive(Clone, Default)]
pub struct FakeLoader {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    requests: Rc<RefCell<Vec<String>>>,
}

impl FakeLoader {
    pub fn with(self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.borrow_mut().insert(path.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl AssetLoader for FakeLoader {
    fn load(&self, path: &str) -> LoadFuture {
        self.requests.borrow_mut().push(path.to_string());
        let path = path.to_string();
        let bytes = self.files.borrow().get(&path).cloned();
        Box::pin(async move {
            match bytes {
                Some(bytes) => gltf_loader::decode(&bytes, &path),
                None => Err(LoadError::network(&path, "404 Not Found")),
            }
        })
    }
}
