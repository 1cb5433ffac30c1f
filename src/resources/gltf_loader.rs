//! glTF 2.0 / GLB decoding into scene nodes and animation clips.
//!
//! Decoding is split so that I/O stays in the caller: [`parse_document`]
//! validates the container, [`external_uris`] lists the files it references,
//! [`draco_primitives`] hands out compressed geometry for decoding, and
//! [`build_model`] turns the document plus those files into a
//! [`LoadedModel`]. Everything here runs without a GPU.

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use cgmath::{Matrix4, Quaternion, Vector3};
use serde_json::Value;

use crate::{
    animation::{AnimationClip, Channel, Interpolation, Keyframes},
    data_structures::{
        model::{Material, ModelVertex, Primitive},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
        skin::{MAX_JOINTS, Skin},
    },
    error::LoadError,
    resources::LoadedModel,
};

/// Extensions the decoder understands well enough to honour when required.
const SUPPORTED_REQUIRED_EXTENSIONS: &[&str] = &["KHR_materials_unlit", "KHR_texture_transform"];

/// Draco mesh compression, decoded outside the gltf crate.
pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Node extras key holding a per-frame Y rotation in radians.
const ROTATION_SPEED_KEY: &str = "rotationSpeed";

/// True when the first non-blank byte opens a markup tag.
pub(crate) fn looks_like_html(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

/// Parses the glTF JSON or GLB container.
pub fn parse_document(bytes: &[u8], path: &str) -> Result<gltf::Gltf, LoadError> {
    let (json, blob): (Cow<[u8]>, Option<Vec<u8>>) = if bytes.starts_with(b"glTF") {
        let glb = gltf::Glb::from_slice(bytes).map_err(|e| LoadError::parse(path, e))?;
        (glb.json, glb.bin.map(Cow::into_owned))
    } else {
        (Cow::Borrowed(bytes), None)
    };

    let mut root: gltf::json::Root = match serde_json::from_slice(&json) {
        Ok(root) => root,
        Err(_) if looks_like_html(bytes) => {
            return Err(LoadError::HtmlDocument {
                path: path.to_string(),
            });
        }
        Err(e) => return Err(LoadError::parse(path, e)),
    };

    root.extensions_required.retain(|ext| ext != DRACO_EXTENSION);
    if let Some(extension) = root
        .extensions_required
        .iter()
        .find(|ext| !SUPPORTED_REQUIRED_EXTENSIONS.contains(&ext.as_str()))
    {
        return Err(LoadError::parse(
            path,
            format!("required extension {} is not supported", extension),
        ));
    }

    let document = gltf::Document::from_json(root).map_err(|e| LoadError::parse(path, e))?;
    Ok(gltf::Gltf { document, blob })
}

/// Relative URIs of external buffers and images, in document order.
pub fn external_uris(document: &gltf::Gltf) -> Vec<String> {
    let buffers = document.buffers().filter_map(|buffer| match buffer.source() {
        gltf::buffer::Source::Uri(uri) if !uri.starts_with("data:") => Some(uri.to_string()),
        _ => None,
    });
    let images = document.images().filter_map(|image| match image.source() {
        gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => Some(uri.to_string()),
        _ => None,
    });
    let mut uris: Vec<String> = buffers.chain(images).collect();
    uris.dedup();
    uris
}

/// Vertex streams of one primitive before they are interleaved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub joints: Option<Vec<[u32; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    /// Triangle list; without one the vertices are used in order.
    pub indices: Option<Vec<u32>>,
}

/// One decoded vertex attribute as a flat array of `components`-wide rows.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatAttribute {
    /// glTF semantic such as `POSITION` or `TEXCOORD_0`.
    pub semantic: String,
    pub components: usize,
    pub values: Vec<f32>,
}

fn row<const N: usize>(values: &[f32]) -> [f32; N] {
    let mut out = [0.0; N];
    out.iter_mut().zip(values).for_each(|(o, v)| *o = *v);
    out
}

impl Geometry {
    /// Builds geometry from decompressed attribute arrays.
    pub fn from_flat(indices: Vec<u32>, attributes: Vec<FlatAttribute>) -> Result<Self, String> {
        let mut geometry = Geometry {
            indices: Some(indices),
            ..Default::default()
        };
        for attribute in attributes {
            if attribute.components == 0 {
                return Err(format!("attribute {} has no components", attribute.semantic));
            }
            let rows = attribute.values.chunks_exact(attribute.components);
            match attribute.semantic.as_str() {
                "POSITION" => geometry.positions = rows.map(row::<3>).collect(),
                "NORMAL" => geometry.normals = Some(rows.map(row::<3>).collect()),
                "TEXCOORD_0" => geometry.tex_coords = Some(rows.map(row::<2>).collect()),
                "JOINTS_0" => {
                    let joints = rows.map(|r| row::<4>(r).map(|joint| joint as u32));
                    geometry.joints = Some(joints.collect());
                }
                "WEIGHTS_0" => geometry.weights = Some(rows.map(row::<4>).collect()),
                other => log::debug!("Ignoring compressed attribute {}", other),
            }
        }
        if geometry.positions.is_empty() {
            return Err("compressed geometry has no positions".to_string());
        }
        Ok(geometry)
    }

    fn into_primitive(
        self,
        mesh_index: usize,
        path: &str,
        material: Arc<Material>,
    ) -> Result<Primitive, LoadError> {
        let Geometry {
            positions,
            normals,
            tex_coords,
            joints,
            weights,
            indices,
        } = self;

        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(LoadError::parse(
                path,
                format!(
                    "mesh {} references vertex {} out of {}",
                    mesh_index,
                    bad,
                    positions.len()
                ),
            ));
        }
        let normals = normals
            .filter(|normals| normals.len() == positions.len())
            .unwrap_or_else(|| flat_normals(&positions, &indices));
        let skinning = match (joints, weights) {
            (Some(joints), Some(weights))
                if joints.len() == positions.len() && weights.len() == positions.len() =>
            {
                Some((joints, weights))
            }
            _ => None,
        };

        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, position)| ModelVertex {
                position: *position,
                tex_coords: tex_coords
                    .as_ref()
                    .and_then(|coords| coords.get(i).copied())
                    .unwrap_or_default(),
                normal: normals[i],
                joints: skinning.as_ref().map(|(joints, _)| joints[i]).unwrap_or_default(),
                weights: skinning.as_ref().map(|(_, weights)| weights[i]).unwrap_or_default(),
            })
            .collect();

        Ok(Primitive {
            vertices,
            indices,
            material,
        })
    }
}

/// Compressed geometry of one primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct DracoPrimitive {
    pub mesh: usize,
    pub primitive: usize,
    pub data: Vec<u8>,
    /// glTF semantic and Draco attribute id, sorted by semantic.
    pub attributes: Vec<(String, u32)>,
}

/// Decoded Draco geometry keyed by mesh and primitive index.
pub type DecodedGeometry = HashMap<(usize, usize), Geometry>;

/// Lists the primitives stored with Draco compression.
pub fn draco_primitives(
    document: &gltf::Gltf,
    path: &str,
    external: &HashMap<String, Vec<u8>>,
) -> Result<Vec<DracoPrimitive>, LoadError> {
    let buffers = load_buffers(document, path, external)?;
    let mut compressed = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let Some(extension) = primitive.extension_value(DRACO_EXTENSION) else {
                continue;
            };
            let invalid = || {
                LoadError::parse(
                    path,
                    format!("mesh {} has a malformed {} extension", mesh.index(), DRACO_EXTENSION),
                )
            };

            let view = extension
                .get("bufferView")
                .and_then(Value::as_u64)
                .and_then(|index| document.views().nth(index as usize))
                .ok_or_else(invalid)?;
            let data = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(view.offset()..view.offset() + view.length()))
                .ok_or_else(invalid)?
                .to_vec();
            let mut attributes = extension
                .get("attributes")
                .and_then(Value::as_object)
                .ok_or_else(invalid)?
                .iter()
                .map(|(semantic, id)| {
                    let id = id.as_u64().ok_or_else(invalid)?;
                    Ok((semantic.clone(), id as u32))
                })
                .collect::<Result<Vec<_>, LoadError>>()?;
            attributes.sort();

            compressed.push(DracoPrimitive {
                mesh: mesh.index(),
                primitive: primitive.index(),
                data,
                attributes,
            });
        }
    }
    Ok(compressed)
}

/// Decodes a self-contained GLB (or glTF without external files).
///
/// Draco-compressed primitives need [`build_model`] with decoded geometry.
pub fn decode(bytes: &[u8], path: &str) -> Result<LoadedModel, LoadError> {
    let document = parse_document(bytes, path)?;
    build_model(document, path, &HashMap::new(), &DecodedGeometry::new())
}

/// Builds the node tree and clips from a parsed document.
///
/// `external` maps URIs from [`external_uris`] to their contents, `decoded`
/// holds the geometry of every primitive listed by [`draco_primitives`].
pub fn build_model(
    document: gltf::Gltf,
    path: &str,
    external: &HashMap<String, Vec<u8>>,
    decoded: &DecodedGeometry,
) -> Result<LoadedModel, LoadError> {
    let buffers = load_buffers(&document, path, external)?;
    let images = load_images(&document, path, &buffers, external);
    let materials = load_materials(&document, &images);
    let default_material = Arc::new(Material::new("default", [1.0, 1.0, 1.0, 1.0], None));

    let meshes = document
        .meshes()
        .map(|mesh| {
            load_primitives(&mesh, path, &buffers, decoded, &materials, &default_material)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let skins = load_skins(&document, path, &buffers);

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| LoadError::parse(path, "the file contains no scene"))?;

    let mut root = ContainerNode::new(scene.name().unwrap_or(path), None);
    for node in scene.nodes() {
        root.add_child(to_scene_node(&node, &meshes, &skins));
    }

    let clips = load_animations(&document, path, &buffers)?;
    Ok(LoadedModel {
        root: Box::new(root),
        clips,
    })
}

fn load_buffers<'a>(
    document: &'a gltf::Gltf,
    path: &str,
    external: &'a HashMap<String, Vec<u8>>,
) -> Result<Vec<&'a [u8]>, LoadError> {
    let mut buffer_data = Vec::new();
    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => document
                .blob
                .as_deref()
                .ok_or_else(|| LoadError::parse(path, "GLB binary chunk is missing"))?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                return Err(LoadError::parse(path, "embedded data URIs are not supported"));
            }
            gltf::buffer::Source::Uri(uri) => external
                .get(uri)
                .map(Vec::as_slice)
                .ok_or_else(|| LoadError::parse(path, format!("buffer {} is unavailable", uri)))?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::parse(
                path,
                format!(
                    "buffer {} holds {} bytes, expected {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

fn load_images(
    document: &gltf::Gltf,
    path: &str,
    buffers: &[&[u8]],
    external: &HashMap<String, Vec<u8>>,
) -> Vec<Option<image::RgbaImage>> {
    document
        .images()
        .map(|image| {
            let bytes = match image.source() {
                gltf::image::Source::View { view, .. } => buffers
                    .get(view.buffer().index())
                    .and_then(|data| data.get(view.offset()..view.offset() + view.length())),
                gltf::image::Source::Uri { uri, .. } => external.get(uri).map(Vec::as_slice),
            };
            let Some(bytes) = bytes else {
                log::warn!("Image {} of {} is unavailable, using white", image.index(), path);
                return None;
            };
            match image::load_from_memory(bytes) {
                Ok(decoded) => Some(decoded.to_rgba8()),
                Err(e) => {
                    log::warn!("Image {} of {} could not be decoded: {}", image.index(), path, e);
                    None
                }
            }
        })
        .collect()
}

fn load_materials(
    document: &gltf::Gltf,
    images: &[Option<image::RgbaImage>],
) -> Vec<Arc<Material>> {
    document
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let texture = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()))
                .and_then(Clone::clone);
            let name = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material {}", material.index().unwrap_or(0)));
            Arc::new(Material::new(name, pbr.base_color_factor(), texture))
        })
        .collect()
}

fn read_geometry(
    primitive: &gltf::Primitive,
    mesh_index: usize,
    path: &str,
    buffers: &[&[u8]],
) -> Result<Geometry, LoadError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());
    let positions = reader
        .read_positions()
        .ok_or_else(|| {
            LoadError::parse(path, format!("mesh {} has a primitive without positions", mesh_index))
        })?
        .collect();
    Ok(Geometry {
        positions,
        normals: reader.read_normals().map(|normals| normals.collect()),
        tex_coords: reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().collect()),
        joints: reader
            .read_joints(0)
            .map(|joints| joints.into_u16().map(|j| j.map(u32::from)).collect()),
        weights: reader
            .read_weights(0)
            .map(|weights| weights.into_f32().collect()),
        indices: reader
            .read_indices()
            .map(|indices| indices.into_u32().collect()),
    })
}

fn load_primitives(
    mesh: &gltf::Mesh,
    path: &str,
    buffers: &[&[u8]],
    decoded: &DecodedGeometry,
    materials: &[Arc<Material>],
    default_material: &Arc<Material>,
) -> Result<Vec<Primitive>, LoadError> {
    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "Skipping {:?} primitive in mesh {} of {}",
                primitive.mode(),
                mesh.index(),
                path
            );
            continue;
        }

        let geometry = if primitive.extension_value(DRACO_EXTENSION).is_some() {
            decoded
                .get(&(mesh.index(), primitive.index()))
                .cloned()
                .ok_or_else(|| {
                    LoadError::parse(
                        path,
                        format!(
                            "mesh {} is Draco compressed but was not decompressed",
                            mesh.index()
                        ),
                    )
                })?
        } else {
            read_geometry(&primitive, mesh.index(), path, buffers)?
        };

        let material = primitive
            .material()
            .index()
            .and_then(|idx| materials.get(idx))
            .unwrap_or(default_material)
            .clone();
        primitives.push(geometry.into_primitive(mesh.index(), path, material)?);
    }
    Ok(primitives)
}

fn load_skins(document: &gltf::Gltf, path: &str, buffers: &[&[u8]]) -> Vec<Skin> {
    document
        .skins()
        .map(|skin| {
            let reader = skin.reader(|buffer| buffers.get(buffer.index()).copied());
            let inverse_bind_matrices = reader
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(Matrix4::from).collect())
                .unwrap_or_default();
            let joints: Vec<usize> = skin.joints().map(|joint| joint.index()).collect();
            if joints.len() > MAX_JOINTS {
                log::warn!(
                    "Skin {} of {} has {} joints, only the first {} are animated",
                    skin.index(),
                    path,
                    joints.len(),
                    MAX_JOINTS
                );
            }
            Skin::new(joints, inverse_bind_matrices)
        })
        .collect()
}

/// Per-vertex normals accumulated from the faces a vertex belongs to.
fn flat_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    use cgmath::InnerSpace;

    let mut normals = vec![Vector3::new(0.0_f32, 0.0, 0.0); positions.len()];
    for face in indices.chunks_exact(3) {
        let [a, b, c] = [face[0], face[1], face[2]].map(|i| Vector3::from(positions[i as usize]));
        let normal = (b - a).cross(c - a);
        for &i in face {
            normals[i as usize] += normal;
        }
    }
    normals
        .into_iter()
        .map(|n| {
            if n.magnitude2() > 0.0 {
                n.normalize().into()
            } else {
                [0.0, 1.0, 0.0]
            }
        })
        .collect()
}

fn rotation_speed(node: &gltf::Node) -> Option<f32> {
    let raw = node.extras().as_ref()?;
    let extras: serde_json::Value = serde_json::from_str(raw.get()).ok()?;
    extras.get(ROTATION_SPEED_KEY)?.as_f64().map(|speed| speed as f32)
}

fn to_scene_node(
    node: &gltf::Node,
    meshes: &[Vec<Primitive>],
    skins: &[Skin],
) -> Box<dyn SceneNode> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));

    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        Some(mesh) => {
            let primitives = meshes.get(mesh.index()).cloned().unwrap_or_default();
            let mut model = ModelNode::new(name, Some(node.index()), primitives);
            if let Some(speed) = rotation_speed(node) {
                model = model.with_rotation_speed(speed);
            }
            if let Some(skin) = node.skin().and_then(|skin| skins.get(skin.index())) {
                model = model.with_skin(skin.clone());
            }
            Box::new(model)
        }
        None => Box::new(ContainerNode::new(name, Some(node.index()))),
    };

    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    let local = scene_node.local_transform_mut();
    local.position = translation.into();
    local.rotation = Quaternion::new(w, x, y, z);
    local.scale = scale.into();

    for child in node.children() {
        scene_node.add_child(to_scene_node(&child, meshes, skins));
    }
    scene_node
}

fn load_animations(
    document: &gltf::Gltf,
    path: &str,
    buffers: &[&[u8]],
) -> Result<Vec<AnimationClip>, LoadError> {
    use gltf::animation::util::ReadOutputs;

    let mut clips = Vec::new();
    for animation in document.animations() {
        let mut channels = Vec::new();
        for channel in animation.channels() {
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).copied());
            let Some(inputs) = reader.read_inputs() else {
                log::warn!(
                    "Animation channel {} of {} has no keyframe times",
                    channel.index(),
                    path
                );
                continue;
            };
            let timestamps: Vec<f32> = inputs.collect();

            let interpolation = match channel.sampler().interpolation() {
                gltf::animation::Interpolation::Linear => Interpolation::Linear,
                gltf::animation::Interpolation::Step => Interpolation::Step,
                gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
            };
            let keyframes = match reader.read_outputs() {
                Some(ReadOutputs::Translations(values)) => {
                    Keyframes::Translation(spline_values(values.map(Vector3::from), interpolation))
                }
                Some(ReadOutputs::Scales(values)) => {
                    Keyframes::Scale(spline_values(values.map(Vector3::from), interpolation))
                }
                Some(ReadOutputs::Rotations(values)) => Keyframes::Rotation(spline_values(
                    values.into_f32().map(|[x, y, z, w]| Quaternion::new(w, x, y, z)),
                    interpolation,
                )),
                Some(ReadOutputs::MorphTargetWeights(_)) => {
                    log::debug!("Skipping morph target channel {} of {}", channel.index(), path);
                    continue;
                }
                None => {
                    return Err(LoadError::parse(
                        path,
                        format!("animation channel {} has no keyframe values", channel.index()),
                    ));
                }
            };

            channels.push(Channel {
                node: channel.target().node().index(),
                interpolation,
                timestamps,
                keyframes,
            });
        }
        let name = animation
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("animation {}", animation.index()));
        clips.push(AnimationClip::new(name, channels));
    }
    Ok(clips)
}

/// Cubic spline samplers store in-tangent, value, out-tangent per keyframe.
fn spline_values<T>(values: impl Iterator<Item = T>, interpolation: Interpolation) -> Vec<T> {
    match interpolation {
        Interpolation::CubicSpline => values.skip(1).step_by(3).collect(),
        Interpolation::Linear | Interpolation::Step => values.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_bodies_are_reported_as_such() {
        let err = parse_document(b"\n  <!DOCTYPE html><html></html>", "Soldier.glb").unwrap_err();
        assert_eq!(
            err,
            LoadError::HtmlDocument {
                path: "Soldier.glb".to_string()
            }
        );
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_document(&[0x00, 0x01, 0x02], "broken.glb").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn cubic_spline_keeps_the_keyframe_values() {
        let values = [10, 1, 11, 20, 2, 21].into_iter();
        assert_eq!(spline_values(values, Interpolation::CubicSpline), vec![1, 2]);
    }

    #[test]
    fn flat_normals_face_up_for_a_floor_triangle() {
        let floor = [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]];
        let normals = flat_normals(&floor, &[0, 1, 2]);
        assert_eq!(normals, vec![[0.0, 1.0, 0.0]; 3]);
    }
}
