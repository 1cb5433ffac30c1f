//! Draco decompression through the browser's Draco decoder module.
//!
//! `draco_decoder.js` is loaded once from the configured decoder path. The
//! decoded attributes come back as flat float arrays and are turned into
//! [`Geometry`] on the Rust side.

use js_sys::{Array, Float32Array, Reflect, Uint32Array};
use wasm_bindgen::{JsCast, JsValue, prelude::wasm_bindgen};

use crate::resources::gltf_loader::{DracoPrimitive, FlatAttribute, Geometry};

#[wasm_bindgen(inline_js = r#"
let decoderModule = null;

function loadDecoder(decoderPath) {
    if (decoderModule === null) {
        decoderModule = new Promise((resolve, reject) => {
            const script = document.createElement('script');
            script.src = decoderPath + 'draco_decoder.js';
            script.onload = () => {
                // wrapped, the module object itself is thenable
                DracoDecoderModule({ onModuleLoaded: (draco) => resolve({ draco }) });
            };
            script.onerror = () => reject(new Error('could not load ' + script.src));
            document.head.appendChild(script);
        }).catch((error) => {
            decoderModule = null;
            throw error;
        });
    }
    return decoderModule;
}

export async function decodeDraco(decoderPath, data, ids) {
    const { draco } = await loadDecoder(decoderPath);
    const decoder = new draco.Decoder();
    const mesh = new draco.Mesh();
    try {
        const bytes = new Int8Array(data);
        const status = decoder.DecodeArrayToMesh(bytes, bytes.byteLength, mesh);
        if (!status.ok() || mesh.ptr === 0) {
            throw new Error('Draco decoding failed: ' + status.error_msg());
        }

        const indexCount = mesh.num_faces() * 3;
        let ptr = draco._malloc(indexCount * 4);
        decoder.GetTrianglesUInt32Array(mesh, indexCount * 4, ptr);
        const indices = new Uint32Array(draco.HEAPF32.buffer, ptr, indexCount).slice();
        draco._free(ptr);

        const attributes = [];
        const components = [];
        for (const id of ids) {
            const attribute = decoder.GetAttributeByUniqueId(mesh, id);
            const width = attribute.num_components();
            const count = mesh.num_points() * width;
            ptr = draco._malloc(count * 4);
            decoder.GetAttributeDataArrayForAllPoints(
                mesh, attribute, draco.DT_FLOAT32, count * 4, ptr);
            attributes.push(new Float32Array(draco.HEAPF32.buffer, ptr, count).slice());
            components.push(width);
            draco._free(ptr);
        }
        return { indices, attributes, components };
    } finally {
        draco.destroy(mesh);
        draco.destroy(decoder);
    }
}
"#)]
extern "C" {
    #[wasm_bindgen(catch, js_name = decodeDraco)]
    async fn decode_draco(
        decoder_path: &str,
        data: &[u8],
        ids: Vec<u32>,
    ) -> Result<JsValue, JsValue>;
}

fn describe(error: JsValue) -> String {
    error
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| error.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

fn field<T: JsCast>(object: &JsValue, name: &str) -> Result<T, String> {
    Reflect::get(object, &JsValue::from_str(name))
        .map_err(describe)?
        .dyn_into::<T>()
        .map_err(|_| format!("Draco decoder returned no {}", name))
}

/// Decompresses one primitive.
pub async fn decode(decoder_path: &str, primitive: &DracoPrimitive) -> Result<Geometry, String> {
    let ids = primitive.attributes.iter().map(|(_, id)| *id).collect();
    let decoded = decode_draco(decoder_path, &primitive.data, ids)
        .await
        .map_err(describe)?;

    let indices = field::<Uint32Array>(&decoded, "indices")?.to_vec();
    let arrays = field::<Array>(&decoded, "attributes")?;
    let components = field::<Array>(&decoded, "components")?;

    let mut attributes = Vec::with_capacity(primitive.attributes.len());
    for (i, (semantic, _)) in primitive.attributes.iter().enumerate() {
        let values = arrays
            .get(i as u32)
            .dyn_into::<Float32Array>()
            .map_err(|_| format!("Draco decoder returned no data for {}", semantic))?
            .to_vec();
        attributes.push(FlatAttribute {
            semantic: semantic.clone(),
            components: components.get(i as u32).as_f64().unwrap_or(0.0) as usize,
            values,
        });
    }
    Geometry::from_flat(indices, attributes)
}
