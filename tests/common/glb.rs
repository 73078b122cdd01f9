//! In-memory GLB files for the loader tests.

const GLB_MAGIC: u32 = 0x4654_6C67;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// One triangle in the XY plane, facing +Z.
pub const TRIANGLE: [[f32; 3]; 3] = [[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]];

pub fn triangle_bytes() -> Vec<u8> {
    TRIANGLE
        .iter()
        .flatten()
        .flat_map(|c| c.to_le_bytes())
        .collect()
}

/// Wrap a JSON document and a BIN chunk into a GLB container.
pub fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
    let mut json = json.as_bytes().to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    out
}

/// A model with a single node `group` whose mesh (also called `group`) has
/// `primitives` triangle primitives, each with its own material
/// `material_<i>`.
pub fn model_glb(group: &str, primitives: usize) -> Vec<u8> {
    GlbModel::new(group, primitives).build()
}

/// A one-node model whose primitives all share one triangle accessor. The
/// fields allow bending individual parts of the document out of shape.
#[derive(Clone, Debug)]
pub struct GlbModel {
    pub node: String,
    pub mesh: String,
    pub primitives: usize,
    /// Attribute the triangle accessor is bound to.
    pub attribute: &'static str,
    /// Declared length of the buffer; the BIN chunk always holds one triangle.
    pub buffer_length: usize,
    pub view_offset: usize,
    pub vertex_count: usize,
}

impl GlbModel {
    pub fn new(group: &str, primitives: usize) -> Self {
        Self {
            node: group.to_string(),
            mesh: group.to_string(),
            primitives,
            attribute: "POSITION",
            buffer_length: TRIANGLE.len() * 12,
            view_offset: 0,
            vertex_count: TRIANGLE.len(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let attribute = self.attribute;
        let primitive_list = (0..self.primitives)
            .map(|idx| format!(r#"{{"attributes": {{"{attribute}": 0}}, "material": {idx}}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let material_list = (0..self.primitives)
            .map(|idx| {
                format!(
                    r#"{{"name": "material_{idx}", "pbrMetallicRoughness": {{"baseColorFactor": [0.8, 0.8, 0.8, 1.0]}}}}"#
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "scene": 0,
                "scenes": [{{"nodes": [0]}}],
                "nodes": [{{"name": "{node}", "mesh": 0}}],
                "meshes": [{{"name": "{mesh}", "primitives": [{primitive_list}]}}],
                "materials": [{material_list}],
                "accessors": [{{
                    "bufferView": 0,
                    "componentType": 5126,
                    "count": {count},
                    "type": "VEC3",
                    "min": [-1.0, -1.0, 0.0],
                    "max": [1.0, 1.0, 0.0]
                }}],
                "bufferViews": [{{"buffer": 0, "byteOffset": {offset}, "byteLength": 36, "target": 34962}}],
                "buffers": [{{"byteLength": {length}}}]
            }}"#,
            node = self.node,
            mesh = self.mesh,
            count = self.vertex_count,
            offset = self.view_offset,
            length = self.buffer_length,
        );
        glb(&json, &triangle_bytes())
    }
}
