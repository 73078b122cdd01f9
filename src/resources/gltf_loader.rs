//! glTF / GLB to scene graph conversion.
//!
//! The conversion produces CPU-side nodes only. Names are handed out the way
//! common glTF viewers do it, so submeshes can be found by name afterwards:
//!
//! - every name goes through one shared counter; its first use stays bare and
//!   every repeat gets `_1`, `_2`, ...
//! - node names are claimed first, for the whole hierarchy, parents before
//!   children
//! - every primitive then claims the name of its mesh (`mesh_<index>` for
//!   unnamed meshes)
//! - a node whose mesh has a single primitive keeps the node name; one with
//!   several primitives becomes a container named after the node, holding one
//!   mesh child per primitive
//!
//! A node `Suzanne` with a two-primitive mesh `Suzanne` therefore yields the
//! children `Suzanne_1` and `Suzanne_2`.

use std::{collections::HashMap, sync::Arc};

use crate::{
    data_structures::{
        instance::Instance,
        material::Material,
        model::{MeshData, ModelVertex},
        scene_graph::{ContainerNode, MeshNode, SceneNode},
    },
    resources::{LoadError, load_binary, resolve_relative},
};

/// Read `file_name` from the asset directory and convert it into a node hierarchy.
pub async fn load_model_gltf(file_name: &str) -> Result<Box<dyn SceneNode>, LoadError> {
    let bytes = load_binary(file_name).await?;
    parse_gltf(file_name, &bytes).await
}

/// Convert already loaded glTF or GLB bytes. External buffers and images are
/// resolved relative to `file_name`.
pub async fn parse_gltf(file_name: &str, bytes: &[u8]) -> Result<Box<dyn SceneNode>, LoadError> {
    let gltf = gltf::Gltf::from_slice(bytes).map_err(|source| LoadError::Malformed {
        path: file_name.to_string(),
        reason: source.to_string(),
        source: Some(source),
    })?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| LoadError::malformed(file_name, "buffer refers to a missing BIN chunk"))?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                return Err(LoadError::unsupported(file_name, "data URI buffers"));
            }
            gltf::buffer::Source::Uri(uri) => load_binary(&resolve_relative(file_name, uri)).await?,
        };
        if data.len() < buffer.length() {
            return Err(LoadError::malformed(
                file_name,
                format!(
                    "buffer {} holds {} bytes but declares {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                ),
            ));
        }
        buffer_data.push(data);
    }

    let mut materials = Vec::new();
    for material in gltf.materials() {
        materials.push(Arc::new(load_material(file_name, &material, &buffer_data).await?));
    }

    let mut names = NodeNames::default();
    for scene in gltf.scenes() {
        for node in scene.nodes() {
            names.claim_nodes(&node);
        }
    }

    let mut models = Vec::new();
    for scene in gltf.scenes() {
        for node in scene.nodes() {
            models.push(to_scene_node(
                file_name,
                &node,
                &buffer_data,
                &materials,
                &mut names,
            )?);
        }
    }
    log::info!(
        "loaded {file_name}: {} top-level nodes, {} materials",
        models.len(),
        materials.len()
    );

    let root: Box<dyn SceneNode> = match <[_; 1]>::try_from(models) {
        Ok([model]) => model,
        Err(models) => {
            let mut root = ContainerNode::new(None);
            root.children = models;
            Box::new(root)
        }
    };
    Ok(root)
}

/// Whitespace becomes `_`; `[`, `]`, `.`, `:` and `/` are dropped.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            '[' | ']' | '.' | ':' | '/' => None,
            c if c.is_whitespace() => Some('_'),
            c => Some(c),
        })
        .collect()
}

/// A name counter shared by every node and primitive of one document.
#[derive(Debug, Default)]
struct UniqueNames {
    used: HashMap<String, u32>,
}

impl UniqueNames {
    fn claim(&mut self, name: &str) -> String {
        let name = sanitize_name(name);
        match self.used.get_mut(&name) {
            Some(count) => {
                *count += 1;
                format!("{name}_{count}")
            }
            None => {
                self.used.insert(name.clone(), 0);
                name
            }
        }
    }
}

#[derive(Debug, Default)]
struct NodeNames {
    unique: UniqueNames,
    // by node index
    nodes: HashMap<usize, String>,
    // by mesh index, one name per primitive
    meshes: HashMap<usize, Vec<String>>,
}

impl NodeNames {
    fn claim_nodes(&mut self, node: &gltf::Node<'_>) {
        if let Some(name) = node.name() {
            if !self.nodes.contains_key(&node.index()) {
                let name = self.unique.claim(name);
                self.nodes.insert(node.index(), name);
            }
        }
        for child in node.children() {
            self.claim_nodes(&child);
        }
    }

    fn node(&self, node: &gltf::Node<'_>) -> Option<String> {
        self.nodes.get(&node.index()).cloned()
    }

    /// Names of the primitives of `mesh`. Claimed on first use, so meshes
    /// shared by several nodes keep their names.
    fn primitives(&mut self, mesh: &gltf::Mesh<'_>) -> Vec<String> {
        if let Some(names) = self.meshes.get(&mesh.index()) {
            return names.clone();
        }
        let base = match mesh.name() {
            Some(name) => name.to_string(),
            None => format!("mesh_{}", mesh.index()),
        };
        let names: Vec<String> = mesh
            .primitives()
            .map(|_| self.unique.claim(&base))
            .collect();
        self.meshes.insert(mesh.index(), names.clone());
        names
    }
}

async fn load_material(
    file_name: &str,
    material: &gltf::Material<'_>,
    buffers: &[Vec<u8>],
) -> Result<Material, LoadError> {
    let pbr = material.pbr_metallic_roughness();
    let texture = match pbr.base_color_texture() {
        Some(info) => load_texture(file_name, &info.texture().source(), buffers).await?,
        None => None,
    };
    let name = match (material.name(), material.index()) {
        (Some(name), _) => name.to_string(),
        (None, Some(idx)) => format!("material {idx}"),
        (None, None) => "default".to_string(),
    };
    Ok(Material {
        name,
        base_color: pbr.base_color_factor(),
        emissive: material.emissive_factor(),
        texture,
        ..Material::default()
    })
}

/// Undecodable images are dropped so the material falls back to its base colour.
async fn load_texture(
    file_name: &str,
    source_image: &gltf::Image<'_>,
    buffers: &[Vec<u8>],
) -> Result<Option<Arc<image::RgbaImage>>, LoadError> {
    let bytes = match source_image.source() {
        gltf::image::Source::View { view, .. } => {
            let start = view.offset();
            let end = start + view.length();
            buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..end))
                .ok_or_else(|| {
                    LoadError::malformed(
                        file_name,
                        format!("image {} points outside its buffer", source_image.index()),
                    )
                })?
                .to_vec()
        }
        gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => {
            return Err(LoadError::unsupported(file_name, "data URI images"));
        }
        gltf::image::Source::Uri { uri, .. } => {
            load_binary(&resolve_relative(file_name, uri)).await?
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(decoded) => Ok(Some(Arc::new(decoded.to_rgba8()))),
        Err(e) => {
            log::warn!(
                "dropping image {} of {file_name}, it could not be decoded: {e}",
                source_image.index()
            );
            Ok(None)
        }
    }
}

fn to_scene_node(
    file_name: &str,
    node: &gltf::Node<'_>,
    buffers: &[Vec<u8>],
    materials: &[Arc<Material>],
    names: &mut NodeNames,
) -> Result<Box<dyn SceneNode>, LoadError> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let local = Instance {
        position: translation.into(),
        // glTF stores quaternions as [x, y, z, w]
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    };
    let name = names.node(node);

    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        None => Box::new(ContainerNode::new(name)),
        Some(mesh) => {
            let primitives = mesh
                .primitives()
                .map(|primitive| to_mesh_data(file_name, &primitive, buffers, materials))
                .collect::<Result<Vec<_>, _>>()?;
            let primitive_names = names.primitives(&mesh);
            match <[_; 1]>::try_from(primitives) {
                Ok([(data, material)]) => {
                    let name = name.or_else(|| primitive_names.into_iter().next());
                    Box::new(MeshNode::new(name, data, material))
                }
                Err(primitives) => {
                    let mut group = ContainerNode::new(name);
                    for ((data, material), child_name) in primitives.into_iter().zip(primitive_names) {
                        group.add_child(Box::new(MeshNode::new(Some(child_name), data, material)));
                    }
                    Box::new(group)
                }
            }
        }
    };
    scene_node.set_local_transform(local);

    for child in node.children() {
        scene_node.add_child(to_scene_node(file_name, &child, buffers, materials, names)?);
    }
    Ok(scene_node)
}

fn to_mesh_data(
    file_name: &str,
    primitive: &gltf::Primitive<'_>,
    buffers: &[Vec<u8>],
    materials: &[Arc<Material>],
) -> Result<(MeshData, Arc<Material>), LoadError> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        return Err(LoadError::unsupported(
            file_name,
            format!("{:?} primitives", primitive.mode()),
        ));
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    if primitive.get(&gltf::Semantic::Positions).is_none() {
        return Err(LoadError::unsupported(file_name, "primitive without positions"));
    }
    let positions = reader.read_positions().ok_or_else(|| {
        LoadError::malformed(file_name, "position data lies outside its buffer")
    })?;
    let mut normals = reader.read_normals();
    let mut tex_coords = reader.read_tex_coords(0).map(|coords| coords.into_f32());

    let vertices: Vec<ModelVertex> = positions
        .map(|position| ModelVertex {
            position,
            tex_coords: tex_coords
                .as_mut()
                .and_then(|coords| coords.next())
                .unwrap_or_default(),
            normal: normals
                .as_mut()
                .and_then(|normals| normals.next())
                .unwrap_or([0.0, 1.0, 0.0]),
        })
        .collect();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
        return Err(LoadError::malformed(
            file_name,
            format!(
                "index {index} is out of range for {} vertices",
                vertices.len()
            ),
        ));
    }

    let material = match primitive.material().index() {
        Some(idx) => materials.get(idx).cloned().ok_or_else(|| {
            LoadError::malformed(file_name, format!("material {idx} does not exist"))
        })?,
        None => Arc::new(Material::default()),
    };
    Ok((MeshData::new(vertices, indices), material))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_is_malformed() {
        let err = parse_gltf("junk.glb", b"definitely not a model")
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[tokio::test]
    async fn empty_document_yields_an_empty_root() {
        let json = br#"{"asset":{"version":"2.0"},"scenes":[{"nodes":[]}]}"#;
        let root = parse_gltf("empty.gltf", json).await.unwrap();
        assert!(root.name().is_none());
        assert!(root.get_children().is_empty());
    }

    #[test]
    fn repeated_names_get_a_counter_suffix() {
        let mut unique = UniqueNames::default();
        assert_eq!(unique.claim("Suzanne"), "Suzanne");
        assert_eq!(unique.claim("Suzanne"), "Suzanne_1");
        assert_eq!(unique.claim("Suzanne"), "Suzanne_2");
        assert_eq!(unique.claim("Cube"), "Cube");
        assert_eq!(unique.claim("Suzanne"), "Suzanne_3");
    }

    #[test]
    fn names_are_sanitized_before_counting() {
        let mut unique = UniqueNames::default();
        assert_eq!(unique.claim("Suzanne.001"), "Suzanne001");
        assert_eq!(unique.claim("left eye"), "left_eye");
        assert_eq!(unique.claim("left eye"), "left_eye_1");
        assert_eq!(unique.claim("a[0]:b/c"), "a0bc");
    }

    #[tokio::test]
    async fn data_uris_are_unsupported() {
        let json = br#"{
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4, "uri": "data:application/octet-stream;base64,AAAAAA=="}]
        }"#;
        let err = parse_gltf("inline.gltf", json).await.unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { .. }));
    }
}
