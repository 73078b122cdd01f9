//! Name based material rebinding.
//!
//! Submeshes of the glow group are recognised by the suffix the loader appends
//! to the group name: `<group>_1` is masked out with the holdout material,
//! `<group>_2` is painted with the blue glow material. Everything else keeps
//! the material it was loaded with.

use std::sync::Arc;

use crate::data_structures::{
    material::Material,
    scene_graph::{SceneNode, find_by_name_mut},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialRole {
    Holdout,
    Glow,
    Keep,
}

impl MaterialRole {
    pub fn for_mesh(group: &str, name: &str) -> Self {
        match name.strip_prefix(group) {
            Some("_1") => Self::Holdout,
            Some("_2") => Self::Glow,
            _ => Self::Keep,
        }
    }

    pub fn material(self) -> Option<Arc<Material>> {
        match self {
            Self::Holdout => Some(Material::holdout()),
            Self::Glow => Some(Material::blue_glow()),
            Self::Keep => None,
        }
    }
}

/// Rebind the direct mesh children of the node called `group`.
///
/// Returns the number of meshes whose material was replaced. A model without
/// the group is left as it is.
pub fn bind_materials(root: &mut dyn SceneNode, group: &str) -> usize {
    let Some(group_node) = find_by_name_mut(root, group) else {
        log::debug!("no group named {group}, keeping the loaded materials");
        return 0;
    };
    let mut rebound = 0;
    for child in group_node.get_children_mut() {
        let Some(mesh) = child.as_mesh_mut() else {
            continue;
        };
        let role = mesh
            .name()
            .map_or(MaterialRole::Keep, |name| MaterialRole::for_mesh(group, name));
        if let Some(material) = role.material() {
            log::debug!("binding {:?} material to {:?}", role, mesh.name());
            mesh.set_material(material);
            rebound += 1;
        }
    }
    log::info!("rebound {rebound} meshes in group {group}");
    rebound
}

#[cfg(test)]
mod tests {
    use crate::data_structures::{
        model::MeshData,
        scene_graph::{ContainerNode, MeshNode, find_by_name},
    };

    use super::*;

    fn mesh(name: &str, material: &Arc<Material>) -> Box<dyn SceneNode> {
        Box::new(MeshNode::new(
            Some(name.to_string()),
            MeshData::default(),
            material.clone(),
        ))
    }

    fn material_of<'a>(root: &'a dyn SceneNode, name: &str) -> Option<&'a Arc<Material>> {
        find_by_name(root, name)
            .and_then(|node| node.as_mesh())
            .map(|mesh| mesh.material())
    }

    #[test]
    fn suffixes_map_to_roles() {
        let role = |name| MaterialRole::for_mesh("Suzanne", name);
        assert_eq!(role("Suzanne_1"), MaterialRole::Holdout);
        assert_eq!(role("Suzanne_2"), MaterialRole::Glow);
        assert_eq!(role("Suzanne"), MaterialRole::Keep);
        assert_eq!(role("Suzanne_12"), MaterialRole::Keep);
        assert_eq!(role("Suzanne_3"), MaterialRole::Keep);
        assert_eq!(role("Cube_1"), MaterialRole::Keep);
        assert!(MaterialRole::Keep.material().is_none());
    }

    #[test]
    fn group_children_are_rebound() {
        let stock = Arc::new(Material::default());
        let mut group = ContainerNode::new(Some("Suzanne".to_string()));
        group.add_child(mesh("Suzanne", &stock));
        group.add_child(mesh("Suzanne_1", &stock));
        group.add_child(mesh("Suzanne_2", &stock));
        let mut root = ContainerNode::new(Some("Scene".to_string()));
        root.add_child(Box::new(group));
        root.add_child(mesh("Floor_1", &stock));

        assert_eq!(bind_materials(&mut root, "Suzanne"), 2);

        let holdout = material_of(&root, "Suzanne_1").unwrap();
        assert!(Arc::ptr_eq(holdout, &Material::holdout()));
        assert!(!holdout.color_write);
        let glow = material_of(&root, "Suzanne_2").unwrap();
        assert!(Arc::ptr_eq(glow, &Material::blue_glow()));
        assert!(Arc::ptr_eq(material_of(&root, "Suzanne").unwrap(), &stock));
        // meshes outside the group keep their material
        assert!(Arc::ptr_eq(material_of(&root, "Floor_1").unwrap(), &stock));
    }

    #[test]
    fn missing_group_is_a_no_op() {
        let stock = Arc::new(Material::default());
        let mut root = ContainerNode::new(Some("Scene".to_string()));
        root.add_child(mesh("Cube_1", &stock));
        assert_eq!(bind_materials(&mut root, "Suzanne"), 0);
        assert!(Arc::ptr_eq(material_of(&root, "Cube_1").unwrap(), &stock));
    }

    #[test]
    fn the_root_itself_can_be_the_group() {
        let stock = Arc::new(Material::default());
        let mut root = ContainerNode::new(Some("Suzanne".to_string()));
        root.add_child(mesh("Suzanne_2", &stock));
        assert_eq!(bind_materials(&mut root, "Suzanne"), 1);
    }
}
