//! Scene graph and hierarchical scene organization.
//!
//! A model file is turned into a tree of [`SceneNode`]s: [`ContainerNode`]s
//! group children and carry a transform, [`MeshNode`]s additionally own
//! geometry and a material. Nodes are plain CPU data until the first
//! [`SceneNode::write_to_buffers`] call creates their GPU resources, which is
//! what allows the loader to run without a device and the material binder to
//! rewrite materials before anything reaches the GPU.
//!
//! [`Scene`] is the store the renderer draws from. Models only enter it
//! through [`Scene::attach`], fully built. It draws in two sweeps: every
//! holdout mesh first, so their depth masks whatever is behind them no matter
//! where they sit in the tree, then every shaded mesh.

use std::{fmt::Debug, sync::Arc};

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::Instance,
        material::Material,
        model::{DrawMesh, GpuMesh, MeshData},
    },
    pipelines::basic::BasePipelines,
};

/// Which meshes a draw call covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawPhase {
    /// Depth-only meshes.
    Holdout,
    Shaded,
}

impl DrawPhase {
    pub const ORDER: [DrawPhase; 2] = [DrawPhase::Holdout, DrawPhase::Shaded];

    pub fn includes(self, material: &Material) -> bool {
        match self {
            DrawPhase::Holdout => material.is_holdout(),
            DrawPhase::Shaded => !material.is_holdout(),
        }
    }
}

pub trait SceneNode: Send {
    fn name(&self) -> Option<&str>;

    fn get_local_transform(&self) -> Instance;

    fn set_local_transform(&mut self, instance: Instance);

    fn get_world_transform(&self) -> Instance;

    /// Recompute the world transform of `self` and all descendants.
    fn update_world_transforms(&mut self, parent: &Instance);

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    fn add_child(&mut self, child: Box<dyn SceneNode>);

    fn as_mesh(&self) -> Option<&MeshNode> {
        None
    }

    fn as_mesh_mut(&mut self) -> Option<&mut MeshNode> {
        None
    }

    /// Create missing GPU resources and upload the current world transforms.
    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    );

    /// Record the meshes of `phase` in this subtree.
    fn draw(
        &self,
        phase: DrawPhase,
        pipelines: &BasePipelines,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        render_pass: &mut wgpu::RenderPass<'_>,
    );
}

impl Debug for dyn SceneNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name())
            .field("children", self.get_children())
            .finish()
    }
}

/// Depth-first search for the first node called `name`, starting with `node` itself.
pub fn find_by_name<'a>(node: &'a dyn SceneNode, name: &str) -> Option<&'a dyn SceneNode> {
    if node.name() == Some(name) {
        return Some(node);
    }
    node.get_children()
        .iter()
        .find_map(|child| find_by_name(child.as_ref(), name))
}

pub fn find_by_name_mut<'a>(
    node: &'a mut dyn SceneNode,
    name: &str,
) -> Option<&'a mut dyn SceneNode> {
    if node.name() == Some(name) {
        return Some(node);
    }
    node.get_children_mut()
        .iter_mut()
        .find_map(|child| find_by_name_mut(child.as_mut(), name))
}

/// Visit `node` and all of its descendants, parents first.
pub fn walk<'a>(node: &'a dyn SceneNode, visit: &mut dyn FnMut(&'a dyn SceneNode)) {
    visit(node);
    for child in node.get_children() {
        walk(child.as_ref(), visit);
    }
}

#[derive(Debug, Default)]
pub struct ContainerNode {
    name: Option<String>,
    local: Instance,
    world: Instance,
    pub children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }
}

impl SceneNode for ContainerNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn get_local_transform(&self) -> Instance {
        self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) {
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(device, queue, material_layout));
    }

    fn draw(
        &self,
        phase: DrawPhase,
        pipelines: &BasePipelines,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) {
        for child in &self.children {
            child.draw(phase, pipelines, camera_bind_group, light_bind_group, render_pass);
        }
    }
}

#[derive(Debug)]
struct MeshResources {
    mesh: GpuMesh,
    instance_buffer: wgpu::Buffer,
    material_bind_group: wgpu::BindGroup,
}

/// A drawable submesh: geometry plus the material it is shaded with.
#[derive(Debug)]
pub struct MeshNode {
    name: Option<String>,
    local: Instance,
    world: Instance,
    children: Vec<Box<dyn SceneNode>>,
    data: MeshData,
    material: Arc<Material>,
    gpu: Option<MeshResources>,
}

impl MeshNode {
    pub fn new(name: Option<String>, data: MeshData, material: Arc<Material>) -> Self {
        Self {
            name,
            local: Instance::default(),
            world: Instance::default(),
            children: Vec::new(),
            data,
            material,
            gpu: None,
        }
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Swap the material. GPU resources are rebuilt on the next upload.
    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
        self.gpu = None;
    }
}

impl SceneNode for MeshNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn get_local_transform(&self) -> Instance {
        self.local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        self.world = parent * &self.local;
        let world = self.world;
        for child in self.children.iter_mut() {
            child.update_world_transforms(&world);
        }
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    fn as_mesh(&self) -> Option<&MeshNode> {
        Some(self)
    }

    fn as_mesh_mut(&mut self) -> Option<&mut MeshNode> {
        Some(self)
    }

    fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) {
        let raw = self.world.to_raw();
        match &self.gpu {
            Some(gpu) => queue.write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(&[raw])),
            None => {
                let label = self.name.as_deref().unwrap_or("unnamed mesh");
                let instance_buffer =
                    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(&format!("{label} Instance Buffer")),
                        contents: bytemuck::cast_slice(&[raw]),
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    });
                self.gpu = Some(MeshResources {
                    mesh: self.data.upload(device, label),
                    instance_buffer,
                    material_bind_group: self.material.create_bind_group(
                        device,
                        queue,
                        material_layout,
                    ),
                });
            }
        }
        self.children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(device, queue, material_layout));
    }

    fn draw(
        &self,
        phase: DrawPhase,
        pipelines: &BasePipelines,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) {
        match &self.gpu {
            _ if !phase.includes(&self.material) => {}
            Some(gpu) => {
                render_pass.set_pipeline(pipelines.for_material(&self.material));
                render_pass.draw_mesh(
                    &gpu.mesh,
                    &gpu.instance_buffer,
                    &gpu.material_bind_group,
                    camera_bind_group,
                    light_bind_group,
                );
            }
            None => log::warn!(
                "mesh {:?} was drawn before its buffers were written",
                self.name
            ),
        }
        for child in &self.children {
            child.draw(phase, pipelines, camera_bind_group, light_bind_group, render_pass);
        }
    }
}

/// The scene graph store: every model the renderer draws.
#[derive(Debug, Default)]
pub struct Scene {
    models: Vec<Box<dyn SceneNode>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished model to the scene. The node is drawn from the next frame on.
    pub fn attach(&mut self, model: Box<dyn SceneNode>) {
        let mut meshes = 0;
        walk(model.as_ref(), &mut |node| {
            if node.as_mesh().is_some() {
                meshes += 1;
            }
        });
        log::info!(
            "attaching model {:?} with {} meshes to the scene",
            model.name(),
            meshes
        );
        self.models.push(model);
    }

    pub fn models(&self) -> &[Box<dyn SceneNode>] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&dyn SceneNode> {
        self.models
            .iter()
            .find_map(|model| find_by_name(model.as_ref(), name))
    }

    /// Propagate transforms and sync every model with the GPU.
    pub fn write_to_buffers(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: &wgpu::BindGroupLayout,
    ) {
        let root = Instance::new();
        for model in self.models.iter_mut() {
            model.update_world_transforms(&root);
            model.write_to_buffers(device, queue, material_layout);
        }
    }

    /// Record every holdout mesh of every model, then every shaded one.
    pub fn draw(
        &self,
        pipelines: &BasePipelines,
        camera_bind_group: &wgpu::BindGroup,
        light_bind_group: &wgpu::BindGroup,
        render_pass: &mut wgpu::RenderPass<'_>,
    ) {
        for phase in DrawPhase::ORDER {
            for model in &self.models {
                model.draw(
                    phase,
                    pipelines,
                    camera_bind_group,
                    light_bind_group,
                    render_pass,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Vector3;

    use super::*;

    fn mesh(name: &str) -> Box<dyn SceneNode> {
        Box::new(MeshNode::new(
            Some(name.to_string()),
            MeshData::default(),
            Arc::new(Material::default()),
        ))
    }

    fn tree() -> Box<dyn SceneNode> {
        let mut root = ContainerNode::new(Some("root".to_string()));
        let mut group = ContainerNode::new(Some("group".to_string()));
        group.set_local_transform(Instance::from(Vector3::new(0.0, 2.0, 0.0)));
        group.add_child(mesh("a"));
        group.add_child(mesh("b"));
        root.add_child(Box::new(group));
        root.add_child(mesh("c"));
        root.set_local_transform(Instance::from(Vector3::new(1.0, 0.0, 0.0)));
        Box::new(root)
    }

    #[test]
    fn world_transforms_follow_the_parents() {
        let mut root = tree();
        root.update_world_transforms(&Instance::new());
        let a = find_by_name(root.as_ref(), "a").map(|node| node.get_world_transform());
        assert_eq!(
            a.map(|instance| instance.position),
            Some(Vector3::new(1.0, 2.0, 0.0))
        );
        let c = find_by_name(root.as_ref(), "c").map(|node| node.get_world_transform());
        assert_eq!(
            c.map(|instance| instance.position),
            Some(Vector3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn name_lookup_includes_the_root_and_descends() {
        let mut root = tree();
        assert_eq!(
            find_by_name(root.as_ref(), "root").and_then(|n| n.name()),
            Some("root")
        );
        assert!(find_by_name(root.as_ref(), "b").is_some());
        assert!(find_by_name(root.as_ref(), "missing").is_none());
        let group = find_by_name_mut(root.as_mut(), "group");
        assert_eq!(group.map(|g| g.get_children().len()), Some(2));
    }

    #[test]
    fn walk_visits_parents_first() {
        let root = tree();
        let mut names = Vec::new();
        walk(root.as_ref(), &mut |node| names.push(node.name().map(str::to_string)));
        let names: Vec<_> = names.into_iter().flatten().collect();
        assert_eq!(names, ["root", "group", "a", "b", "c"]);
    }

    #[test]
    fn holdouts_are_drawn_before_shaded_meshes() {
        assert_eq!(DrawPhase::ORDER, [DrawPhase::Holdout, DrawPhase::Shaded]);
        let holdout = Material::holdout();
        assert!(DrawPhase::Holdout.includes(&holdout));
        assert!(!DrawPhase::Shaded.includes(&holdout));
        let glow = Material::blue_glow();
        assert!(DrawPhase::Shaded.includes(&glow));
        assert!(!DrawPhase::Holdout.includes(&glow));
    }

    #[test]
    fn attached_models_are_searchable() {
        let mut scene = Scene::new();
        assert!(scene.is_empty());
        scene.attach(tree());
        assert_eq!(scene.models().len(), 1);
        assert!(scene.find_by_name("a").and_then(|n| n.as_mesh()).is_some());
        assert!(scene.find_by_name("group").and_then(|n| n.as_mesh()).is_none());
    }
}
