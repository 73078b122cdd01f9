#[cfg(feature = "integration-tests")]
use std::sync::Arc;

#[cfg(feature = "integration-tests")]
use flow_glow::{
    config::{BloomParams, CameraConfig, ViewerConfig},
    context::Context,
    data_structures::{
        instance::Instance,
        material::Material,
        model::{MeshData, ModelVertex},
        scene_graph::{ContainerNode, MeshNode, Scene, SceneNode},
    },
    resources::{binder::bind_materials, parse_gltf},
};

#[cfg(feature = "integration-tests")]
use crate::common::{
    glb::{TRIANGLE, model_glb},
    test_utils::render_to_image,
};

mod common;

#[cfg(feature = "integration-tests")]
async fn suzanne_scene() -> Scene {
    let mut model = parse_gltf("monkey.glb", &model_glb("Suzanne", 2))
        .await
        .unwrap();
    bind_materials(model.as_mut(), "Suzanne");
    let mut scene = Scene::new();
    scene.attach(model);
    scene
}

/// Camera on +Z looking at the origin, so `TRIANGLE` covers the image centre.
#[cfg(feature = "integration-tests")]
fn facing_config() -> ViewerConfig {
    ViewerConfig::default().with_camera(CameraConfig {
        position: [0.0, 0.0, 5.0],
        ..CameraConfig::default()
    })
}

#[cfg(feature = "integration-tests")]
fn triangle(name: &str, z: f32, material: Arc<Material>) -> Box<dyn SceneNode> {
    let vertices = TRIANGLE
        .iter()
        .map(|&position| ModelVertex {
            position,
            tex_coords: [0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
        })
        .collect();
    let mut mesh = MeshNode::new(
        Some(name.to_string()),
        MeshData::new(vertices, vec![0, 1, 2]),
        material,
    );
    mesh.set_local_transform(Instance::from(cgmath::Vector3::new(0.0, 0.0, z)));
    Box::new(mesh)
}

#[cfg(feature = "integration-tests")]
fn scene_of(meshes: Vec<Box<dyn SceneNode>>) -> Scene {
    let mut root = ContainerNode::new(Some("root".to_string()));
    for mesh in meshes {
        root.add_child(mesh);
    }
    let mut scene = Scene::new();
    scene.attach(Box::new(root));
    scene
}

#[cfg(feature = "integration-tests")]
async fn render_glow(strength: f32) -> image::RgbaImage {
    let config = facing_config().with_bloom(BloomParams {
        strength,
        ..BloomParams::default()
    });
    let mut ctx = Context::headless(64, 64, &config).await.unwrap();
    ctx.update();
    let mut scene = scene_of(vec![triangle("glow", 0.0, Material::blue_glow())]);
    render_to_image(&ctx, &mut scene)
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn empty_scene_renders_the_clear_colour() {
    let ctx = Context::headless(64, 48, &ViewerConfig::default())
        .await
        .unwrap();
    let mut scene = Scene::new();

    let image = render_to_image(&ctx, &mut scene);

    assert_eq!(image.dimensions(), (64, 48));
    for pixel in image.pixels() {
        assert_eq!(pixel.0[..3], [0, 0, 0]);
    }
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn rendering_is_idempotent() {
    let mut ctx = Context::headless(96, 64, &ViewerConfig::default())
        .await
        .unwrap();
    ctx.update();
    let mut scene = suzanne_scene().await;

    let first = render_to_image(&ctx, &mut scene);
    let second = render_to_image(&ctx, &mut scene);

    assert_eq!(first.dimensions(), second.dimensions());
    for (x, y, pixel) in first.enumerate_pixels() {
        assert_eq!(pixel, second.get_pixel(x, y), "pixel mismatch at ({}, {})", x, y);
    }
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn holdout_masks_what_is_behind_it_in_any_draw_order() {
    let mut ctx = Context::headless(64, 64, &facing_config()).await.unwrap();
    ctx.update();

    let mut unmasked = scene_of(vec![triangle("lit", 0.0, Arc::new(Material::default()))]);
    let image = render_to_image(&ctx, &mut unmasked);
    assert_ne!(image.get_pixel(32, 32).0[..3], [0, 0, 0]);

    for holdout_first in [true, false] {
        let lit = triangle("lit", 0.0, Arc::new(Material::default()));
        let mask = triangle("mask", 1.0, Material::holdout());
        let meshes = match holdout_first {
            true => vec![mask, lit],
            false => vec![lit, mask],
        };
        let mut scene = scene_of(meshes);

        let image = render_to_image(&ctx, &mut scene);
        assert_eq!(
            image.get_pixel(32, 32).0[..3],
            [0, 0, 0],
            "holdout drawn first: {holdout_first}"
        );
    }
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn bloom_spreads_the_glow_past_the_mesh_edge() {
    let plain = render_glow(0.0).await;
    let bloomed = render_glow(0.8).await;

    // the triangle's bottom edge sits at row 49.6
    let below_edge = (32, 52);
    assert_eq!(plain.get_pixel(below_edge.0, below_edge.1).0[..3], [0, 0, 0]);
    let glow = bloomed.get_pixel(below_edge.0, below_edge.1).0;
    assert!(glow[2] > 0, "no bloom below the edge: {glow:?}");

    let centre_plain = plain.get_pixel(32, 32).0;
    let centre_bloomed = bloomed.get_pixel(32, 32).0;
    assert!(centre_plain[2] > 0);
    assert!(centre_bloomed[2] >= centre_plain[2]);
}

#[tokio::test]
#[cfg(feature = "integration-tests")]
async fn resize_updates_aspect_and_output_size() {
    let mut ctx = Context::headless(64, 64, &ViewerConfig::default())
        .await
        .unwrap();
    let mut scene = suzanne_scene().await;

    for (width, height) in [(128u32, 32u32), (17, 91), (200, 120)] {
        assert!(ctx.resize(width, height));
        assert!((ctx.projection.aspect() - width as f32 / height as f32).abs() < 1e-6);
        assert_eq!(ctx.composer.size(), [width, height]);
        assert_eq!(
            ctx.composer.bloom().level_size(0),
            Some([width.div_ceil(2), height.div_ceil(2)])
        );

        let image = render_to_image(&ctx, &mut scene);
        assert_eq!(image.dimensions(), (width, height));
    }

    assert!(!ctx.resize(0, 50));
    assert!(!ctx.resize(50, 0));
    assert_eq!(ctx.size(), [200, 120]);
    assert_eq!(ctx.composer.size(), [200, 120]);
}
