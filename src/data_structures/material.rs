//! Shading descriptors.
//!
//! A [`Material`] is immutable once created and shared through `Arc`, so the
//! two built-in materials exist exactly once per process: the holdout material
//! that only writes depth and the flat blue glow material.

use std::sync::{Arc, LazyLock};

use wgpu::util::DeviceExt;

use crate::{config::hex_to_linear, data_structures::texture::Texture};

/// sRGB colour of the glow material.
pub const GLOW_COLOR: u32 = 0x007fff;

static HOLDOUT: LazyLock<Arc<Material>> = LazyLock::new(|| {
    Arc::new(Material {
        name: "holdout".to_string(),
        color_write: false,
        unlit: true,
        ..Material::default()
    })
});

static BLUE_GLOW: LazyLock<Arc<Material>> = LazyLock::new(|| {
    let [r, g, b] = hex_to_linear(GLOW_COLOR);
    Arc::new(Material {
        name: "blue glow".to_string(),
        base_color: [r, g, b, 1.0],
        unlit: true,
        ..Material::default()
    })
});

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    /// Linear RGBA, multiplied with the texture if there is one.
    pub base_color: [f32; 4],
    /// Linear RGB added after lighting.
    pub emissive: [f32; 3],
    pub texture: Option<Arc<image::RgbaImage>>,
    /// `false` keeps the colour buffer untouched while still writing depth.
    pub color_write: bool,
    /// Unlit materials ignore the scene lights.
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [1.0; 4],
            emissive: [0.0; 3],
            texture: None,
            color_write: true,
            unlit: false,
        }
    }
}

impl Material {
    /// The shared material that masks geometry without adding colour.
    pub fn holdout() -> Arc<Material> {
        HOLDOUT.clone()
    }

    /// The shared flat blue material that feeds the bloom.
    pub fn blue_glow() -> Arc<Material> {
        BLUE_GLOW.clone()
    }

    pub fn is_holdout(&self) -> bool {
        !self.color_write
    }

    pub fn to_uniform(&self) -> MaterialUniform {
        MaterialUniform {
            base_color: self.base_color,
            emissive: self.emissive,
            unlit: self.unlit as u32,
        }
    }

    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
    ) -> wgpu::BindGroup {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Material Buffer", self.name)),
            contents: bytemuck::cast_slice(&[self.to_uniform()]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let texture = match &self.texture {
            Some(image) => Texture::from_image(device, queue, image, Some(&self.name)),
            None => Texture::create_white(device, queue),
        };
        let sampler = texture
            .sampler
            .clone()
            .unwrap_or_else(|| crate::data_structures::texture::create_default_sampler(device));
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some(&format!("{} Material Bind Group", self.name)),
        })
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 3],
    unlit: u32,
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_materials_are_shared() {
        assert!(Arc::ptr_eq(&Material::holdout(), &Material::holdout()));
        assert!(Arc::ptr_eq(&Material::blue_glow(), &Material::blue_glow()));
        assert!(!Arc::ptr_eq(&Material::holdout(), &Material::blue_glow()));
    }

    #[test]
    fn holdout_writes_no_colour() {
        assert!(Material::holdout().is_holdout());
        assert!(!Material::blue_glow().is_holdout());
        assert!(!Material::default().is_holdout());
    }

    #[test]
    fn glow_is_flat_blue() {
        let glow = Material::blue_glow();
        assert!(glow.unlit);
        let [r, g, b, a] = glow.base_color;
        assert_eq!(r, 0.0);
        assert!(g > 0.2 && g < 0.22);
        assert!((b - 1.0).abs() < 1e-6);
        assert_eq!(a, 1.0);
    }
}
