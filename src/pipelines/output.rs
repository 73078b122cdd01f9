//! Output pass: exposure, AgX tone mapping and colour space conversion.
//!
//! Reads the HDR scene buffer and writes the display-ready image. Surfaces
//! with an sRGB format encode in hardware; for every other format the shader
//! applies the sRGB transfer function itself.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::texture::create_clamped_sampler,
    pipelines::basic::{
        fullscreen_pass, fullscreen_shader, mk_fullscreen_pipeline, sampler_entry, texture_entry,
        uniform_entry,
    },
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutputUniform {
    exposure: f32,
    encode_srgb: u32,
    _padding: [f32; 2],
}

impl OutputUniform {
    pub fn new(exposure: f32, target_format: wgpu::TextureFormat) -> Self {
        Self {
            exposure,
            encode_srgb: needs_srgb_encoding(target_format) as u32,
            _padding: [0.0; 2],
        }
    }
}

/// Whether the shader has to encode sRGB itself for `format`.
pub fn needs_srgb_encoding(format: wgpu::TextureFormat) -> bool {
    !format.is_srgb()
}

#[derive(Debug)]
pub struct OutputPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl OutputPass {
    pub fn new(
        device: &wgpu::Device,
        scene: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
        exposure: f32,
    ) -> Self {
        let uniform = OutputUniform::new(exposure, target_format);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Output Params Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let sampler = create_clamped_sampler(device);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Output Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let pipeline = mk_fullscreen_pipeline(
            device,
            "Output Pipeline",
            &[&layout],
            target_format,
            None,
            fullscreen_shader("Output Shader", include_str!("output.wgsl")),
        );
        let bind_group = mk_bind_group(device, &layout, scene, &sampler, &buffer);

        Self {
            pipeline,
            layout,
            bind_group,
            buffer,
            sampler,
        }
    }

    /// Rebind the HDR input after it was reallocated.
    pub fn resize(&mut self, device: &wgpu::Device, scene: &wgpu::TextureView) {
        self.bind_group = mk_bind_group(device, &self.layout, scene, &self.sampler, &self.buffer);
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        fullscreen_pass(
            encoder,
            "Output",
            target,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            &self.pipeline,
            &self.bind_group,
        );
    }
}

fn mk_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    scene: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Output Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(scene),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: buffer.as_entire_binding(),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_surfaces_encode_in_hardware() {
        assert!(!needs_srgb_encoding(wgpu::TextureFormat::Bgra8UnormSrgb));
        assert!(!needs_srgb_encoding(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert!(needs_srgb_encoding(wgpu::TextureFormat::Bgra8Unorm));
        assert!(needs_srgb_encoding(wgpu::TextureFormat::Rgba8Unorm));
    }

    #[test]
    fn uniform_carries_the_exposure() {
        let uniform = OutputUniform::new(5.0, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(uniform.exposure, 5.0);
        assert_eq!(uniform.encode_srgb, 1);
        assert_eq!(std::mem::size_of::<OutputUniform>(), 16);
    }
}
