//! Render composition.
//!
//! A frame always runs through the same chain of passes, listed in
//! [`PASS_ORDER`]:
//!
//! - [`PassKind::Base`] draws the scene into the HDR buffer, clearing colour
//!   and depth first. Holdout meshes are drawn first and only write depth.
//! - [`PassKind::Bloom`] extracts the bright parts of the HDR buffer, blurs them
//!   over several levels and adds the glow back onto the HDR buffer.
//! - [`PassKind::Output`] applies exposure and AgX tone mapping and writes the
//!   result to the frame target.
//!
//! [`Composer`] owns every intermediate target and reallocates them on resize.

use crate::{
    config::BloomParams,
    data_structures::{scene_graph::Scene, texture::Texture},
    pipelines::{basic::BasePipelines, bloom::BloomPass, output::OutputPass},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    Base,
    Bloom,
    Output,
}

impl PassKind {
    pub fn label(self) -> &'static str {
        match self {
            PassKind::Base => "Base Pass",
            PassKind::Bloom => "Bloom Pass",
            PassKind::Output => "Output Pass",
        }
    }
}

pub const PASS_ORDER: [PassKind; 3] = [PassKind::Base, PassKind::Bloom, PassKind::Output];

/// Per-frame inputs of the base pass.
pub struct FrameInputs<'a> {
    pub scene: &'a Scene,
    pub camera_bind_group: &'a wgpu::BindGroup,
    pub light_bind_group: &'a wgpu::BindGroup,
    pub clear_colour: wgpu::Color,
}

#[derive(Debug)]
pub struct Composer {
    hdr: Texture,
    depth: Texture,
    base: BasePipelines,
    bloom: BloomPass,
    output: OutputPass,
    size: [u32; 2],
}

impl Composer {
    pub fn new(
        device: &wgpu::Device,
        size: [u32; 2],
        target_format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light_bind_group_layout: &wgpu::BindGroupLayout,
        params: &BloomParams,
    ) -> Self {
        let size = [size[0].max(1), size[1].max(1)];
        let hdr = Texture::create_render_target(device, size, Texture::HDR_FORMAT, "HDR Buffer");
        let depth = Texture::create_depth_texture(device, size, "depth_texture");
        let base = BasePipelines::new(device, camera_bind_group_layout, light_bind_group_layout);
        let bloom = BloomPass::new(device, size, &hdr.view, params);
        let output = OutputPass::new(device, &hdr.view, target_format, params.exposure);
        log::debug!("composer ready at {}x{} for {:?}", size[0], size[1], target_format);

        Self {
            hdr,
            depth,
            base,
            bloom,
            output,
            size,
        }
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn material_layout(&self) -> &wgpu::BindGroupLayout {
        &self.base.material_layout
    }

    pub fn bloom(&self) -> &BloomPass {
        &self.bloom
    }

    /// Reallocate the HDR, depth and bloom targets. Zero sizes are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, size: [u32; 2]) {
        if size[0] == 0 || size[1] == 0 || size == self.size {
            return;
        }
        self.size = size;
        self.hdr = Texture::create_render_target(device, size, Texture::HDR_FORMAT, "HDR Buffer");
        self.depth = Texture::create_depth_texture(device, size, "depth_texture");
        self.bloom.resize(device, size, &self.hdr.view);
        self.output.resize(device, &self.hdr.view);
    }

    /// Record every pass of one frame, ending in `target`.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameInputs<'_>,
        target: &wgpu::TextureView,
    ) {
        for pass in PASS_ORDER {
            match pass {
                PassKind::Base => self.base_pass(encoder, frame),
                PassKind::Bloom => self.bloom.render(encoder, &self.hdr.view),
                PassKind::Output => self.output.render(encoder, target),
            }
        }
    }

    fn base_pass(&self, encoder: &mut wgpu::CommandEncoder, frame: &FrameInputs<'_>) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(PassKind::Base.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.hdr.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(frame.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        frame.scene.draw(
            &self.base,
            frame.camera_bind_group,
            frame.light_bind_group,
            &mut render_pass,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_run_base_then_bloom_then_output() {
        assert_eq!(
            PASS_ORDER,
            [PassKind::Base, PassKind::Bloom, PassKind::Output]
        );
    }

    #[test]
    fn every_pass_has_its_own_label() {
        let labels: Vec<_> = PASS_ORDER.iter().map(|pass| pass.label()).collect();
        assert_eq!(labels, ["Base Pass", "Bloom Pass", "Output Pass"]);
    }
}
