//! Bloom post-processing pass.
//!
//! Pipeline: luminosity high-pass into a half resolution target, then five
//! levels of separable Gaussian blur where every level reads the previous one
//! at half the size, then a weighted composite of all levels which is finally
//! added onto the HDR scene buffer.

use wgpu::util::DeviceExt;

use crate::{
    config::BloomParams,
    data_structures::texture::{Texture, create_clamped_sampler},
    pipelines::basic::{
        fullscreen_pass, fullscreen_shader, mk_fullscreen_pipeline, sampler_entry, texture_entry,
        uniform_entry,
    },
};

/// Number of blur levels in the bloom chain
pub const MIP_LEVELS: usize = 5;
/// Gaussian kernel radius per level, also used as its sigma
pub const KERNEL_RADII: [u32; MIP_LEVELS] = [3, 5, 7, 9, 11];
/// Base weight of every level before the radius is applied
pub const BLOOM_FACTORS: [f32; MIP_LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];
/// Width of the soft edge above the luminosity threshold
pub const SMOOTH_WIDTH: f32 = 0.01;

const MAX_KERNEL: usize = 12;

/// Normalized Gaussian coefficients for offsets `0..radius`, with `sigma = radius`.
pub fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let sigma = radius as f32;
    (0..radius)
        .map(|i| {
            let x = i as f32;
            0.39894 * (-0.5 * x * x / (sigma * sigma)).exp() / sigma
        })
        .collect()
}

/// Per-level composite weights: each factor lerped towards `1.2 - factor` by
/// `radius`, times `strength`.
pub fn bloom_weights(strength: f32, radius: f32) -> [f32; MIP_LEVELS] {
    BLOOM_FACTORS.map(|factor| strength * (factor + (1.2 - 2.0 * factor) * radius))
}

/// Size of every blur level for a given output size. The first level is half
/// the output, each further level half the previous one, rounded half up and
/// never below one pixel.
pub fn level_sizes(size: [u32; 2]) -> [[u32; 2]; MIP_LEVELS] {
    let mut sizes = [[1, 1]; MIP_LEVELS];
    let [mut width, mut height] = size;
    for level in sizes.iter_mut() {
        width = width.div_ceil(2).max(1);
        height = height.div_ceil(2).max(1);
        *level = [width, height];
    }
    sizes
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct ThresholdUniform {
    threshold: f32,
    smooth_width: f32,
    _padding: [f32; 2],
}

/// Blur direction params, must match WGSL struct
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniform {
    inv_size: [f32; 2],
    direction: [f32; 2],
    coefficients: [[f32; 4]; 3],
    kernel_radius: u32,
    _padding: [u32; 3],
}

impl BlurUniform {
    fn new(size: [u32; 2], direction: [f32; 2], radius: u32) -> Self {
        let mut packed = [0.0; MAX_KERNEL];
        for (slot, coefficient) in packed.iter_mut().zip(gaussian_kernel(radius)) {
            *slot = coefficient;
        }
        let mut coefficients = [[0.0; 4]; 3];
        for (row, chunk) in coefficients.iter_mut().zip(packed.chunks(4)) {
            row.copy_from_slice(chunk);
        }
        Self {
            inv_size: [1.0 / size[0] as f32, 1.0 / size[1] as f32],
            direction,
            coefficients,
            kernel_radius: radius.min(MAX_KERNEL as u32),
            _padding: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniform {
    weights: [[f32; 4]; 2],
}

impl From<&BloomParams> for CompositeUniform {
    fn from(params: &BloomParams) -> Self {
        let [w0, w1, w2, w3, w4] = bloom_weights(params.strength, params.radius);
        Self {
            weights: [[w0, w1, w2, w3], [w4, 0.0, 0.0, 0.0]],
        }
    }
}

impl From<&BloomParams> for ThresholdUniform {
    fn from(params: &BloomParams) -> Self {
        Self {
            threshold: params.threshold,
            smooth_width: SMOOTH_WIDTH,
            _padding: [0.0; 2],
        }
    }
}

/// Size dependent resources, rebuilt on every resize.
#[derive(Debug)]
struct BloomTargets {
    bright: Texture,
    horizontal: Vec<Texture>,
    vertical: Vec<Texture>,
    composite: Texture,
    threshold_bind_group: wgpu::BindGroup,
    // [level][0 = horizontal, 1 = vertical]
    blur_bind_groups: Vec<[wgpu::BindGroup; 2]>,
    composite_bind_group: wgpu::BindGroup,
    blend_bind_group: wgpu::BindGroup,
}

#[derive(Debug)]
pub struct BloomPass {
    threshold_pipeline: wgpu::RenderPipeline,
    threshold_layout: wgpu::BindGroupLayout,
    threshold_buffer: wgpu::Buffer,

    blur_pipeline: wgpu::RenderPipeline,
    blur_layout: wgpu::BindGroupLayout,

    composite_pipeline: wgpu::RenderPipeline,
    composite_layout: wgpu::BindGroupLayout,
    composite_buffer: wgpu::Buffer,

    blend_pipeline: wgpu::RenderPipeline,
    blend_layout: wgpu::BindGroupLayout,

    sampler: wgpu::Sampler,
    targets: BloomTargets,
    size: [u32; 2],
}

impl BloomPass {
    /// `scene` is the HDR buffer the bloom reads from and adds onto.
    pub fn new(
        device: &wgpu::Device,
        size: [u32; 2],
        scene: &wgpu::TextureView,
        params: &BloomParams,
    ) -> Self {
        let sampler = create_clamped_sampler(device);

        let threshold_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bloom Threshold Buffer"),
            contents: bytemuck::cast_slice(&[ThresholdUniform::from(params)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let composite_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bloom Composite Buffer"),
            contents: bytemuck::cast_slice(&[CompositeUniform::from(params)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let threshold_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Threshold Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Blur Layout"),
            entries: &[texture_entry(0), sampler_entry(1), uniform_entry(2)],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Composite Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                sampler_entry(5),
                uniform_entry(6),
            ],
        });
        let blend_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Blend Layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let threshold_pipeline = mk_fullscreen_pipeline(
            device,
            "Bloom Threshold Pipeline",
            &[&threshold_layout],
            Texture::HDR_FORMAT,
            None,
            fullscreen_shader("Bloom Threshold Shader", include_str!("bloom_threshold.wgsl")),
        );
        let blur_pipeline = mk_fullscreen_pipeline(
            device,
            "Bloom Blur Pipeline",
            &[&blur_layout],
            Texture::HDR_FORMAT,
            None,
            fullscreen_shader("Bloom Blur Shader", include_str!("bloom_blur.wgsl")),
        );
        let composite_pipeline = mk_fullscreen_pipeline(
            device,
            "Bloom Composite Pipeline",
            &[&composite_layout],
            Texture::HDR_FORMAT,
            None,
            fullscreen_shader("Bloom Composite Shader", include_str!("bloom_composite.wgsl")),
        );
        let blend_pipeline = mk_fullscreen_pipeline(
            device,
            "Bloom Blend Pipeline",
            &[&blend_layout],
            Texture::HDR_FORMAT,
            Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Zero,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            }),
            fullscreen_shader("Bloom Blend Shader", include_str!("bloom_blend.wgsl")),
        );

        let size = [size[0].max(1), size[1].max(1)];
        let targets = BloomTargets::new(
            device,
            size,
            scene,
            &sampler,
            [&threshold_layout, &blur_layout, &composite_layout, &blend_layout],
            [&threshold_buffer, &composite_buffer],
        );

        Self {
            threshold_pipeline,
            threshold_layout,
            threshold_buffer,
            blur_pipeline,
            blur_layout,
            composite_pipeline,
            composite_layout,
            composite_buffer,
            blend_pipeline,
            blend_layout,
            sampler,
            targets,
            size,
        }
    }

    /// Size of blur `level`; level 0 is half the output size.
    pub fn level_size(&self, level: usize) -> Option<[u32; 2]> {
        level_sizes(self.size).get(level).copied()
    }

    /// Reallocate every target for a new output size. `scene` is the
    /// reallocated HDR buffer.
    pub fn resize(&mut self, device: &wgpu::Device, size: [u32; 2], scene: &wgpu::TextureView) {
        let size = [size[0].max(1), size[1].max(1)];
        self.size = size;
        self.targets = BloomTargets::new(
            device,
            size,
            scene,
            &self.sampler,
            [
                &self.threshold_layout,
                &self.blur_layout,
                &self.composite_layout,
                &self.blend_layout,
            ],
            [&self.threshold_buffer, &self.composite_buffer],
        );
    }

    /// Record the bloom: high-pass, blur chain, composite, then add onto `scene`.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, scene: &wgpu::TextureView) {
        let targets = &self.targets;
        fullscreen_pass(
            encoder,
            "Bloom Threshold",
            &targets.bright.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            &self.threshold_pipeline,
            &targets.threshold_bind_group,
        );

        for (level, [horizontal, vertical]) in targets.blur_bind_groups.iter().enumerate() {
            fullscreen_pass(
                encoder,
                "Bloom Blur H",
                &targets.horizontal[level].view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                &self.blur_pipeline,
                horizontal,
            );
            fullscreen_pass(
                encoder,
                "Bloom Blur V",
                &targets.vertical[level].view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                &self.blur_pipeline,
                vertical,
            );
        }

        fullscreen_pass(
            encoder,
            "Bloom Composite",
            &targets.composite.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            &self.composite_pipeline,
            &targets.composite_bind_group,
        );
        fullscreen_pass(
            encoder,
            "Bloom Blend",
            scene,
            wgpu::LoadOp::Load,
            &self.blend_pipeline,
            &targets.blend_bind_group,
        );
    }
}

impl BloomTargets {
    fn new(
        device: &wgpu::Device,
        size: [u32; 2],
        scene: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        [threshold_layout, blur_layout, composite_layout, blend_layout]: [&wgpu::BindGroupLayout; 4],
        [threshold_buffer, composite_buffer]: [&wgpu::Buffer; 2],
    ) -> Self {
        let sizes = level_sizes(size);
        let bright = Texture::create_render_target(device, sizes[0], Texture::HDR_FORMAT, "Bloom Bright");
        let horizontal: Vec<Texture> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                Texture::create_render_target(device, *size, Texture::HDR_FORMAT, &format!("Bloom H {i}"))
            })
            .collect();
        let vertical: Vec<Texture> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                Texture::create_render_target(device, *size, Texture::HDR_FORMAT, &format!("Bloom V {i}"))
            })
            .collect();
        let composite =
            Texture::create_render_target(device, sizes[0], Texture::HDR_FORMAT, "Bloom Composite");

        let threshold_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Threshold Bind Group"),
            layout: threshold_layout,
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
                    resource: threshold_buffer.as_entire_binding(),
                },
            ],
        });

        let mut blur_bind_groups = Vec::with_capacity(MIP_LEVELS);
        for level in 0..MIP_LEVELS {
            // level 0 blurs the high-pass, later levels the previous result
            let source = match level {
                0 => &bright.view,
                _ => &vertical[level - 1].view,
            };
            let radius = KERNEL_RADII[level];
            let mk = |direction: [f32; 2], source: &wgpu::TextureView, label: &str| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("Bloom Blur {label} Params {level}")),
                    contents: bytemuck::cast_slice(&[BlurUniform::new(sizes[level], direction, radius)]),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("Bloom Blur {label} Bind Group {level}")),
                    layout: blur_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(source),
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
            };
            blur_bind_groups.push([
                mk([1.0, 0.0], source, "H"),
                mk([0.0, 1.0], &horizontal[level].view, "V"),
            ]);
        }

        let mut composite_entries: Vec<wgpu::BindGroupEntry> = vertical
            .iter()
            .enumerate()
            .map(|(i, level)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(&level.view),
            })
            .collect();
        composite_entries.push(wgpu::BindGroupEntry {
            binding: MIP_LEVELS as u32,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
        composite_entries.push(wgpu::BindGroupEntry {
            binding: MIP_LEVELS as u32 + 1,
            resource: composite_buffer.as_entire_binding(),
        });
        let composite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Composite Bind Group"),
            layout: composite_layout,
            entries: &composite_entries,
        });

        let blend_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Blend Bind Group"),
            layout: blend_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&composite.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        Self {
            bright,
            horizontal,
            vertical,
            composite,
            threshold_bind_group,
            blur_bind_groups,
            composite_bind_group,
            blend_bind_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_follows_the_gaussian() {
        let kernel = gaussian_kernel(3);
        assert_eq!(kernel.len(), 3);
        assert!((kernel[0] - 0.39894 / 3.0).abs() < 1e-6);
        assert!(kernel.windows(2).all(|pair| pair[0] > pair[1]));
        assert_eq!(gaussian_kernel(11).len(), 11);
    }

    #[test]
    fn zero_radius_keeps_the_base_factors() {
        let weights = bloom_weights(0.8, 0.0);
        for (weight, factor) in weights.iter().zip(BLOOM_FACTORS) {
            assert!((weight - 0.8 * factor).abs() < 1e-6);
        }
    }

    #[test]
    fn full_radius_mirrors_the_factors() {
        let weights = bloom_weights(1.0, 1.0);
        let expected = [0.2, 0.4, 0.6, 0.8, 1.0];
        for (weight, expected) in weights.iter().zip(expected) {
            assert!((weight - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn levels_halve_down_to_one_pixel() {
        assert_eq!(
            level_sizes([800, 600]),
            [[400, 300], [200, 150], [100, 75], [50, 38], [25, 19]]
        );
        assert_eq!(level_sizes([3, 3]), [[2, 2], [1, 1], [1, 1], [1, 1], [1, 1]]);
    }

    #[test]
    fn odd_sizes_round_half_up() {
        assert_eq!(level_sizes([17, 91])[0], [9, 46]);
        assert_eq!(level_sizes([17, 91])[1], [5, 23]);
        assert_eq!(level_sizes([1, 1])[0], [1, 1]);
    }

    #[test]
    fn uniforms_match_the_shader_layout() {
        assert_eq!(std::mem::size_of::<ThresholdUniform>(), 16);
        assert_eq!(std::mem::size_of::<BlurUniform>(), 80);
        assert_eq!(std::mem::size_of::<CompositeUniform>(), 32);
    }

    #[test]
    fn blur_uniform_packs_the_kernel() {
        let uniform = BlurUniform::new([100, 50], [1.0, 0.0], 5);
        assert_eq!(uniform.kernel_radius, 5);
        assert_eq!(uniform.inv_size, [0.01, 0.02]);
        assert_eq!(uniform.coefficients[1][0], gaussian_kernel(5)[4]);
        assert_eq!(uniform.coefficients[1][1], 0.0);
    }
}
