use wgpu::util::DeviceExt;

use crate::config::{LightConfig, hex_to_linear};

/// The scene lights: one directional light plus ambient.
#[derive(Debug)]
pub struct LightResources {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Points towards the light.
    direction: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
    ambient: [f32; 3],
    _padding2: u32,
}

impl From<&LightConfig> for LightUniform {
    fn from(config: &LightConfig) -> Self {
        let direction: cgmath::Vector3<f32> = config.direction.into();
        let direction = if direction == cgmath::Vector3::new(0.0, 0.0, 0.0) {
            cgmath::Vector3::unit_y()
        } else {
            cgmath::InnerSpace::normalize(direction)
        };
        Self {
            direction: direction.into(),
            intensity: config.intensity,
            color: hex_to_linear(config.color),
            _padding: 0,
            ambient: hex_to_linear(config.ambient),
            _padding2: 0,
        }
    }
}

impl LightResources {
    pub fn new(config: &LightConfig, device: &wgpu::Device) -> Self {
        let uniform = LightUniform::from(config);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_the_shader_layout() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
    }

    #[test]
    fn direction_is_normalized() {
        let uniform = LightUniform::from(&LightConfig::default());
        let [x, y, z] = uniform.direction;
        assert!(((x * x + y * y + z * z).sqrt() - 1.0).abs() < 1e-6);
        assert!(uniform.color.iter().all(|c| (c - 1.0).abs() < 1e-6));
        assert!(uniform.ambient[0] > 0.05 && uniform.ambient[0] < 0.052);
    }
}
