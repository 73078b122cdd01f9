//! Viewer configuration.
//!
//! Everything the viewer needs to know up front lives in [`ViewerConfig`]:
//! where the model comes from, which group gets its submeshes rebound, the
//! start pose and limits of the orbit camera, the lights and the bloom chain.
//! `ViewerConfig::default()` reproduces the stock scene; the `with_*` methods
//! override single parts of it.

use std::f32::consts::FRAC_PI_2;

/// Bloom and tone-mapping parameters of the post-processing chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomParams {
    /// Luminance above which a pixel contributes to the glow.
    pub threshold: f32,
    /// Multiplier of the composited glow.
    pub strength: f32,
    /// Blends the per-level weights from "tight" (0.0) to "wide" (1.0).
    pub radius: f32,
    /// Exposure multiplier applied right before tone mapping.
    pub exposure: f32,
}

impl Default for BloomParams {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            strength: 0.8,
            radius: 0.0,
            exposure: 5.0,
        }
    }
}

/// Start pose and projection of the perspective camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-5.0, 2.5, -3.5],
            target: [0.0, 0.0, 0.0],
            fovy: 40.0,
            znear: 1.0,
            zfar: 100.0,
        }
    }
}

/// Bounds of the orbit controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitLimits {
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    /// Ceiling of the angle between +Y and the view ray. `π/2` keeps the
    /// camera above the horizon.
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitLimits {
    fn default() -> Self {
        Self {
            min_distance: 3.0,
            max_distance: 8.0,
            min_polar_angle: 0.0,
            max_polar_angle: FRAC_PI_2,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

/// One directional light plus an ambient term.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightConfig {
    /// Position the directional light shines from, towards the origin.
    pub direction: [f32; 3],
    /// sRGB colour of the directional light.
    pub color: u32,
    pub intensity: f32,
    /// sRGB colour of the ambient light.
    pub ambient: u32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [1.0, 1.0, 1.0],
            color: 0xffffff,
            intensity: 1.0,
            ambient: 0x404040,
        }
    }
}

/// Top-level configuration handed to [`crate::flow::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    /// Model path relative to the asset directory.
    pub model: String,
    /// Name of the group whose submeshes are rebound after loading.
    pub glow_group: String,
    pub camera: CameraConfig,
    pub orbit: OrbitLimits,
    pub light: LightConfig,
    pub bloom: BloomParams,
    pub clear_colour: wgpu::Color,
    pub title: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model: "monkey.glb".to_string(),
            glow_group: "Suzanne".to_string(),
            camera: CameraConfig::default(),
            orbit: OrbitLimits::default(),
            light: LightConfig::default(),
            bloom: BloomParams::default(),
            clear_colour: wgpu::Color::BLACK,
            title: "flow-glow".to_string(),
        }
    }
}

impl ViewerConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_glow_group(mut self, group: impl Into<String>) -> Self {
        self.glow_group = group.into();
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_orbit(mut self, orbit: OrbitLimits) -> Self {
        self.orbit = orbit;
        self
    }

    pub fn with_light(mut self, light: LightConfig) -> Self {
        self.light = light;
        self
    }

    pub fn with_bloom(mut self, bloom: BloomParams) -> Self {
        self.bloom = bloom;
        self
    }

    pub fn with_clear_colour(mut self, clear_colour: wgpu::Color) -> Self {
        self.clear_colour = clear_colour;
        self
    }
}

/// Converts an `0xRRGGBB` sRGB colour to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}
