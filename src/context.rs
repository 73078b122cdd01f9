use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{CameraResources, Projection},
    config::ViewerConfig,
    data_structures::scene_graph::Scene,
    pipelines::light::LightResources,
    render::{Composer, FrameInputs},
};

/// GPU state shared by every frame: device, queue, the optional window
/// surface, camera, lights and the pass chain.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub composer: Composer,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = mk_instance();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create the window surface")?;
        let (adapter, device, queue) = request_device(&instance, Some(&surface)).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // any format works: the output pass encodes sRGB itself when the surface doesn't
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no supported formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "surface configured: {}x{} {:?}",
            config.width,
            config.height,
            config.format
        );

        Ok(Self::assemble(
            Some(window),
            Some(surface),
            device,
            queue,
            config,
            viewer,
        ))
    }

    /// A context without window that renders into caller-provided textures.
    pub async fn headless(width: u32, height: u32, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let instance = mk_instance();
        let (_, device, queue) = request_device(&instance, None).await?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        Ok(Self::assemble(None, None, device, queue, config, viewer))
    }

    fn assemble(
        window: Option<Arc<Window>>,
        surface: Option<wgpu::Surface<'static>>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: wgpu::SurfaceConfiguration,
        viewer: &ViewerConfig,
    ) -> Self {
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(viewer.camera.fovy),
            viewer.camera.znear,
            viewer.camera.zfar,
        );
        let camera = CameraResources::new(
            &device,
            &viewer.camera,
            viewer.orbit,
            &projection,
            config.height,
        );
        let light = LightResources::new(&viewer.light, &device);
        let composer = Composer::new(
            &device,
            [config.width, config.height],
            config.format,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            &viewer.bloom,
        );

        Self {
            window,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            composer,
            clear_colour: viewer.clear_colour,
        }
    }

    pub fn window(&self) -> Option<&Arc<Window>> {
        self.window.as_ref()
    }

    pub fn size(&self) -> [u32; 2] {
        [self.config.width, self.config.height]
    }

    /// Apply a new output size to the surface, projection, orbit controls and
    /// every render target. Returns `false` for a zero-sized (minimized) window.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        if let Some(surface) = &self.surface {
            surface.configure(&self.device, &self.config);
        }
        self.projection.resize(width, height);
        self.camera.controller.resize(height);
        self.composer.resize(&self.device, [width, height]);
        log::debug!("resized to {width}x{height}");
        true
    }

    /// Apply pending orbit input and upload the camera.
    pub fn update(&mut self) {
        self.camera.update(&self.projection, &self.queue);
    }

    /// Render one frame of `scene` into `target`.
    pub fn render_to(&self, scene: &mut Scene, target: &wgpu::TextureView) {
        scene.write_to_buffers(&self.device, &self.queue, self.composer.material_layout());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let frame = FrameInputs {
            scene,
            camera_bind_group: &self.camera.bind_group,
            light_bind_group: &self.light.bind_group,
            clear_colour: self.clear_colour,
        };
        self.composer.render(&mut encoder, &frame, target);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Render one frame of `scene` to the window surface and present it.
    pub fn render(&self, scene: &mut Scene) -> Result<(), wgpu::SurfaceError> {
        let Some(surface) = &self.surface else {
            return Ok(());
        };
        let output = surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to(scene, &view);
        output.present();
        Ok(())
    }
}

fn mk_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        #[cfg(not(target_arch = "wasm32"))]
        backends: wgpu::Backends::PRIMARY,
        #[cfg(target_arch = "wasm32")]
        backends: wgpu::Backends::GL,
        ..wgpu::InstanceDescriptor::new_without_display_handle()
    })
}

async fn request_device(
    instance: &wgpu::Instance,
    compatible_surface: Option<&wgpu::Surface<'static>>,
) -> anyhow::Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface,
            force_fallback_adapter: false,
        })
        .await
        .context("no suitable GPU adapter")?;
    log::info!("using adapter {:?}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            // WebGL doesn't support all of wgpu's features, so if
            // we're building for the web we'll have to disable some.
            required_limits: if cfg!(target_arch = "wasm32") {
                wgpu::Limits::downlevel_webgl2_defaults()
            } else {
                wgpu::Limits::default()
            },
            ..Default::default()
        })
        .await
        .context("failed to open the GPU device")?;
    Ok((adapter, device, queue))
}
