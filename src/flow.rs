//! The frame driver and application event loop.
//!
//! [`run`] opens the window, builds the [`Context`] and starts the model load.
//! The load completes on the async runtime: the loader binds the glow group's
//! materials and hands the finished hierarchy to the event loop as a
//! [`FlowEvent`], which attaches it to the scene in one step. From then on
//! every `RedrawRequested` applies pending orbit input, renders the pass chain
//! and requests the next redraw.

use std::{fmt::Debug, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::scene_graph::{Scene, SceneNode},
    resources::{LoadError, binder::bind_materials, loader::spawn_load},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub(crate) enum FlowEvent {
    /// The context finished its async setup (web only).
    #[cfg(target_arch = "wasm32")]
    Initialized(Context),
    /// A model finished loading and its materials are bound.
    Loaded(Box<dyn SceneNode>),
    LoadFailed(LoadError),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(target_arch = "wasm32")]
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Loaded(model) => f.debug_tuple("Loaded").field(&model.name()).finish(),
            Self::LoadFailed(err) => f.debug_tuple("LoadFailed").field(err).finish(),
        }
    }
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    config: ViewerConfig,
    ctx: Option<Context>,
    scene: Scene,
    last_time: Instant,
    // setup failure that ends the event loop; returned from `run`
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            ctx: None,
            scene: Scene::new(),
            last_time: Instant::now(),
            fatal: None,
        })
    }

    /// Load the model in the background. Both outcomes come back as user events.
    fn start_load(&self) {
        let group = self.config.glow_group.clone();
        let loaded = self.proxy.clone();
        let failed = self.proxy.clone();

        let on_load = move |mut model: Box<dyn SceneNode>| {
            bind_materials(model.as_mut(), &group);
            if loaded.send_event(FlowEvent::Loaded(model)).is_err() {
                log::warn!("event loop closed before the model arrived");
            }
        };
        let on_error = move |err: LoadError| {
            if failed.send_event(FlowEvent::LoadFailed(err)).is_err() {
                log::warn!("event loop closed before the load error arrived");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        let _guard = self.async_runtime.enter();
        spawn_load(self.config.model.clone(), on_load, on_error);
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.ctx.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                return self.fail(event_loop, anyhow::anyhow!("failed to create the window: {err}"));
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self
                .async_runtime
                .block_on(Context::new(window.clone(), &self.config))
            {
                Ok(ctx) => self.ctx = Some(ctx),
                Err(err) => return self.fail(event_loop, err),
            }
            self.start_load();
            window.request_redraw();
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match Context::new(window, &config).await {
                    Ok(ctx) => {
                        if proxy.send_event(FlowEvent::Initialized(ctx)).is_err() {
                            log::warn!("event loop closed during setup");
                        }
                    }
                    Err(err) => log::error!("{err:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            #[cfg(target_arch = "wasm32")]
            FlowEvent::Initialized(ctx) => {
                // the canvas may have been resized while the device was requested
                let ctx = self.ctx.insert(ctx);
                if let Some(size) = ctx.window().map(|window| window.inner_size()) {
                    ctx.resize(size.width, size.height);
                }
                self.start_load();
                if let Some(window) = self.ctx.as_ref().and_then(Context::window) {
                    window.request_redraw();
                }
            }
            FlowEvent::Loaded(model) => self.scene.attach(model),
            FlowEvent::LoadFailed(err) => {
                log::error!("the scene stays empty: {err}");
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let ctx = match &mut self.ctx {
            Some(ctx) => ctx,
            None => return,
        };

        ctx.camera.controller.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                ctx.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                log::debug!("frame time {dt:?}");

                ctx.update();
                match ctx.render(&mut self.scene) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(size) = ctx.window().map(|window| window.inner_size()) {
                            ctx.resize(size.width, size.height);
                        }
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                if let Some(window) = ctx.window() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Open the viewer window and drive frames until it is closed.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(ViewerConfig::default()).map_err(|err| JsValue::from_str(&format!("{err:#}")))
}
