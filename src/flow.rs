//! Flow control and application event loop.
//!
//! A "flow" owns a piece of application state: it reacts to window input and
//! custom events, advances its state every frame and says what to draw. The
//! [`App`] drives the flows from winit's event loop and resolves the futures
//! they hand back.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<E>`] is the trait for application states that handle events and rendering
//! - [`Out<E>`] is the output type for async event handling and context configuration
//!
//! # Lifecycle
//!
//! 1. `on_init` once the GPU context exists
//! 2. `on_window_events` / `on_custom_events` as events arrive
//! 3. On redraw, while the render loop is running: `on_update` (animation),
//!    camera controls, then `on_render` and the draw
//! 4. Present frame

use std::{iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::{model::DrawModel, texture::Texture},
    render::{Instanced, Render},
    render_loop::{FrameDriver, run_frame},
};

///
/// The output of every lifecycle hook where the flow can pass async work that
/// is handled according to the platform you're running on.
///
/// `Out::FutEvent` resolves futures of events and puts the results into the
/// event queue, where they come back through `on_custom_events`.
///
/// `Out::Configure` modifies the Context, for instance to update the light
/// uniform or the clear colour.
///
/// `Empty` is the default output used when nothing needs to be handled.
///
pub enum Out<E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<E> Default for Out<E> {
    fn default() -> Self {
        Self::Empty
    }
}

/// Trait for implementing a renderable application state.
pub trait GraphicsFlow<E> {
    /// Initialize the flow and configure the context.
    fn on_init(&mut self, ctx: &mut Context) -> Out<E>;

    /// Advance state by the frame delta `dt`.
    ///
    /// Only called while the render loop is running, before the camera update
    /// and the draw of the same frame.
    fn on_update(&mut self, ctx: &Context, dt: Duration) -> Out<E>;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent) -> Out<E>;

    /// Handle custom application events.
    ///
    /// Returns `Err(event)` for events this flow does not handle so that the
    /// next flow gets them.
    fn on_custom_events(&mut self, ctx: &mut Context, event: E) -> Result<Out<E>, E>;

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

/// Connects a DOM element's click to a custom event (web only).
#[derive(Clone)]
pub struct ClickBinding<E> {
    pub element_id: String,
    pub event: fn() -> E,
}

/// GPU context plus surface status.
pub struct AppState {
    pub(crate) ctx: Context,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        Ok(Self {
            ctx,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx.camera.controller.set_viewport_height(height);
            self.ctx
                .surface
                .configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn render<E>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<E>>],
    ) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut basics: Vec<Instanced> = Vec::new();
            graphics_flows
                .iter()
                .for_each(|flow| flow.on_render().collect_into(&mut basics));

            render_pass.set_pipeline(&self.ctx.pipelines.basic);
            for instanced in basics {
                if instanced.amount == 0 || instanced.instance.size() == 0 {
                    log::warn!("you attempted to render something with zero instances");
                    continue;
                }
                let material = instanced.primitive.material.upload(
                    &self.ctx.device,
                    &self.ctx.queue,
                    &self.ctx.material_layout,
                );
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_primitive_instanced(
                    instanced.primitive,
                    material,
                    0..instanced.amount as u32,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                    instanced.skin.unwrap_or(&self.ctx.unskinned.bind_group),
                );
            }
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// One frame's worth of access to the app, in the shape the render loop expects.
struct Frame<'a, E: 'static> {
    state: &'a mut AppState,
    flows: &'a mut Vec<Box<dyn GraphicsFlow<E>>>,
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: &'a tokio::runtime::Runtime,
    proxy: &'a EventLoopProxy<FlowEvent<E>>,
}

impl<E: 'static> FrameDriver for Frame<'_, E> {
    type Error = wgpu::SurfaceError;

    fn animate(&mut self, delta: Duration) {
        for flow in self.flows.iter_mut() {
            let out = flow.on_update(&self.state.ctx, delta);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                self.async_runtime,
                &mut self.state.ctx,
                self.proxy.clone(),
                out,
            );
        }
    }

    fn update_controls(&mut self) {
        let ctx = &mut self.state.ctx;
        ctx.camera.update(&ctx.queue, &ctx.projection);
    }

    fn draw(&mut self) -> Result<(), Self::Error> {
        self.state.render(self.flows.as_slice())
    }
}

pub struct App<Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent<Event>>,
    config: ViewerConfig,
    state: Option<AppState>,
    graphics_flows: Vec<Box<dyn GraphicsFlow<Event>>>,
    click_bindings: Vec<ClickBinding<Event>>,
    init_error: Option<anyhow::Error>,
}

impl<Event: 'static> App<Event> {
    fn new(
        event_loop: &EventLoop<FlowEvent<Event>>,
        config: ViewerConfig,
        graphics_flows: Vec<Box<dyn GraphicsFlow<Event>>>,
        click_bindings: Vec<ClickBinding<Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            state: None,
            graphics_flows,
            click_bindings,
            init_error: None,
        })
    }

    fn init_flows(&mut self) {
        let Some(app_state) = self.state.as_mut() else {
            return;
        };
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_init(&mut app_state.ctx);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut app_state.ctx,
                self.proxy.clone(),
                out,
            );
        }
        app_state.ctx.request_redraw();
    }
}

pub enum FlowEvent<Event: 'static> {
    #[allow(dead_code)]
    Initialized(Box<AppState>),
    Custom(Event),
}

impl<Event: 'static> ApplicationHandler<FlowEvent<Event>> for App<Event> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes =
            Window::default_attributes().with_title(self.config.window.title.clone());

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::WindowAttributesExtWebSys;

            window_attributes = window_attributes.with_append(true);
            if let Some((width, height)) = crate::web::viewport_size() {
                window_attributes =
                    window_attributes.with_inner_size(winit::dpi::LogicalSize::new(width, height));
            }
            for binding in self.click_bindings.iter() {
                let proxy = self.proxy.clone();
                let make = binding.event;
                let bound = crate::web::on_click(&binding.element_id, move || {
                    if proxy.send_event(FlowEvent::Custom(make())).is_err() {
                        log::warn!("Event loop closed, dropping click");
                    }
                });
                if let Err(e) = bound {
                    log::warn!("{:#}", e);
                }
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        log::debug!("{} click bindings only apply on the web", self.click_bindings.len());

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.init_error =
                    Some(anyhow::Error::new(e).context("could not create the window"));
                event_loop.exit();
                return;
            }
        };

        let config = self.config.clone();
        let init_future = async move { AppState::new(window, &config).await };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(app_state) => {
                    self.state = Some(app_state);
                    self.init_flows();
                }
                Err(e) => {
                    log::error!("App initialization failed: {:#}", e);
                    self.init_error = Some(e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok(app_state) => {
                        if proxy
                            .send_event(FlowEvent::Initialized(Box::new(app_state)))
                            .is_err()
                        {
                            log::error!("Event loop closed before initialization finished");
                        }
                    }
                    Err(e) => log::error!("App initialization failed: {:#}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent<Event>) {
        match event {
            FlowEvent::Initialized(state) => {
                // This is the message from our wasm `spawn_local`
                self.state = Some(*state);
                self.init_flows();
            }
            FlowEvent::Custom(custom_event) => {
                let Some(state) = &mut self.state else {
                    return;
                };
                let mut pending = Some(custom_event);
                for flow in self.graphics_flows.iter_mut() {
                    let Some(event) = pending.take() else {
                        break;
                    };
                    match flow.on_custom_events(&mut state.ctx, event) {
                        Ok(out) => handle_flow_output(
                            #[cfg(not(target_arch = "wasm32"))]
                            &self.async_runtime,
                            &mut state.ctx,
                            self.proxy.clone(),
                            out,
                        ),
                        Err(event) => pending = Some(event),
                    }
                }
                if pending.is_some() {
                    log::warn!("Warning! Custom event was not consumed this cycle");
                }
                // a load may just have started the render loop
                if state.ctx.render_loop.is_running() {
                    state.ctx.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.ctx.camera.controller.handle_window_events(&event);

        self.graphics_flows.iter_mut().for_each(|f| {
            let events = f.on_window_events(&state.ctx, &event);
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut state.ctx,
                self.proxy.clone(),
                events,
            );
        });

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                // Nothing is drawn until the first model has been placed
                let Some(delta) = state.ctx.render_loop.tick(Instant::now()) else {
                    return;
                };
                let mut frame = Frame {
                    state: &mut *state,
                    flows: &mut self.graphics_flows,
                    #[cfg(not(target_arch = "wasm32"))]
                    async_runtime: &self.async_runtime,
                    proxy: &self.proxy,
                };
                match run_frame(&mut frame, delta) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
                state.ctx.request_redraw();
            }
            _ => {}
        }
    }
}

fn handle_flow_output<Event>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    ctx: &mut Context,
    proxy: EventLoopProxy<FlowEvent<Event>>,
    out: Out<Event>,
) {
    match out {
        // Send the events passed by the flow to winit
        Out::FutEvent(futures) => {
            let fut =
                async move { futures::future::join_all(futures.into_iter().map(Pin::from)).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                let resolved = async_runtime.block_on(fut);
                for event in resolved {
                    if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                        log::error!("Event loop was closed before all events could be processed.");
                    }
                }
            }

            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    let resolved = fut.await;
                    for event in resolved {
                        if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                            log::error!(
                                "Event loop was closed before all events could be processed."
                            );
                        }
                    }
                });
            }
        }
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

/// Installs the platform logger: `env_logger` natively, the browser console on the web.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let env = env_logger::Env::default()
            .default_filter_or("info,wgpu_core=warn,wgpu_hal=warn,naga=warn");
        if let Err(e) = env_logger::Builder::from_env(env).try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys::console::warn_1(&format!("Could not initialize logger: {}", e).into());
        }
    }
}

pub fn run<Event: 'static>(
    config: ViewerConfig,
    graphics_flows: Vec<Box<dyn GraphicsFlow<Event>>>,
    click_bindings: Vec<ClickBinding<Event>>,
) -> anyhow::Result<()> {
    let event_loop: EventLoop<FlowEvent<Event>> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config, graphics_flows, click_bindings)?;

    event_loop.run_app(&mut app)?;

    match app.init_error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
