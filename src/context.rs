use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraController, CameraResources, Projection},
    config::ViewerConfig,
    data_structures::{
        model::{self, hex_to_linear},
        skin::{self, GpuSkin},
        texture,
    },
    pipelines::{
        basic::mk_basic_pipeline,
        light::{LightResources, LightRig, LightUniform},
    },
    render_loop::RenderLoop,
};

pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
}

/// GPU and window state shared by all flows.
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub material_layout: wgpu::BindGroupLayout,
    pub skin_layout: wgpu::BindGroupLayout,
    /// Identity joints for primitives without a skin.
    pub unskinned: GpuSkin,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    pub render_loop: RenderLoop,
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    title: String,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    switch_button: String,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    light_panel: String,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("could not create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        log::info!("Requesting device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("could not open the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour and expects an sRGB surface to encode it.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture format")?;
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

        let camera_config = &viewer.camera;
        let camera = Camera::new(camera_config.position, camera_config.target);
        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(camera_config.fov),
            camera_config.near,
            camera_config.far,
        );
        let mut controller = CameraController::from_config(camera_config);
        controller.set_viewport_height(config.height);
        let camera = CameraResources::new(&device, camera, controller, &projection);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let light = LightResources::new(
            &device,
            LightUniform::new(&LightRig::default(), viewer.scene.environment_intensity),
        );

        let material_layout = model::material_layout(&device);
        let skin_layout = skin::skin_layout(&device);
        let unskinned = GpuSkin::unskinned(&device, &skin_layout);
        let pipelines = Pipelines {
            basic: mk_basic_pipeline(
                &device,
                &config,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                &skin_layout,
            ),
        };

        let [r, g, b] = hex_to_linear(viewer.scene.background);

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            material_layout,
            skin_layout,
            unskinned,
            pipelines,
            clear_colour: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            render_loop: RenderLoop::new(),
            title: viewer.window.title.clone(),
            switch_button: viewer.dom.switch_button.clone(),
            light_panel: viewer.dom.light_panel.clone(),
        })
    }

    /// Shows the model switch label and the selected light panel row.
    ///
    /// On the web the label is the text of the switch button and the row goes
    /// into the light panel element, or the page title without one. Natively
    /// both go into the window title.
    pub fn set_status(&self, switch_label: &str, panel_row: &str) {
        #[cfg(not(target_arch = "wasm32"))]
        self.window
            .set_title(&format!("{} | {} [M] | {}", self.title, switch_label, panel_row));

        #[cfg(target_arch = "wasm32")]
        {
            crate::web::set_text(&self.switch_button, switch_label);
            if !crate::web::set_text(&self.light_panel, panel_row) {
                crate::web::set_title(panel_row);
            }
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}
