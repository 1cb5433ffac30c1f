//! The viewer flow: floor, lights, the switchable model and the light panel.

use std::sync::Arc;

use instant::Duration;
use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::{
    config::ViewerConfig,
    context::Context,
    data_structures::{
        model::{Material, Primitive},
        scene_graph::{ModelNode, Scene},
    },
    error::LoadError,
    flow::{GraphicsFlow, Out},
    model_manager::{LoadOutcome, LoadTicket, ModelCatalog, ModelManager, PendingLoad},
    panel::Panel,
    pipelines::light::LightRig,
    render::Render,
    resources::{AssetLoader, GltfLoader, LoadedModel},
};

pub enum ViewerEvent {
    /// The switch control was activated.
    SwitchRequested,
    /// A model load finished, successfully or not.
    Loaded {
        ticket: LoadTicket,
        result: Result<LoadedModel, LoadError>,
    },
}

pub struct Viewer<L: AssetLoader = GltfLoader> {
    config: ViewerConfig,
    scene: Scene,
    models: ModelManager<L>,
    lights: LightRig,
    panel: Panel,
}

impl Viewer<GltfLoader> {
    pub fn new(config: ViewerConfig) -> Self {
        let loader = GltfLoader::new(config.assets.root.clone())
            .with_draco_decoder(config.assets.draco_decoder.clone());
        Self::with_loader(config, loader)
    }
}

impl<L: AssetLoader> Viewer<L> {
    pub fn with_loader(config: ViewerConfig, loader: L) -> Self {
        let catalog = ModelCatalog::from(&config.models);
        Self {
            config,
            scene: Scene::new(),
            models: ModelManager::new(loader, catalog),
            lights: LightRig::default(),
            panel: Panel::default(),
        }
    }

    fn show_status(&self, ctx: &Context) {
        ctx.set_status(
            &self.models.switch_label(),
            &self.panel.describe_selected(&self.lights),
        );
    }

    fn switch_model(&mut self, ctx: &Context) -> Out<ViewerEvent> {
        let pending = self.models.toggle(&mut self.scene);
        self.show_status(ctx);
        await_load(pending)
    }
}

fn await_load(pending: PendingLoad) -> Out<ViewerEvent> {
    let PendingLoad { ticket, future } = pending;
    Out::FutEvent(vec![Box::new(async move {
        ViewerEvent::Loaded {
            ticket,
            result: future.await,
        }
    })])
}

impl<L: AssetLoader> GraphicsFlow<ViewerEvent> for Viewer<L> {
    fn on_init(&mut self, ctx: &mut Context) -> Out<ViewerEvent> {
        let scene_config = &self.config.scene;
        let floor_material = Arc::new(Material::from_hex("floor", scene_config.floor_color));
        let floor = ModelNode::new(
            "floor",
            None,
            vec![Primitive::plane(
                scene_config.floor_size,
                scene_config.floor_size,
                floor_material,
            )],
        );
        self.scene.add(Box::new(floor));

        ctx.light
            .update(&ctx.queue, &self.lights, scene_config.environment_intensity);

        let pending = self.models.load_selected(&mut self.scene);
        self.show_status(ctx);
        await_load(pending)
    }

    fn on_update(&mut self, ctx: &Context, dt: Duration) -> Out<ViewerEvent> {
        self.models.animate(&mut self.scene, dt);
        self.scene.update_world_transforms();
        self.scene
            .write_to_buffers(&ctx.device, &ctx.queue, &ctx.skin_layout);
        Out::Empty
    }

    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent) -> Out<ViewerEvent> {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key,
                    state: ElementState::Pressed,
                    repeat,
                    ..
                },
            ..
        } = event
        else {
            return Out::Empty;
        };

        if *physical_key == PhysicalKey::Code(KeyCode::KeyM) {
            if *repeat {
                return Out::Empty;
            }
            return self.switch_model(ctx);
        }

        let changed = self.panel.handle_key(*physical_key, &mut self.lights);
        self.show_status(ctx);
        if !changed {
            return Out::Empty;
        }

        log::info!("{}", self.panel.describe_selected(&self.lights));
        let lights = self.lights.clone();
        let environment_intensity = self.config.scene.environment_intensity;
        Out::Configure(Box::new(move |ctx: &mut Context| {
            ctx.light.update(&ctx.queue, &lights, environment_intensity);
        }))
    }

    fn on_custom_events(
        &mut self,
        ctx: &mut Context,
        event: ViewerEvent,
    ) -> Result<Out<ViewerEvent>, ViewerEvent> {
        match event {
            ViewerEvent::SwitchRequested => Ok(self.switch_model(ctx)),
            ViewerEvent::Loaded { ticket, result } => {
                let outcome = self.models.finish_load(
                    &mut self.scene,
                    ticket,
                    result,
                    &mut ctx.render_loop,
                );
                match outcome {
                    Ok(LoadOutcome::Placed { node, animated }) => {
                        log::debug!("Model placed as {:?}, animated: {}", node, animated);
                    }
                    Ok(LoadOutcome::Stale) => {}
                    // the manager already reported the failure
                    Err(err) => log::debug!("Model slot stays empty after {}", err.path()),
                }
                self.show_status(ctx);
                Ok(Out::Empty)
            }
        }
    }

    fn on_render(&self) -> Render<'_> {
        Render::from(&self.scene)
    }
}
