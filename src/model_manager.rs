//! Loading, placing and switching the displayed model.
//!
//! The [`ModelManager`] owns the model slot of the scene, the animation mixer
//! of the current model and the selected descriptor. Loads are split in two:
//! [`ModelManager::load_model`] clears the slot and hands out a future plus a
//! [`LoadTicket`], and [`ModelManager::finish_load`] applies the result once
//! the event loop has resolved the future. Only the ticket of the most recent
//! load can fill the slot.

use std::fmt;

use instant::Duration;

use crate::{
    animation::AnimationMixer,
    config::{ModelEntry, ModelsConfig},
    data_structures::scene_graph::{NodeId, Scene, place_on_ground},
    error::LoadError,
    render_loop::RenderLoop,
    resources::{AssetLoader, LoadFuture, LoadedModel},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelKind {
    LittlestTokyo,
    Soldier,
}

impl ModelKind {
    pub fn other(self) -> Self {
        match self {
            ModelKind::LittlestTokyo => ModelKind::Soldier,
            ModelKind::Soldier => ModelKind::LittlestTokyo,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::LittlestTokyo => f.write_str("LittlestTokyo"),
            ModelKind::Soldier => f.write_str("Soldier"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelDescriptor {
    pub kind: ModelKind,
    pub path: String,
    /// Uniform scale applied to the loaded root, always positive.
    pub scale: f32,
}

/// The two switchable models.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelCatalog {
    pub littlest_tokyo: ModelDescriptor,
    pub soldier: ModelDescriptor,
}

impl ModelCatalog {
    pub fn get(&self, kind: ModelKind) -> &ModelDescriptor {
        match kind {
            ModelKind::LittlestTokyo => &self.littlest_tokyo,
            ModelKind::Soldier => &self.soldier,
        }
    }
}

impl From<&ModelsConfig> for ModelCatalog {
    fn from(config: &ModelsConfig) -> Self {
        let descriptor = |kind: ModelKind, entry: &ModelEntry| ModelDescriptor {
            kind,
            path: entry.path.clone(),
            scale: if entry.scale > 0.0 {
                entry.scale
            } else {
                log::warn!("Ignoring non-positive scale {} for {}", entry.scale, kind);
                1.0
            },
        };
        Self {
            littlest_tokyo: descriptor(ModelKind::LittlestTokyo, &config.littlest_tokyo),
            soldier: descriptor(ModelKind::Soldier, &config.soldier),
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::from(&ModelsConfig::default())
    }
}

/// Identifies one load request.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTicket {
    generation: u64,
    descriptor: ModelDescriptor,
}

impl LoadTicket {
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

/// A load in flight: resolve `future`, then pass its output back with `ticket`.
pub struct PendingLoad {
    pub ticket: LoadTicket,
    pub future: LoadFuture,
}

#[derive(Debug, PartialEq)]
pub enum LoadOutcome {
    /// The model was placed into the scene.
    Placed { node: NodeId, animated: bool },
    /// A newer load was issued after this one, the result was dropped.
    Stale,
}

pub struct ModelManager<L: AssetLoader> {
    loader: L,
    catalog: ModelCatalog,
    selected: ModelKind,
    slot: Option<NodeId>,
    mixer: Option<AnimationMixer>,
    generation: u64,
}

impl<L: AssetLoader> ModelManager<L> {
    pub fn new(loader: L, catalog: ModelCatalog) -> Self {
        Self {
            loader,
            catalog,
            selected: ModelKind::LittlestTokyo,
            slot: None,
            mixer: None,
            generation: 0,
        }
    }

    pub fn selected(&self) -> &ModelDescriptor {
        self.catalog.get(self.selected)
    }

    pub fn current(&self) -> Option<NodeId> {
        self.slot
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    /// Text of the switch control: always names the model that is not selected.
    pub fn switch_label(&self) -> String {
        format!("Switch to {}", self.selected.other())
    }

    /// Loads the selected model.
    pub fn load_selected(&mut self, scene: &mut Scene) -> PendingLoad {
        let descriptor = self.selected().clone();
        self.load_model(scene, descriptor)
    }

    /// Removes the current model and starts loading `descriptor`.
    pub fn load_model(&mut self, scene: &mut Scene, descriptor: ModelDescriptor) -> PendingLoad {
        if let Some(id) = self.slot.take() {
            scene.remove(id);
        }
        self.mixer = None;
        self.selected = descriptor.kind;
        self.generation += 1;

        log::info!("Attempting to load model: {}", descriptor.path);
        let future = self.loader.load(&descriptor.path);
        PendingLoad {
            ticket: LoadTicket {
                generation: self.generation,
                descriptor,
            },
            future,
        }
    }

    /// Switches to the other model.
    pub fn toggle(&mut self, scene: &mut Scene) -> PendingLoad {
        let descriptor = self.catalog.get(self.selected.other()).clone();
        self.load_model(scene, descriptor)
    }

    /// Applies the result of the load identified by `ticket`.
    ///
    /// Errors are logged here and returned for the caller's information only.
    pub fn finish_load(
        &mut self,
        scene: &mut Scene,
        ticket: LoadTicket,
        result: Result<LoadedModel, LoadError>,
        render_loop: &mut RenderLoop,
    ) -> Result<LoadOutcome, LoadError> {
        if ticket.generation != self.generation {
            log::debug!(
                "Dropping result for {}, a newer load is in flight",
                ticket.descriptor.path
            );
            return Ok(LoadOutcome::Stale);
        }

        let LoadedModel { mut root, clips } = match result {
            Ok(model) => model,
            Err(err) => {
                log::error!("Error loading model: {}: {}", ticket.descriptor.path, err);
                if let LoadError::HtmlDocument { .. } = err {
                    log::info!("Received HTML instead of GLB file - file not found");
                }
                return Err(err);
            }
        };

        place_on_ground(root.as_mut(), ticket.descriptor.scale);
        let node = scene.add(root);
        self.slot = Some(node);

        self.mixer = clips.into_iter().next().map(|clip| {
            log::info!("Playing animation: {}", clip.name);
            AnimationMixer::play(clip)
        });
        if self.mixer.is_none() {
            log::info!("No animations found in model");
        }

        if render_loop.start() {
            log::info!("Render loop started");
        }
        Ok(LoadOutcome::Placed {
            node,
            animated: self.mixer.is_some(),
        })
    }

    /// Per-frame animation step: advance the mixer, or spin rotatable nodes
    /// when the model has no clip.
    pub fn animate(&mut self, scene: &mut Scene, delta: Duration) {
        if let (Some(mixer), Some(id)) = (self.mixer.as_mut(), self.slot) {
            if let Some(root) = scene.get_mut(id) {
                mixer.update(delta, root);
                return;
            }
        }
        scene.spin_rotatables();
    }
}
