//! Debug panel for the scene lights.
//!
//! [`light_bindings`] is the table of editable light parameters, grouped in
//! folders the way the panel presents them. The [`Panel`] walks that table
//! with the keyboard and writes edited values through the bindings' setters.
//! Values only ever flow from the panel into the lights.

use std::fmt;

use winit::keyboard::{KeyCode, PhysicalKey};

use crate::pipelines::light::LightRig;

pub type Getter<T> = fn(&LightRig) -> T;
pub type Setter<T> = fn(&mut LightRig, T);

#[derive(Clone, Copy)]
pub enum Control {
    Slider {
        min: f32,
        max: f32,
        step: f32,
        get: Getter<f32>,
        set: Setter<f32>,
    },
    Toggle {
        get: Getter<bool>,
        set: Setter<bool>,
    },
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Slider { min, max, step, .. } => f
                .debug_struct("Slider")
                .field("min", min)
                .field("max", max)
                .field("step", step)
                .finish(),
            Control::Toggle { .. } => f.write_str("Toggle"),
        }
    }
}

/// One row of the panel.
#[derive(Clone, Copy, Debug)]
pub struct Binding {
    pub folder: &'static str,
    pub name: &'static str,
    pub control: Control,
}

impl Binding {
    /// Current value of the bound field, formatted for display.
    pub fn value(&self, lights: &LightRig) -> PanelValue {
        match self.control {
            Control::Slider { get, .. } => PanelValue::Number(get(lights)),
            Control::Toggle { get, .. } => PanelValue::Flag(get(lights)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanelValue {
    Number(f32),
    Flag(bool),
}

impl fmt::Display for PanelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelValue::Number(v) => write!(f, "{:.1}", v),
            PanelValue::Flag(true) => f.write_str("on"),
            PanelValue::Flag(false) => f.write_str("off"),
        }
    }
}

fn slider(
    folder: &'static str,
    name: &'static str,
    (min, max): (f32, f32),
    get: Getter<f32>,
    set: Setter<f32>,
) -> Binding {
    Binding {
        folder,
        name,
        control: Control::Slider {
            min,
            max,
            step: 0.1,
            get,
            set,
        },
    }
}

fn toggle(folder: &'static str, get: Getter<bool>, set: Setter<bool>) -> Binding {
    Binding {
        folder,
        name: "Toggle On/Off",
        control: Control::Toggle { get, set },
    }
}

const AMBIENT: &str = "Ambient Light";
const DIRECTIONAL: &str = "Directional Light";
const POINT: &str = "Point Light";
const POSITION_RANGE: (f32, f32) = (-10.0, 10.0);

pub fn light_bindings() -> Vec<Binding> {
    vec![
        slider(
            AMBIENT,
            "Intensity",
            (0.0, 2.0),
            |l| l.ambient.intensity,
            |l, v| l.ambient.intensity = v,
        ),
        toggle(AMBIENT, |l| l.ambient.visible, |l, v| l.ambient.visible = v),
        slider(
            DIRECTIONAL,
            "Intensity",
            (0.0, 2.0),
            |l| l.directional.intensity,
            |l, v| l.directional.intensity = v,
        ),
        toggle(DIRECTIONAL, |l| l.directional.visible, |l, v| l.directional.visible = v),
        slider(
            DIRECTIONAL,
            "Position X",
            POSITION_RANGE,
            |l| l.directional.position.x,
            |l, v| l.directional.position.x = v,
        ),
        slider(
            DIRECTIONAL,
            "Position Y",
            POSITION_RANGE,
            |l| l.directional.position.y,
            |l, v| l.directional.position.y = v,
        ),
        slider(
            DIRECTIONAL,
            "Position Z",
            POSITION_RANGE,
            |l| l.directional.position.z,
            |l, v| l.directional.position.z = v,
        ),
        slider(POINT, "Intensity", (0.0, 3.0), |l| l.point.intensity, |l, v| l.point.intensity = v),
        toggle(POINT, |l| l.point.visible, |l, v| l.point.visible = v),
        slider(
            POINT,
            "Position X",
            POSITION_RANGE,
            |l| l.point.position.x,
            |l, v| l.point.position.x = v,
        ),
        slider(
            POINT,
            "Position Y",
            POSITION_RANGE,
            |l| l.point.position.y,
            |l, v| l.point.position.y = v,
        ),
        slider(
            POINT,
            "Position Z",
            POSITION_RANGE,
            |l| l.point.position.z,
            |l, v| l.point.position.z = v,
        ),
    ]
}

/// Snaps `value` to the slider's step grid and clamps it to its range.
pub fn snap(value: f32, min: f32, max: f32, step: f32) -> f32 {
    let snapped = if step > 0.0 {
        min + ((value - min) / step).round() * step
    } else {
        value
    };
    snapped.clamp(min, max)
}

/// The keyboard-driven light panel.
#[derive(Debug)]
pub struct Panel {
    bindings: Vec<Binding>,
    selected: usize,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new(light_bindings())
    }
}

impl Panel {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            selected: 0,
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn select_next(&mut self) {
        if !self.bindings.is_empty() {
            self.selected = (self.selected + 1) % self.bindings.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.bindings.is_empty() {
            self.selected = (self.selected + self.bindings.len() - 1) % self.bindings.len();
        }
    }

    /// Writes a slider value, snapped and clamped. Returns the stored value.
    ///
    /// Toggles treat any non-zero value as on.
    pub fn set(&self, lights: &mut LightRig, index: usize, value: f32) -> Option<PanelValue> {
        let binding = self.bindings.get(index)?;
        match binding.control {
            Control::Slider {
                min,
                max,
                step,
                set,
                ..
            } => set(lights, snap(value, min, max, step)),
            Control::Toggle { set, .. } => set(lights, value != 0.0),
        }
        Some(binding.value(lights))
    }

    /// Moves the selected slider by `steps` steps, or flips the selected toggle.
    pub fn nudge(&self, lights: &mut LightRig, steps: i32) -> Option<PanelValue> {
        let binding = self.bindings.get(self.selected)?;
        match binding.control {
            Control::Slider {
                min,
                max,
                step,
                get,
                set,
            } => set(lights, snap(get(lights) + steps as f32 * step, min, max, step)),
            Control::Toggle { get, set } => set(lights, !get(lights)),
        }
        Some(binding.value(lights))
    }

    /// Handles panel keys. Returns `true` if a light value changed.
    pub fn handle_key(&mut self, key: PhysicalKey, lights: &mut LightRig) -> bool {
        match key {
            PhysicalKey::Code(KeyCode::ArrowUp) => {
                self.select_prev();
                false
            }
            PhysicalKey::Code(KeyCode::ArrowDown) => {
                self.select_next();
                false
            }
            PhysicalKey::Code(KeyCode::ArrowLeft) => self.nudge(lights, -1).is_some(),
            PhysicalKey::Code(KeyCode::ArrowRight) => self.nudge(lights, 1).is_some(),
            _ => false,
        }
    }

    /// `Folder / Name = value` for the row at `index`.
    pub fn describe(&self, lights: &LightRig, index: usize) -> Option<String> {
        let binding = self.bindings.get(index)?;
        Some(format!(
            "{} / {} = {}",
            binding.folder,
            binding.name,
            binding.value(lights)
        ))
    }

    pub fn describe_selected(&self, lights: &LightRig) -> String {
        self.describe(lights, self.selected).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_to_the_step_and_clamps() {
        assert!((snap(0.46, 0.0, 2.0, 0.1) - 0.5).abs() < 1e-6);
        assert_eq!(snap(5.0, 0.0, 2.0, 0.1), 2.0);
        assert_eq!(snap(-12.0, -10.0, 10.0, 0.1), -10.0);
    }

    #[test]
    fn folders_have_the_expected_rows() {
        let bindings = light_bindings();
        let count = |folder: &str| bindings.iter().filter(|b| b.folder == folder).count();
        assert_eq!(count(AMBIENT), 2);
        assert_eq!(count(DIRECTIONAL), 5);
        assert_eq!(count(POINT), 5);
    }
}
