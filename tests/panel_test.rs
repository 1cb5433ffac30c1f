use flow_viewer::{
    panel::{Panel, PanelValue},
    pipelines::light::{LightRig, LightUniform},
};
use winit::keyboard::{KeyCode, PhysicalKey};

fn press(panel: &mut Panel, lights: &mut LightRig, code: KeyCode) -> bool {
    panel.handle_key(PhysicalKey::Code(code), lights)
}

#[test]
fn arrow_keys_walk_and_edit_the_rows() {
    let mut panel = Panel::default();
    let mut lights = LightRig::default();
    let before = lights.ambient.intensity;

    assert!(press(&mut panel, &mut lights, KeyCode::ArrowRight));
    assert!((lights.ambient.intensity - (before + 0.1)).abs() < 1e-5);

    assert!(!press(&mut panel, &mut lights, KeyCode::ArrowDown));
    assert_eq!(panel.selected(), 1);
    assert!(press(&mut panel, &mut lights, KeyCode::ArrowLeft));
    assert!(!lights.ambient.visible);
    assert_eq!(panel.describe_selected(&lights), "Ambient Light / Toggle On/Off = off");

    assert!(!press(&mut panel, &mut lights, KeyCode::ArrowUp));
    assert!(!press(&mut panel, &mut lights, KeyCode::ArrowUp));
    assert_eq!(panel.selected(), panel.bindings().len() - 1);
    assert!(!press(&mut panel, &mut lights, KeyCode::KeyQ));
}

#[test]
fn slider_values_are_clamped_to_their_range() {
    let panel = Panel::default();
    let mut lights = LightRig::default();

    assert_eq!(panel.set(&mut lights, 0, 7.0), Some(PanelValue::Number(2.0)));
    assert_eq!(lights.ambient.intensity, 2.0);
    assert_eq!(panel.set(&mut lights, 4, -25.0), Some(PanelValue::Number(-10.0)));
    assert_eq!(lights.directional.position.x, -10.0);
    assert_eq!(panel.set(&mut lights, 99, 1.0), None);
}

#[test]
fn hidden_lights_do_not_contribute() {
    let panel = Panel::default();
    let mut lights = LightRig::default();
    let lit = LightUniform::new(&lights, 0.4);
    assert!(lit.ambient()[0] > 0.0);

    // ambient and point toggles
    panel.set(&mut lights, 1, 0.0);
    panel.set(&mut lights, 8, 0.0);
    let dark = LightUniform::new(&lights, 0.4);
    assert_eq!(dark.ambient(), [0.0, 0.0, 0.0]);
    assert_eq!(dark.point_color(), [0.0, 0.0, 0.0]);
}
