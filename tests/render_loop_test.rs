use flow_viewer::render_loop::{FrameDriver, RenderLoop, run_frame};
use instant::{Duration, Instant};

#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    fail_draw: bool,
}

impl FrameDriver for Recorder {
    type Error = &'static str;

    fn animate(&mut self, delta: Duration) {
        self.calls.push(format!("animate {}ms", delta.as_millis()));
    }

    fn update_controls(&mut self) {
        self.calls.push("controls".to_string());
    }

    fn draw(&mut self) -> Result<(), Self::Error> {
        self.calls.push("draw".to_string());
        if self.fail_draw { Err("surface lost") } else { Ok(()) }
    }
}

#[test]
fn frames_animate_then_control_then_draw() {
    let mut recorder = Recorder::default();
    run_frame(&mut recorder, Duration::from_millis(16)).unwrap();
    assert_eq!(recorder.calls, ["animate 16ms", "controls", "draw"]);
}

#[test]
fn draw_errors_are_passed_on() {
    let mut recorder = Recorder {
        fail_draw: true,
        ..Default::default()
    };
    assert_eq!(run_frame(&mut recorder, Duration::ZERO), Err("surface lost"));
    assert_eq!(recorder.calls.len(), 3);
}

#[test]
fn nothing_runs_until_the_loop_starts() {
    let mut render_loop = RenderLoop::new();
    let mut recorder = Recorder::default();
    let t0 = Instant::now();

    for step in 0..3u64 {
        if let Some(delta) = render_loop.tick(t0 + Duration::from_millis(step * 16)) {
            run_frame(&mut recorder, delta).unwrap();
        }
    }
    assert!(recorder.calls.is_empty());

    render_loop.start();
    for step in 3..5u64 {
        if let Some(delta) = render_loop.tick(t0 + Duration::from_millis(step * 16)) {
            run_frame(&mut recorder, delta).unwrap();
        }
    }
    assert_eq!(recorder.calls[0], "animate 0ms");
    assert_eq!(recorder.calls[3], "animate 16ms");
}
