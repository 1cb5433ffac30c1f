//! The render loop state machine and the per-frame contract.
//!
//! The loop stays idle until the first model has been loaded. Once started it
//! never stops: every tick measures the elapsed time and runs one frame.

use instant::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderLoop {
    #[default]
    Idle,
    Running {
        last_tick: Option<Instant>,
    },
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::Idle
    }

    /// Starts the loop. Returns `true` only for the Idle to Running transition.
    pub fn start(&mut self) -> bool {
        match self {
            RenderLoop::Idle => {
                *self = RenderLoop::Running { last_tick: None };
                true
            }
            RenderLoop::Running { .. } => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RenderLoop::Running { .. })
    }

    /// Time since the previous tick, `None` while idle.
    ///
    /// The first tick after starting yields zero.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        match self {
            RenderLoop::Idle => None,
            RenderLoop::Running { last_tick } => {
                let delta = match *last_tick {
                    Some(last) if now > last => now - last,
                    _ => Duration::ZERO,
                };
                *last_tick = Some(now);
                Some(delta)
            }
        }
    }
}

/// The three things a frame does, in the order [`run_frame`] calls them.
pub trait FrameDriver {
    type Error;

    /// Advances animation by `delta`, or spins rotatable nodes when nothing is animated.
    fn animate(&mut self, delta: Duration);

    /// Applies damped camera control input.
    fn update_controls(&mut self);

    /// Draws the scene from the current camera.
    fn draw(&mut self) -> Result<(), Self::Error>;
}

/// Runs one frame: animation first, then controls, then the draw.
pub fn run_frame<D: FrameDriver>(driver: &mut D, delta: Duration) -> Result<(), D::Error> {
    driver.animate(delta);
    driver.update_controls();
    driver.draw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_loop_does_not_tick() {
        let mut render_loop = RenderLoop::new();
        assert_eq!(render_loop.tick(Instant::now()), None);
        assert!(!render_loop.is_running());
    }

    #[test]
    fn start_transitions_once() {
        let mut render_loop = RenderLoop::new();
        assert!(render_loop.start());
        assert!(!render_loop.start());
        assert!(render_loop.is_running());
    }

    #[test]
    fn ticks_measure_elapsed_time() {
        let mut render_loop = RenderLoop::new();
        render_loop.start();
        let t0 = Instant::now();
        assert_eq!(render_loop.tick(t0), Some(Duration::ZERO));
        assert_eq!(
            render_loop.tick(t0 + Duration::from_millis(16)),
            Some(Duration::from_millis(16))
        );
        assert_eq!(
            render_loop.tick(t0 + Duration::from_millis(20)),
            Some(Duration::from_millis(4))
        );
    }
}
