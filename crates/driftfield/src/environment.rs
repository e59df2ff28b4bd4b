//! A read-only snapshot of the environment the field animates in.
//!
//! Everything the field needs to know about the outside world is captured here once, before
//! construction, and passed in explicitly. There is no hidden global state to consult later.

use color_eyre::eyre::Result;
use glam::Vec2;
use termwiz::terminal::Terminal as _;

/// Assumed device memory, in gigabytes, when no hint is available.
pub const DEFAULT_DEVICE_MEMORY: f32 = 4.0;

/// The density never derates below this, however little memory the device has.
pub const DENSITY_FLOOR: f32 = 0.000_06;

/// The lowest honoured device pixel ratio.
pub const MIN_DEVICE_PIXEL_RATIO: f32 = 1.0;

/// The highest honoured device pixel ratio. Anything above this costs more than it looks.
pub const MAX_DEVICE_PIXEL_RATIO: f32 = 2.0;

/// The environment variable that suppresses the animation entirely.
const REDUCED_MOTION_VAR: &str = "DRIFTFIELD_REDUCED_MOTION";

/// A snapshot of the signals the field adapts to. Taken once, never re-polled.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Environment {
    /// The size of the drawing surface in logical pixels.
    pub viewport: Vec2,
    /// Physical-to-logical pixel scaling factor, as reported. Clamp with [`clamp_device_pixel_ratio`].
    pub device_pixel_ratio: f32,
    /// How much memory the device has, in gigabytes, if known.
    pub device_memory: Option<f32>,
    /// Whether the user wants animations suppressed.
    pub reduced_motion: bool,
}

impl Environment {
    /// Build a snapshot by hand, for hosts that already know their drawing surface.
    #[must_use]
    pub const fn new(
        viewport: Vec2,
        device_pixel_ratio: f32,
        device_memory: Option<f32>,
        reduced_motion: bool,
    ) -> Self {
        Self {
            viewport,
            device_pixel_ratio,
            device_memory,
            reduced_motion,
        }
    }

    /// Probe the user's terminal and build the snapshot. A TTY cell is 1 pixel wide and, thanks to
    /// the half-block trick, 2 pixels tall.
    pub fn detect(config: &crate::config::Config) -> Result<Self> {
        let capabilities = termwiz::caps::Capabilities::new_from_env()?;
        let mut terminal = termwiz::terminal::new_terminal(capabilities)?;
        let size = terminal.get_screen_size()?;

        #[expect(
            clippy::cast_precision_loss,
            clippy::as_conversions,
            reason = "Terminals aren't 2^23 cells wide"
        )]
        let viewport = Vec2::new(size.cols as f32, (size.rows * 2) as f32);

        Ok(Self {
            viewport,
            device_pixel_ratio: 1.0,
            device_memory: config.device_memory,
            reduced_motion: config.reduced_motion || is_reduced_motion_var_set(),
        })
    }

    /// Derate the configured particle density on low-memory devices. Decided once, at
    /// construction. It is deliberately not re-evaluated when conditions change later.
    #[must_use]
    pub fn derate_density(&self, base_density: f32) -> f32 {
        let memory = self.device_memory.unwrap_or(DEFAULT_DEVICE_MEMORY);
        if memory <= 1.0 {
            (base_density * 0.5).max(DENSITY_FLOOR)
        } else if memory <= 2.0 {
            base_density * 0.75
        } else {
            base_density
        }
    }
}

/// Keep the device pixel ratio inside the range the field is willing to pay for.
#[must_use]
pub fn clamp_device_pixel_ratio(device_pixel_ratio: f32) -> f32 {
    device_pixel_ratio.clamp(MIN_DEVICE_PIXEL_RATIO, MAX_DEVICE_PIXEL_RATIO)
}

/// Has the user asked for animations to be suppressed via the environment?
fn is_reduced_motion_var_set() -> bool {
    matches!(
        std::env::var(REDUCED_MOTION_VAR).as_deref(),
        Ok("1" | "true")
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn environment(device_memory: Option<f32>) -> Environment {
        Environment {
            viewport: Vec2::new(1920.0, 1080.0),
            device_pixel_ratio: 1.0,
            device_memory,
            reduced_motion: false,
        }
    }

    #[test]
    fn density_unchanged_with_plenty_of_memory() {
        let base = 0.000_12;
        assert!((environment(None).derate_density(base) - base).abs() < f32::EPSILON);
        assert!((environment(Some(8.0)).derate_density(base) - base).abs() < f32::EPSILON);
    }

    #[test]
    fn density_derated_on_low_memory() {
        let base = 0.000_12;
        let derated = environment(Some(1.0)).derate_density(base);
        assert!((derated - 0.000_06).abs() < f32::EPSILON);

        let derated = environment(Some(2.0)).derate_density(base);
        assert!((derated - 0.000_09).abs() < 0.000_001);
    }

    #[test]
    fn density_floor_holds() {
        let derated = environment(Some(0.5)).derate_density(0.000_08);
        assert!((derated - DENSITY_FLOOR).abs() < f32::EPSILON);
    }

    #[test]
    fn device_pixel_ratio_is_clamped() {
        assert!((clamp_device_pixel_ratio(3.0) - 2.0).abs() < f32::EPSILON);
        assert!((clamp_device_pixel_ratio(0.5) - 1.0).abs() < f32::EPSILON);
        assert!((clamp_device_pixel_ratio(1.5) - 1.5).abs() < f32::EPSILON);
    }
}
