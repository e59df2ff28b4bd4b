//! A single drifting particle.

use glam::Vec2;
use rand::Rng as _;

use crate::config::FieldConfig;

/// One particle of the field. Owned exclusively by the field's particle list.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Surface-local position in logical pixels.
    pub position: Vec2,
    /// Velocity in pixels per tick.
    pub velocity: Vec2,
    /// Radius, fixed at birth.
    pub size: f32,
    /// Opacity, fixed at birth.
    pub alpha: f32,
}

impl Particle {
    /// Spawn a particle somewhere on the surface with a small random drift.
    #[must_use]
    pub fn spawn(bounds: Vec2, config: &FieldConfig) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            position: Vec2::new(
                rng.gen_range(0.0..=bounds.x.max(1.0)),
                rng.gen_range(0.0..=bounds.y.max(1.0)),
            ),
            velocity: Vec2::new(
                rng.gen_range(-1.0..=1.0) * config.speed_factor,
                rng.gen_range(-1.0..=1.0) * config.speed_factor,
            ),
            size: rng.gen_range(config.min_size..=config.max_size),
            alpha: rng.gen_range(config.min_alpha..=config.max_alpha),
        }
    }

    /// How fast is this particle moving?
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}
