//! The particle field simulation: drifting points, wrap-around edges, pointer repulsion and
//! proximity lines between near neighbours.
//!
//! Everything here is synchronous and single-threaded. The async side of the crate (see
//! [`super::main`]) feeds it ticks and input events; cancellation is cooperative via the
//! running flag, so a tick that observes a stopped field does nothing and stops rescheduling.

use color_eyre::eyre::{bail, Result};
use glam::Vec2;

use crate::config::FieldConfig;
use crate::environment::{clamp_device_pixel_ratio, Environment};
use crate::particle::Particle;
use crate::surface::Canvas;

/// The number of microseconds in a second.
const MICROSECONDS_PER_SECOND: u64 = 1_000_000;

/// A self-driving 2D point simulation bound to one drawing surface.
pub struct ParticleField {
    /// The field's tunables, fixed at construction.
    pub config: FieldConfig,
    /// All the particles. Replaced wholesale on resize.
    pub particles: Vec<Particle>,
    /// Where the pointer last was, surface-local. `None` means no active pointer, which
    /// disables repulsion.
    pub pointer: Option<Vec2>,
    /// Surface width in logical pixels.
    width: f32,
    /// Surface height in logical pixels.
    height: f32,
    /// Clamped physical-to-logical pixel scaling factor.
    device_pixel_ratio: f32,
    /// Particles per square pixel, already derated for low-memory devices. Computed once at
    /// construction and reused for every resize.
    density: f32,
    /// Whether ticks should do any work.
    running: bool,
    /// Whether a tick callback is pending. At most one, ever.
    scheduled: bool,
    /// When the last accepted frame ran.
    last_frame: Option<std::time::Instant>,
}

impl ParticleField {
    /// Bind a new field to a drawing surface described by the given environment snapshot.
    ///
    /// Respects the reduced-motion preference by refusing to exist.
    pub fn new(config: FieldConfig, environment: &Environment) -> Result<Self> {
        if environment.reduced_motion {
            bail!("The reduced motion preference is set");
        }
        if environment.viewport.x <= 0.0 || environment.viewport.y <= 0.0 {
            bail!("The drawing surface has no area: {:?}", environment.viewport);
        }

        let mut field = Self {
            density: environment.derate_density(config.density),
            config,
            particles: Vec::new(),
            pointer: None,
            width: environment.viewport.x,
            height: environment.viewport.y,
            device_pixel_ratio: clamp_device_pixel_ratio(environment.device_pixel_ratio),
            running: false,
            scheduled: false,
            last_frame: None,
        };
        field.repopulate();

        tracing::debug!(
            "Field constructed: {}x{} at dpr {}, {} particles",
            field.width,
            field.height,
            field.device_pixel_ratio,
            field.particles.len()
        );
        Ok(field)
    }

    /// Mark the field as running and schedule the first tick. Idempotent: calling it twice
    /// still leaves exactly one tick pending.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.scheduled = true;
    }

    /// Mark the field as stopped. The pending tick, upon firing, observes this and performs no
    /// work and does not reschedule. That is the sole cancellation mechanism.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the field is currently animating.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a tick callback is pending.
    #[must_use]
    pub const fn is_tick_scheduled(&self) -> bool {
        self.scheduled
    }

    /// The clamped device pixel ratio in force.
    #[must_use]
    pub const fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    /// How long an accepted frame reserves before the next one.
    #[must_use]
    pub fn frame_interval(&self) -> std::time::Duration {
        let target = MICROSECONDS_PER_SECOND.wrapping_div(self.config.frame_rate.max(1).into());
        std::time::Duration::from_micros(target)
    }

    /// How many particles this surface should hold: area × density, clamped to the configured
    /// bounds.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions,
        reason = "The count was just clamped to a small positive range"
    )]
    #[must_use]
    pub fn target_count(&self) -> usize {
        let raw = (self.width * self.height * self.density).round().max(0.0) as usize;
        raw.clamp(self.config.min_particles, self.config.max_particles)
    }

    /// Throw away every particle and grow a fresh population for the current surface size.
    pub fn repopulate(&mut self) {
        let bounds = Vec2::new(self.width, self.height);
        let population: Vec<Particle> = (0..self.target_count())
            .map(|_| Particle::spawn(bounds, &self.config))
            .collect();
        self.particles = population;
    }

    /// Size the given canvas to match the field.
    pub fn size_canvas(&self, canvas: &mut impl Canvas) {
        canvas.resize(self.width, self.height, self.device_pixel_ratio);
    }

    /// The surface has a new size: resize the backing canvas and rebuild the particle list
    /// from scratch. This is a full reset, not a resample.
    pub fn resize(&mut self, viewport: Vec2, device_pixel_ratio: f32, canvas: &mut impl Canvas) {
        self.width = viewport.x.max(1.0);
        self.height = viewport.y.max(1.0);
        self.device_pixel_ratio = clamp_device_pixel_ratio(device_pixel_ratio);
        self.size_canvas(canvas);
        self.repopulate();
        tracing::debug!(
            "Field resized to {}x{}, {} particles",
            self.width,
            self.height,
            self.particles.len()
        );
    }

    /// The pointer moved to a new surface-local position.
    pub fn pointer_moved(&mut self, position: Vec2) {
        self.pointer = Some(position);
    }

    /// The pointer left the surface, disabling repulsion.
    pub fn pointer_left(&mut self) {
        self.pointer = None;
    }

    /// One animation frame: move, wrap, repel and damp every particle, draw them, then draw a
    /// line between every pair close enough to deserve one.
    ///
    /// Frames arriving faster than the target frame rate are skipped. A stopped field does
    /// nothing at all here, not even rescheduling.
    #[expect(
        clippy::indexing_slicing,
        reason = "The pair loop indexes are bounded by the vector length"
    )]
    pub fn tick(&mut self, now: std::time::Instant, canvas: &mut impl Canvas) {
        if !self.running {
            self.scheduled = false;
            return;
        }
        self.scheduled = true;

        if let Some(last_frame) = self.last_frame {
            if now.duration_since(last_frame) < self.frame_interval() {
                return;
            }
        }
        self.last_frame = Some(now);

        canvas.clear();
        canvas.wash(self.config.wash_colour);

        let bounds = Vec2::new(self.width, self.height);
        let pointer = self.pointer;
        let base = self.config.base_colour;
        for particle in &mut self.particles {
            particle.position += particle.velocity;
            wrap(&mut particle.position, bounds);
            if let Some(pointer) = pointer {
                repel(
                    particle,
                    pointer,
                    self.config.repel_radius,
                    self.config.repel_strength,
                );
            }
            particle.velocity *= self.config.damping;
            canvas.fill_circle(
                particle.position,
                particle.size,
                (base.0, base.1, base.2, particle.alpha),
            );
        }

        // Pairwise pass. O(n²), but the particle cap keeps n small enough that a spatial
        // index would cost more than it saves.
        let max_distance = self.config.max_connection_distance;
        for i in 0..self.particles.len() {
            for j in (i + 1)..self.particles.len() {
                let from = self.particles[i].position;
                let to = self.particles[j].position;
                let distance = from.distance(to);
                if distance < max_distance {
                    let alpha = (1.0 - distance / max_distance) * self.config.connection_dimming;
                    canvas.stroke_line(from, to, (base.0, base.1, base.2, alpha));
                }
            }
        }
    }
}

/// An exit past the far edge reappears at zero on that axis, and vice versa. Not reflected,
/// not clamped.
fn wrap(position: &mut Vec2, bounds: Vec2) {
    if position.x < 0.0 {
        position.x = bounds.x;
    } else if position.x > bounds.x {
        position.x = 0.0;
    }
    if position.y < 0.0 {
        position.y = bounds.y;
    } else if position.y > bounds.y {
        position.y = 0.0;
    }
}

/// Push a particle away from the pointer. The force scales with the inverse of the distance,
/// fades to zero at the radius edge, and is only defined for strictly positive distances
/// (dividing by zero is the alternative).
fn repel(particle: &mut Particle, pointer: Vec2, radius: f32, strength: f32) {
    let delta = particle.position - pointer;
    let distance = delta.length();
    if distance <= 0.0 || distance >= radius {
        return;
    }
    let force = strength * (radius - distance) / (radius * distance);
    particle.velocity += (delta / distance) * force;
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::default_numeric_fallback,
    clippy::float_cmp,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    /// Records draw calls instead of rendering anything.
    #[derive(Default)]
    struct RecordingCanvas {
        resizes: Vec<(f32, f32, f32)>,
        clears: usize,
        washes: Vec<crate::surface::Colour>,
        circles: Vec<(Vec2, f32, crate::surface::Colour)>,
        lines: Vec<(Vec2, Vec2, crate::surface::Colour)>,
    }

    impl RecordingCanvas {
        fn draw_calls(&self) -> usize {
            self.clears + self.washes.len() + self.circles.len() + self.lines.len()
        }

        fn forget(&mut self) {
            *self = Self::default();
        }
    }

    impl Canvas for RecordingCanvas {
        fn resize(&mut self, width: f32, height: f32, scale: f32) {
            self.resizes.push((width, height, scale));
        }
        fn clear(&mut self) {
            self.clears += 1;
        }
        fn wash(&mut self, colour: crate::surface::Colour) {
            self.washes.push(colour);
        }
        fn fill_circle(&mut self, centre: Vec2, radius: f32, colour: crate::surface::Colour) {
            self.circles.push((centre, radius, colour));
        }
        fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: crate::surface::Colour) {
            self.lines.push((from, to, colour));
        }
    }

    fn environment(width: f32, height: f32) -> Environment {
        Environment {
            viewport: Vec2::new(width, height),
            device_pixel_ratio: 1.0,
            device_memory: None,
            reduced_motion: false,
        }
    }

    fn field(width: f32, height: f32) -> ParticleField {
        ParticleField::new(FieldConfig::default(), &environment(width, height)).unwrap()
    }

    /// Make a stationary particle at the given position.
    fn still_particle(x: f32, y: f32) -> Particle {
        Particle {
            position: Vec2::new(x, y),
            velocity: Vec2::ZERO,
            size: 2.0,
            alpha: 0.5,
        }
    }

    /// Let the throttle accept the next tick unconditionally.
    fn unthrottle(field: &mut ParticleField) {
        field.last_frame = None;
    }

    #[test]
    fn full_hd_viewport_hits_the_particle_cap() {
        // round(1920 * 1080 * 0.00012) = 249, capped to 220.
        let field = field(1920.0, 1080.0);
        assert_eq!(field.target_count(), 220);
        assert_eq!(field.particles.len(), 220);
    }

    #[test]
    fn tiny_viewport_keeps_the_minimum() {
        let field = field(100.0, 100.0);
        assert_eq!(field.particles.len(), 60);
    }

    #[test]
    fn low_memory_derates_the_population() {
        let mut low_memory = environment(1920.0, 1080.0);
        low_memory.device_memory = Some(1.0);
        let field = ParticleField::new(FieldConfig::default(), &low_memory).unwrap();
        // density becomes max(0.00012 * 0.5, 0.00006) = 0.00006, so round(124.416) = 124.
        assert_eq!(field.particles.len(), 124);
    }

    #[test]
    fn reduced_motion_refuses_construction() {
        let mut preference_set = environment(1920.0, 1080.0);
        preference_set.reduced_motion = true;
        assert!(ParticleField::new(FieldConfig::default(), &preference_set).is_err());
    }

    #[test]
    fn zero_area_surface_refuses_construction() {
        assert!(ParticleField::new(FieldConfig::default(), &environment(0.0, 50.0)).is_err());
    }

    #[test]
    fn particles_stay_on_the_surface() {
        let mut field = field(200.0, 100.0);
        // Crank the velocities well past the surface per tick.
        for particle in &mut field.particles {
            particle.velocity = Vec2::new(37.0, -53.0);
        }
        field.pointer_moved(Vec2::new(100.0, 50.0));
        field.start();

        let mut canvas = RecordingCanvas::default();
        for _ in 0..50 {
            unthrottle(&mut field);
            field.tick(std::time::Instant::now(), &mut canvas);
        }

        for particle in &field.particles {
            assert!(particle.position.x >= 0.0 && particle.position.x <= 200.0);
            assert!(particle.position.y >= 0.0 && particle.position.y <= 100.0);
        }
    }

    #[test]
    fn resize_recomputes_the_population_and_sizes_the_canvas() {
        let mut field = field(100.0, 100.0);
        let mut canvas = RecordingCanvas::default();
        field.resize(Vec2::new(1000.0, 1000.0), 3.0, &mut canvas);

        // round(1000 * 1000 * 0.00012) = 120.
        assert_eq!(field.particles.len(), 120);
        // The device pixel ratio is capped at 2.
        assert_eq!(canvas.resizes, vec![(1000.0, 1000.0, 2.0)]);
    }

    #[test]
    fn stopped_field_neither_draws_nor_reschedules() {
        let mut field = field(200.0, 100.0);
        let mut canvas = RecordingCanvas::default();

        field.start();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(canvas.draw_calls() > 0);

        field.stop();
        canvas.forget();
        for _ in 0..3 {
            unthrottle(&mut field);
            field.tick(std::time::Instant::now(), &mut canvas);
        }
        assert_eq!(canvas.draw_calls(), 0);
        assert!(!field.is_tick_scheduled());
    }

    #[test]
    fn start_is_idempotent() {
        let mut field = field(200.0, 100.0);
        field.start();
        field.start();
        assert!(field.is_running());
        assert!(field.is_tick_scheduled());

        // And the field can start again after a stop.
        field.stop();
        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(!field.is_tick_scheduled());
        field.start();
        assert!(field.is_tick_scheduled());
    }

    #[test]
    fn frames_faster_than_the_target_rate_are_skipped() {
        let mut field = field(200.0, 100.0);
        let mut canvas = RecordingCanvas::default();
        field.start();

        field.tick(std::time::Instant::now(), &mut canvas);
        let after_first = canvas.draw_calls();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert_eq!(canvas.draw_calls(), after_first);
        // But the tick still rescheduled itself.
        assert!(field.is_tick_scheduled());
    }

    #[test]
    fn near_neighbours_get_a_line_with_proportional_opacity() {
        let mut field = field(500.0, 500.0);
        field.particles = vec![still_particle(100.0, 100.0), still_particle(160.0, 100.0)];
        field.start();

        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);

        assert_eq!(canvas.lines.len(), 1);
        let (_, _, colour) = canvas.lines[0];
        // (1 - 60/120) * 0.14
        assert!((colour.3 - 0.07).abs() < 0.0001);
    }

    #[test]
    fn distant_particles_get_no_line() {
        let mut field = field(500.0, 500.0);
        field.particles = vec![still_particle(100.0, 100.0), still_particle(230.0, 100.0)];
        field.start();

        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(canvas.lines.is_empty());
    }

    #[test]
    fn pointer_within_the_repel_radius_speeds_a_particle_up() {
        let mut field = field(500.0, 500.0);
        field.particles = vec![still_particle(100.0, 100.0)];
        field.start();

        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);
        let baseline = field.particles[0].speed();
        assert_eq!(baseline, 0.0);

        field.pointer_moved(Vec2::new(110.0, 100.0));
        unthrottle(&mut field);
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(field.particles[0].speed() > baseline);
        // Pushed away from the pointer, which is to the particle's right.
        assert!(field.particles[0].velocity.x < 0.0);
    }

    #[test]
    fn the_repel_force_grows_as_the_pointer_nears() {
        let mut near = still_particle(100.0, 100.0);
        let mut far = still_particle(100.0, 100.0);
        repel(&mut near, Vec2::new(110.0, 100.0), 80.0, 0.6);
        repel(&mut far, Vec2::new(140.0, 100.0), 80.0, 0.6);

        // 0.6 × (80 − 10) / (80 × 10) vs 0.6 × (80 − 40) / (80 × 40)
        assert!((near.speed() - 0.0525).abs() < 0.0001);
        assert!((far.speed() - 0.0075).abs() < 0.0001);
        assert!(near.speed() > far.speed());

        // And exactly at the radius edge the force has faded to nothing.
        let mut edge = still_particle(100.0, 100.0);
        repel(&mut edge, Vec2::new(180.0, 100.0), 80.0, 0.6);
        assert_eq!(edge.speed(), 0.0);
    }

    #[test]
    fn without_a_pointer_velocity_only_decays() {
        let mut field = field(500.0, 500.0);
        let mut particle = still_particle(100.0, 100.0);
        particle.velocity = Vec2::new(1.0, 0.0);
        field.particles = vec![particle];
        field.pointer_left();
        field.start();

        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);
        let speed = field.particles[0].speed();
        assert!((speed - 0.995).abs() < 0.0001);

        unthrottle(&mut field);
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(field.particles[0].speed() < speed);
    }

    #[test]
    fn pointer_exactly_on_a_particle_is_harmless() {
        let mut particle = still_particle(50.0, 50.0);
        repel(&mut particle, Vec2::new(50.0, 50.0), 80.0, 0.6);
        assert_eq!(particle.speed(), 0.0);
    }

    #[test]
    fn every_accepted_frame_washes_the_surface() {
        let mut field = field(200.0, 100.0);
        field.start();
        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert_eq!(canvas.clears, 1);
        assert_eq!(canvas.washes.len(), 1);
        assert_eq!(canvas.circles.len(), field.particles.len());
    }
}
