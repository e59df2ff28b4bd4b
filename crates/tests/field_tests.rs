//! End to end tests of the particle field through its public API, without a real terminal.

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::default_numeric_fallback,
    clippy::float_cmp,
    clippy::wildcard_enum_match_arm,
    reason = "Tests aren't so strict"
)]
mod e2e {
    use driftfield::config::FieldConfig;
    use driftfield::environment::Environment;
    use driftfield::field::simulation::ParticleField;
    use driftfield::particle::Particle;
    use driftfield::run::Protocol;
    use driftfield::surface::{Canvas, Colour, Surface};
    use glam::Vec2;

    fn setup_logging() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()
            .ok();
    }

    fn environment(width: f32, height: f32) -> Environment {
        Environment::new(Vec2::new(width, height), 1.0, None, false)
    }

    fn full_hd_field() -> ParticleField {
        ParticleField::new(FieldConfig::default(), &environment(1920.0, 1080.0)).unwrap()
    }

    /// A canvas that only remembers what was asked of it.
    #[derive(Default)]
    struct RecordingCanvas {
        draw_calls: usize,
        lines: Vec<(Vec2, Vec2, Colour)>,
    }

    impl Canvas for RecordingCanvas {
        fn resize(&mut self, _width: f32, _height: f32, _scale: f32) {}
        fn clear(&mut self) {
            self.draw_calls += 1;
        }
        fn wash(&mut self, _colour: Colour) {
            self.draw_calls += 1;
        }
        fn fill_circle(&mut self, _centre: Vec2, _radius: f32, _colour: Colour) {
            self.draw_calls += 1;
        }
        fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour) {
            self.draw_calls += 1;
            self.lines.push((from, to, colour));
        }
    }

    #[test]
    fn full_hd_viewport_defaults_to_the_particle_cap() {
        setup_logging();
        // min(max(60, round(1920 × 1080 × 0.00012)), 220) = min(max(60, 249), 220)
        let field = full_hd_field();
        assert_eq!(field.particles.len(), 220);
    }

    #[test]
    fn one_gigabyte_device_gets_a_sparser_field() {
        // Density is derated to 0.00006, so round(1920 × 1080 × 0.00006) = 124.
        let low_memory = Environment::new(Vec2::new(1920.0, 1080.0), 1.0, Some(1.0), false);
        let field = ParticleField::new(FieldConfig::default(), &low_memory).unwrap();
        assert_eq!(field.particles.len(), 124);
    }

    #[test]
    fn reduced_motion_means_no_field_and_an_untouched_surface() {
        let preference_set = Environment::new(Vec2::new(1920.0, 1080.0), 1.0, None, true);
        assert!(ParticleField::new(FieldConfig::default(), &preference_set).is_err());
    }

    #[test]
    fn a_thousand_frames_never_leave_the_surface() {
        setup_logging();
        let mut field =
            ParticleField::new(FieldConfig::default(), &environment(300.0, 150.0)).unwrap();
        let mut canvas = Surface::new(300, 150);
        field.size_canvas(&mut canvas);
        field.pointer_moved(Vec2::new(150.0, 75.0));
        field.start();

        // Fabricated timestamps let every frame through the throttle.
        let start = std::time::Instant::now();
        let interval = field.frame_interval();
        for frame in 0_u32..1000 {
            // Wiggle the pointer so repulsion keeps stirring the pot.
            if frame % 100 == 0 {
                field.pointer_moved(Vec2::new(150.0 + (frame % 7) as f32, 75.0));
            }
            field.tick(start + interval * (frame + 1), &mut canvas);
            for particle in &field.particles {
                assert!(
                    particle.position.x >= 0.0 && particle.position.x <= 300.0,
                    "x out of bounds on frame {frame}: {}",
                    particle.position.x
                );
                assert!(
                    particle.position.y >= 0.0 && particle.position.y <= 150.0,
                    "y out of bounds on frame {frame}: {}",
                    particle.position.y
                );
            }
        }
    }

    #[test]
    fn animating_actually_puts_pixels_on_the_surface() {
        let mut field =
            ParticleField::new(FieldConfig::default(), &environment(100.0, 60.0)).unwrap();
        let mut canvas = Surface::new(100, 60);
        field.size_canvas(&mut canvas);
        field.start();
        field.tick(std::time::Instant::now(), &mut canvas);

        let mut lit_pixels = 0_usize;
        for y in 0..60 {
            for x in 0..100 {
                if canvas.pixel(x, y).3 > 0.01 {
                    lit_pixels += 1;
                }
            }
        }
        // 60 particles plus the wash should light up plenty of the 6000 pixels.
        assert!(lit_pixels > 100, "only {lit_pixels} pixels were painted");
    }

    #[test]
    fn line_opacity_follows_the_distance() {
        let mut field =
            ParticleField::new(FieldConfig::default(), &environment(500.0, 500.0)).unwrap();
        field.particles = vec![
            Particle {
                position: Vec2::new(50.0, 50.0),
                velocity: Vec2::ZERO,
                size: 1.0,
                alpha: 0.5,
            },
            Particle {
                position: Vec2::new(140.0, 50.0),
                velocity: Vec2::ZERO,
                size: 1.0,
                alpha: 0.5,
            },
        ];
        field.start();

        let mut canvas = RecordingCanvas::default();
        field.tick(std::time::Instant::now(), &mut canvas);

        // d = 90, so opacity = (1 - 90/120) × 0.14 = 0.035.
        assert_eq!(canvas.lines.len(), 1);
        assert!((canvas.lines[0].2 .3 - 0.035).abs() < 0.0001);
    }

    #[test]
    fn a_stopped_field_goes_completely_quiet() {
        let mut field = full_hd_field();
        let mut canvas = RecordingCanvas::default();
        field.start();
        field.tick(std::time::Instant::now(), &mut canvas);
        assert!(canvas.draw_calls > 0);

        field.stop();
        let mut quiet_canvas = RecordingCanvas::default();
        let start = std::time::Instant::now();
        let interval = field.frame_interval();
        for frame in 0_u32..10 {
            field.tick(start + interval * (frame + 1), &mut quiet_canvas);
        }
        assert_eq!(quiet_canvas.draw_calls, 0);
        assert!(!field.is_tick_scheduled());
    }

    #[test]
    fn resizing_is_a_full_reset() {
        let mut field = full_hd_field();
        let mut canvas = Surface::new(1920, 1080);
        let before: Vec<Vec2> = field.particles.iter().map(|p| p.position).collect();

        field.resize(Vec2::new(500.0, 500.0), 1.0, &mut canvas);
        // round(500 × 500 × 0.00012) = 30, clamped up to 60.
        assert_eq!(field.particles.len(), 60);
        assert_eq!(canvas.width, 500);
        assert_eq!(canvas.height, 500);

        // Not a resample: nobody keeps their old position.
        for particle in &field.particles {
            assert!(before.iter().all(|old| *old != particle.position));
        }
    }

    #[tokio::test]
    async fn the_protocol_drives_the_field_and_ends_the_loop() {
        setup_logging();
        let mut field =
            ParticleField::new(FieldConfig::default(), &environment(200.0, 100.0)).unwrap();
        let mut canvas = Surface::new(200, 100);
        field.size_canvas(&mut canvas);
        field.start();

        let (protocol_tx, mut protocol_rx) = tokio::sync::broadcast::channel::<Protocol>(16);
        protocol_tx
            .send(Protocol::PointerMove { x: 10.0, y: 20.0 })
            .unwrap();
        protocol_tx.send(Protocol::PointerLeave).unwrap();
        protocol_tx
            .send(Protocol::PointerMove { x: 50.0, y: 60.0 })
            .unwrap();
        protocol_tx.send(Protocol::End).unwrap();

        let mut frame_interval = tokio::time::interval(field.frame_interval());
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                _ = frame_interval.tick() => {
                    field.tick(std::time::Instant::now(), &mut canvas);
                },
                Ok(message) = protocol_rx.recv() => {
                    match message {
                        Protocol::PointerMove { x, y } => field.pointer_moved(Vec2::new(x, y)),
                        Protocol::PointerLeave => field.pointer_left(),
                        Protocol::Resize { width, height } => {
                            let dpr = field.device_pixel_ratio();
                            field.resize(Vec2::new(width, height), dpr, &mut canvas);
                        }
                        Protocol::End => {
                            field.stop();
                            break;
                        }
                        _ => (),
                    }
                }
            }
        }

        assert!(!field.is_running());
        assert_eq!(field.pointer, Some(Vec2::new(50.0, 60.0)));
    }
}
