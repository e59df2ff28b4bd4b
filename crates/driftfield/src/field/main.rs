//! Drive the particle field: a frame-tick loop with a single consumer of the input protocol.

use color_eyre::eyre::Result;
use glam::Vec2;
use termwiz::terminal::buffered::BufferedTerminal;
use termwiz::terminal::Terminal as TermwizTerminal;

use super::simulation::ParticleField;
use crate::environment::Environment;
use crate::run::Protocol;
use crate::surface::Surface;

/// Owns the field, its canvas and the user's terminal for the lifetime of the animation.
pub(crate) struct FieldRunner<T: TermwizTerminal> {
    /// The simulation.
    field: ParticleField,
    /// The pixel surface frames are drawn onto.
    canvas: Surface,
    /// The user's terminal, diff-rendered.
    terminal: BufferedTerminal<T>,
    /// Collapses bursts of resize events into one reinitialisation.
    debouncer: ResizeDebouncer,
    /// The time at which the previous frame was rendered.
    last_frame_tick: std::time::Instant,
}

/// We need this just because I can't figure out how to pass `Box<dyn Terminal>` to
/// `BufferedTerminal::new()`
fn get_termwiz_terminal() -> Result<impl TermwizTerminal> {
    let capabilities = termwiz::caps::Capabilities::new_from_env()?;
    Ok(termwiz::terminal::new_terminal(capabilities)?)
}

/// Our main entrypoint. Constructs the field and animates it until the protocol says to end.
///
/// Construction is wrapped defensively: the animation is a decoration, so a field that can't
/// be built is logged and skipped, never a crash for the host process.
pub(crate) async fn start(
    protocol_tx: tokio::sync::broadcast::Sender<Protocol>,
    config: &crate::config::Config,
    environment: &Environment,
) -> Result<()> {
    let field = match ParticleField::new(config.field.clone(), environment) {
        Ok(field) => field,
        Err(error) => {
            tracing::warn!("Animation disabled: {error:?}");
            return Ok(());
        }
    };

    let mut protocol_rx = protocol_tx.subscribe();

    tracing::debug!("Putting user's terminal into raw mode");
    let mut user_terminal = get_termwiz_terminal()?;
    user_terminal.set_raw_mode()?;
    let mut terminal = BufferedTerminal::new(user_terminal)?;
    terminal.add_change(termwiz::surface::Change::CursorVisibility(
        termwiz::surface::CursorVisibility::Hidden,
    ));
    terminal.flush()?;
    crate::utils::set_mouse_reporting(true)?;

    let mut runner = FieldRunner {
        canvas: Surface::new(1, 2),
        debouncer: ResizeDebouncer::new(std::time::Duration::from_millis(
            config.field.resize_debounce_ms,
        )),
        field,
        terminal,
        last_frame_tick: std::time::Instant::now(),
    };

    // The environment snapshot and the terminal we just opened should agree about the size,
    // but the terminal is the one we actually draw to, so it wins.
    let (columns, rows) = runner.terminal.dimensions();
    runner.field.resize(
        viewport_from_cells(columns, rows),
        environment.device_pixel_ratio,
        &mut runner.canvas,
    );
    runner.field.start();

    let result = runner.run(&mut protocol_rx).await;

    tracing::debug!("Setting user's terminal to cooked mode");
    crate::utils::set_mouse_reporting(false)?;
    runner
        .terminal
        .add_change(termwiz::surface::Change::CursorVisibility(
            termwiz::surface::CursorVisibility::Visible,
        ));
    runner.terminal.flush()?;
    runner.terminal.terminal().set_cooked_mode()?;

    result
}

/// A TTY cell is 1 pixel wide and 2 pixels tall.
#[expect(
    clippy::cast_precision_loss,
    clippy::as_conversions,
    reason = "Terminals aren't 2^23 cells wide"
)]
fn viewport_from_cells(columns: usize, rows: usize) -> Vec2 {
    Vec2::new(columns as f32, (rows * 2) as f32)
}

impl<T: TermwizTerminal> FieldRunner<T> {
    /// Animate until the protocol's `End` message.
    async fn run(
        &mut self,
        protocol: &mut tokio::sync::broadcast::Receiver<Protocol>,
    ) -> Result<()> {
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "This is caused by the `tokio::select!`"
        )]
        loop {
            tokio::select! {
                () = self.sleep_until_next_frame_tick() => {
                    self.render()?;
                },
                Ok(message) = protocol.recv() => {
                    if matches!(message, Protocol::End) {
                        self.field.stop();
                        break;
                    }
                    self.handle_protocol_message(&message);
                }
            }
        }

        Ok(())
    }

    /// Feed input events to the field. Resizes are only noted here; they apply once the burst
    /// has gone quiet.
    fn handle_protocol_message(&mut self, message: &Protocol) {
        tracing::trace!("Field received protocol message: {message:?}");

        #[expect(
            clippy::wildcard_enum_match_arm,
            reason = "`End` is handled by the main loop"
        )]
        match *message {
            Protocol::PointerMove { x, y } => self.field.pointer_moved(Vec2::new(x, y)),
            Protocol::PointerLeave => self.field.pointer_left(),
            Protocol::Resize { width, height } => self
                .debouncer
                .note(Vec2::new(width, height), std::time::Instant::now()),
            _ => (),
        }
    }

    /// One frame: apply any debounced resize, tick the simulation, then diff-render the pixels
    /// to the user's terminal.
    fn render(&mut self) -> Result<()> {
        if let Some(viewport) = self.debouncer.take_ready(std::time::Instant::now()) {
            self.terminal.check_for_resize()?;
            self.terminal.repaint()?;
            let device_pixel_ratio = self.field.device_pixel_ratio();
            self.field
                .resize(viewport, device_pixel_ratio, &mut self.canvas);
        }

        self.field.tick(std::time::Instant::now(), &mut self.canvas);

        self.terminal
            .draw_from_screen(&self.canvas.to_termwiz(), 0, 0);
        self.terminal.flush()?;

        Ok(())
    }

    /// Sleep until the next frame render is due.
    async fn sleep_until_next_frame_tick(&mut self) {
        let target = self.field.frame_interval();
        if let Some(wait) = target.checked_sub(self.last_frame_tick.elapsed()) {
            tokio::time::sleep(wait).await;
        }
        self.last_frame_tick = std::time::Instant::now();
    }
}

/// Continuous resize sequences would otherwise thrash the full particle reset. Only a quiet
/// period lets the latest size through.
pub(crate) struct ResizeDebouncer {
    /// How long the quiet period is.
    quiet_period: std::time::Duration,
    /// The most recent size, and when it arrived.
    pending: Option<(Vec2, std::time::Instant)>,
}

impl ResizeDebouncer {
    /// Instantiate
    pub const fn new(quiet_period: std::time::Duration) -> Self {
        Self {
            quiet_period,
            pending: None,
        }
    }

    /// Note a new size. Restarts the quiet period.
    pub fn note(&mut self, viewport: Vec2, at: std::time::Instant) {
        self.pending = Some((viewport, at));
    }

    /// The pending size, if the burst has been quiet for long enough. Consumes it.
    pub fn take_ready(&mut self, now: std::time::Instant) -> Option<Vec2> {
        let (viewport, at) = self.pending?;
        if now.duration_since(at) < self.quiet_period {
            return None;
        }
        self.pending = None;
        Some(viewport)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const QUIET: std::time::Duration = std::time::Duration::from_millis(120);

    #[test]
    fn resize_waits_for_the_quiet_period() {
        let mut debouncer = ResizeDebouncer::new(QUIET);
        let start = std::time::Instant::now();
        debouncer.note(Vec2::new(100.0, 50.0), start);

        assert!(debouncer
            .take_ready(start + std::time::Duration::from_millis(50))
            .is_none());
        let ready = debouncer.take_ready(start + std::time::Duration::from_millis(121));
        assert_eq!(ready, Some(Vec2::new(100.0, 50.0)));
        // And it was consumed.
        assert!(debouncer
            .take_ready(start + std::time::Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn a_fresh_event_restarts_the_quiet_period() {
        let mut debouncer = ResizeDebouncer::new(QUIET);
        let start = std::time::Instant::now();
        debouncer.note(Vec2::new(100.0, 50.0), start);
        debouncer.note(
            Vec2::new(80.0, 40.0),
            start + std::time::Duration::from_millis(100),
        );

        assert!(debouncer
            .take_ready(start + std::time::Duration::from_millis(150))
            .is_none());
        let ready = debouncer.take_ready(start + std::time::Duration::from_millis(221));
        // Only the latest size survives the burst.
        assert_eq!(ready, Some(Vec2::new(80.0, 40.0)));
    }
}
